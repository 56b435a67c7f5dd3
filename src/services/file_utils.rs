//! Shared file utility functions
//!
//! Extension checks, filename sanitization and the case-insensitive path
//! comparisons the organizer relies on.

use std::path::Path;

/// Video file extensions (lowercase, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts", "mpg", "mpeg", "iso",
    "divx", "ogv", "3gp", "vob",
];

/// Extension of a path as written, without the dot, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Check if a file is a video file based on extension
pub fn is_video_file(path: &Path) -> bool {
    let ext = extension_of(path).to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// Check a path's extension against a configured list.
///
/// Entries may be written with or without the leading dot.
pub fn has_extension_in(path: &Path, extensions: &[String]) -> bool {
    let ext = extension_of(path);
    if ext.is_empty() {
        return false;
    }
    extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Strip characters that are illegal in a file or folder name
pub fn valid_filename(name: &str) -> String {
    let options = sanitize_filename::Options {
        truncate: false,
        windows: true,
        replacement: "",
    };
    sanitize_filename::sanitize_with_options(name, options)
}

/// File name without extension, as an owned string
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Path equality ignoring case, the way the target filesystems compare names
pub fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Format bytes into a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
