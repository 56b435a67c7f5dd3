//! Filename parser for downloaded episode and movie files
//!
//! Parses filenames like:
//! - "Show.Name.S02E05.720p.WEB.h264-GROUP.mkv"
//! - "Show.S01E01E02.mkv" / "Show S01E01-E02" / "Show 1x01-02"
//! - "The.Daily.Show.2026.01.07.Guest.Name.720p.WEB.h264-EDITH.mkv"
//! - "Movie.Name.2020.1080p.BluRay.x264.mkv"
//!
//! Everything here is pure: no I/O, and "nothing recognized" is `None`,
//! never an error.

use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file_utils::is_video_file;

static SXXEXX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<name>.*?)[\s\-\[(]*\bs(?P<season>\d{1,4})\s?e(?P<episode>\d{1,3})(?:(?:[\s\-]?e|-)(?P<end>\d{1,3}))?(?:\b|$)",
    )
    .expect("valid SxxExx regex")
});

static NXNN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<name>.*?)[\s\-\[(]*\b(?P<season>\d{1,2})x(?P<episode>\d{2,3})(?:-(?:\d{1,2}x)?(?P<end>\d{2,3}))?\b",
    )
    .expect("valid NxNN regex")
});

static VERBOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<name>.*?)[\s\-]*\bseason\s*(?P<season>\d{1,3})[\s\-,]*episode\s*(?P<episode>\d{1,3})",
    )
    .expect("valid verbose regex")
});

static AIR_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>.*?)[\s\-\[(]*\b(?P<year>(?:19|20)\d{2})[\s\-](?P<month>\d{1,2})[\s\-](?P<day>\d{1,2})\b",
    )
    .expect("valid air date regex")
});

static ABSOLUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+?)\s+-\s+(?P<episode>\d{1,3})\b").expect("valid absolute regex")
});

static TRAILING_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.*?)[\s\-]*[(\[]?(?P<year>(?:19|20)\d{2})[)\]]?\s*$")
        .expect("valid trailing year regex")
});

static YEAR_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[]?\b(?P<year>(?:19|20)\d{2})\b[)\]]?").expect("valid year regex"));

static QUALITY_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(2160p|1080p|1080i|720p|576p|480p|4k|uhd|bluray|blu-ray|bdrip|brrip|web-dl|webdl|webrip|hdtv|dvdrip|x264|x265|h264|h265|hevc|remux|proper|repack)\b",
    )
    .expect("valid quality regex")
});

static SEASON_FOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(season|series|staffel|saison)\s*\d+$|^s\d{1,2}$|^specials$").expect("valid season folder regex"));

/// Identity guess for an episode file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEpisode {
    pub series_name: Option<String>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub ending_episode: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl ParsedEpisode {
    /// Full air date, when the filename carried one
    pub fn air_date(&self) -> Option<NaiveDate> {
        match (self.year, self.month, self.day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        }
    }
}

/// Identity guess for a movie file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMovie {
    pub name: String,
    pub year: Option<i32>,
}

/// A name split from its trailing year, e.g. "Show Name (2005)"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub name: String,
    pub year: Option<i32>,
}

/// Parse an episode file path.
///
/// When the filename itself has no series name ("S02E05.mkv"), the parent
/// folder is used, skipping a season folder if there is one.
pub fn parse_episode(path: &Path) -> Option<ParsedEpisode> {
    let cleaned = cleaned_stem(path);

    let mut parsed = SXXEXX_RE
        .captures(&cleaned)
        .map(|caps| numbered(&caps))
        .or_else(|| NXNN_RE.captures(&cleaned).map(|caps| numbered(&caps)))
        .or_else(|| VERBOSE_RE.captures(&cleaned).map(|caps| numbered(&caps)))
        .or_else(|| AIR_DATE_RE.captures(&cleaned).and_then(|caps| dated(&caps)))
        .or_else(|| {
            ABSOLUTE_RE.captures(&cleaned).map(|caps| ParsedEpisode {
                series_name: Some(clean_name(&caps["name"])),
                episode: caps["episode"].parse().ok(),
                ..Default::default()
            })
        })?;

    if parsed.series_name.as_deref().is_none_or(str::is_empty) {
        parsed.series_name = series_name_from_folders(path);
    }

    debug!(
        path = %path.display(),
        series = ?parsed.series_name,
        season = ?parsed.season,
        episode = ?parsed.episode,
        ending_episode = ?parsed.ending_episode,
        "Parsed episode filename"
    );

    Some(parsed)
}

/// Parse a movie file path into name and year.
///
/// The name ends at the first year token (that isn't the whole title) or at
/// the first quality token, whichever comes first.
pub fn parse_movie(path: &Path) -> Option<ParsedMovie> {
    let cleaned = cleaned_stem(path);

    let year_match = YEAR_TOKEN_RE
        .captures_iter(&cleaned)
        .find(|caps| caps.get(0).is_some_and(|m| m.start() > 0));
    let quality_start = QUALITY_TOKEN_RE.find(&cleaned).map(|m| m.start());

    let (name_end, year) = match (&year_match, quality_start) {
        (Some(caps), quality) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(cleaned.len());
            let year = caps["year"].parse().ok();
            match quality {
                Some(q) if q < start => (q, None),
                _ => (start, year),
            }
        }
        (None, Some(q)) => (q, None),
        (None, None) => (cleaned.len(), None),
    };

    let name = clean_name(&cleaned[..name_end]);
    if name.is_empty() {
        return None;
    }

    Some(ParsedMovie { name, year })
}

/// Split a trailing year off a name: "Show Name (2005)" -> ("Show Name", 2005)
pub fn parse_name(raw: &str) -> ParsedName {
    let trimmed = raw.trim();
    if let Some(caps) = TRAILING_YEAR_RE.captures(trimmed) {
        let name = caps["name"].trim();
        if !name.is_empty() {
            return ParsedName {
                name: name.to_string(),
                year: caps["year"].parse().ok(),
            };
        }
    }

    ParsedName {
        name: trimmed.to_string(),
        year: None,
    }
}

/// File name without a video extension, with dots and underscores as spaces
fn cleaned_stem(path: &Path) -> String {
    let raw = if is_video_file(path) {
        path.file_stem()
    } else {
        path.file_name()
    }
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_default();

    raw.replace(['.', '_'], " ")
}

fn numbered(caps: &Captures<'_>) -> ParsedEpisode {
    let episode: Option<i32> = caps.name("episode").and_then(|m| m.as_str().parse().ok());
    let ending_episode = caps
        .name("end")
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .filter(|end| episode.is_some_and(|ep| *end > ep));

    ParsedEpisode {
        series_name: Some(clean_name(&caps["name"])),
        season: caps.name("season").and_then(|m| m.as_str().parse().ok()),
        episode,
        ending_episode,
        ..Default::default()
    }
}

fn dated(caps: &Captures<'_>) -> Option<ParsedEpisode> {
    let year: i32 = caps["year"].parse().ok()?;
    let month: u32 = caps["month"].parse().ok()?;
    let day: u32 = caps["day"].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?;

    Some(ParsedEpisode {
        series_name: Some(clean_name(&caps["name"])),
        year: Some(year),
        month: Some(month),
        day: Some(day),
        ..Default::default()
    })
}

fn series_name_from_folders(path: &Path) -> Option<String> {
    path.ancestors()
        .skip(1)
        .filter_map(|p| p.file_name())
        .map(|n| clean_name(&n.to_string_lossy().replace(['.', '_'], " ")))
        .find(|n| !n.is_empty() && !SEASON_FOLDER_RE.is_match(n))
}

/// Trim separators and collapse whitespace
fn clean_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '[' | '(' | ','))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
