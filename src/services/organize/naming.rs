//! Naming pattern engine
//!
//! Patterns like `"%sn S%0sE%0e %en.%ext"` are scanned once into literal and
//! token segments, then rendered against a [NamingContext]. Token values are
//! never rescanned, so a series called "100%sn" renders as itself.
//!
//! | Token | Value |
//! |-------|-------|
//! | `%sn` `%s.n` `%s_n` | series name (spaces, dots, underscores) |
//! | `%s` `%0s` `%00s` | season number (unpadded, 2 and 3 digits) |
//! | `%e` `%0e` `%00e` | episode number |
//! | `%ed` `%0ed` `%00ed` | ending episode number |
//! | `%en` `%e.n` `%e_n` | episode title |
//! | `%fn` | movie `Name (Year)`, or `Name` without a year |
//! | `%mn` `%my` | movie name, movie year |
//! | `%of` | original file stem |
//! | `%ext` | source extension without the dot |

use std::path::{Path, PathBuf};

use tracing::debug;

use super::collaborators::{SeasonFolder, Series};
use super::error::{OrganizeError, OrganizeResult};
use super::types::{MovieOptions, TvOptions};
use crate::services::file_utils::valid_filename;

/// Longest full path a library file may have
pub const MAX_PATH_LENGTH: usize = 256;

/// Room kept free for sidecar extensions like `.nfo`
const SIDECAR_MARGIN: usize = 4;

/// Shortest title fragment worth keeping after truncation
const MIN_TITLE_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    None,
    Two,
    Three,
}

impl Padding {
    fn format(self, n: i32) -> String {
        match self {
            Self::None => n.to_string(),
            Self::Two => format!("{:02}", n),
            Self::Three => format!("{:03}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    SeriesName(char),
    Season(Padding),
    Episode(Padding),
    EndingEpisode(Padding),
    EpisodeTitle(char),
    FullMovieName,
    MovieName,
    MovieYear,
    OriginalName,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

/// Longest spellings first so `%00ed` wins over `%00e` and `%ext` over `%e`
const TOKENS: &[(&str, Token)] = &[
    ("%00ed", Token::EndingEpisode(Padding::Three)),
    ("%0ed", Token::EndingEpisode(Padding::Two)),
    ("%00s", Token::Season(Padding::Three)),
    ("%00e", Token::Episode(Padding::Three)),
    ("%s.n", Token::SeriesName('.')),
    ("%s_n", Token::SeriesName('_')),
    ("%e.n", Token::EpisodeTitle('.')),
    ("%e_n", Token::EpisodeTitle('_')),
    ("%ext", Token::Extension),
    ("%ed", Token::EndingEpisode(Padding::None)),
    ("%0s", Token::Season(Padding::Two)),
    ("%0e", Token::Episode(Padding::Two)),
    ("%sn", Token::SeriesName(' ')),
    ("%en", Token::EpisodeTitle(' ')),
    ("%fn", Token::FullMovieName),
    ("%mn", Token::MovieName),
    ("%my", Token::MovieYear),
    ("%of", Token::OriginalName),
    ("%s", Token::Season(Padding::None)),
    ("%e", Token::Episode(Padding::None)),
];

/// Scan a pattern into segments. An unknown `%` sequence is kept literally.
pub fn parse_pattern(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(c) = rest.chars().next() {
        if c == '%'
            && let Some((spelling, token)) = TOKENS.iter().find(|(s, _)| rest.starts_with(s))
        {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token(*token));
            rest = &rest[spelling.len()..];
            continue;
        }
        literal.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Values available to a pattern
#[derive(Debug, Clone, Default)]
pub struct NamingContext {
    pub series_name: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub ending_episode: Option<i32>,
    pub episode_title: String,
    pub movie_name: String,
    pub movie_year: Option<i32>,
    pub original_name: String,
    pub extension: String,
}

impl NamingContext {
    fn value(&self, token: Token, title: &str) -> String {
        match token {
            Token::SeriesName(sep) => with_separator(&self.series_name, sep),
            Token::Season(pad) => self.season.map(|n| pad.format(n)).unwrap_or_default(),
            Token::Episode(pad) => self.episode.map(|n| pad.format(n)).unwrap_or_default(),
            Token::EndingEpisode(pad) => self
                .ending_episode
                .map(|n| pad.format(n))
                .unwrap_or_default(),
            Token::EpisodeTitle(sep) => with_separator(title, sep),
            Token::FullMovieName => match self.movie_year {
                Some(year) => format!("{} ({})", self.movie_name, year),
                None => self.movie_name.clone(),
            },
            Token::MovieName => self.movie_name.clone(),
            Token::MovieYear => self.movie_year.map(|y| y.to_string()).unwrap_or_default(),
            Token::OriginalName => self.original_name.clone(),
            Token::Extension => self.extension.clone(),
        }
    }
}

fn with_separator(value: &str, sep: char) -> String {
    if sep == ' ' {
        value.to_string()
    } else {
        let sep = sep.to_string();
        value.split_whitespace().collect::<Vec<_>>().join(sep.as_str())
    }
}

fn render(segments: &[Segment], ctx: &NamingContext, title: &str) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Token(token) => ctx.value(*token, title),
        })
        .collect()
}

/// Collapse the gaps an empty token leaves behind: double spaces, and
/// separators dangling in front of the extension.
fn tidy(name: &str, extension: &str) -> String {
    let collapsed = name.split(' ').filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ");
    let dangling = |c: char| matches!(c, ' ' | '-' | '_' | '.');

    let suffix = format!(".{}", extension);
    if !extension.is_empty()
        && let Some(stem) = collapsed.strip_suffix(&suffix)
    {
        return format!("{}{}", stem.trim_end_matches(dangling), suffix);
    }
    collapsed.trim_end_matches(dangling).to_string()
}

/// Expand a file name pattern within `max_length` characters.
///
/// The episode title goes in last: in full if it fits, otherwise cut to an
/// even share of the remaining budget per title token, and dropped when the
/// cut title is under five characters once trailing spaces are trimmed.
pub fn expand_file_name(pattern: &str, ctx: &NamingContext, max_length: usize) -> OrganizeResult<String> {
    if pattern.trim().is_empty() {
        return Err(OrganizeError::EmptyNamePattern);
    }

    let segments = parse_pattern(pattern);
    let title_tokens = segments
        .iter()
        .filter(|s| matches!(s, Segment::Token(Token::EpisodeTitle(_))))
        .count();

    let mut ctx = ctx.clone();
    ctx.series_name = valid_filename(&ctx.series_name);
    ctx.movie_name = valid_filename(&ctx.movie_name);
    let title = valid_filename(ctx.episode_title.trim());

    let full = valid_filename(&render(&segments, &ctx, &title));
    let name = if title.is_empty() || title_tokens == 0 {
        tidy(&full, &ctx.extension)
    } else if full.chars().count() <= max_length {
        full
    } else {
        let fixed = render(&segments, &ctx, "").chars().count();
        let budget = max_length.saturating_sub(fixed) / title_tokens;
        let truncated: String = title.chars().take(budget).collect();
        let truncated = truncated.trim_end();
        if truncated.chars().count() >= MIN_TITLE_LENGTH {
            debug!(budget, title = %truncated, "Truncated episode title to fit max path");
            valid_filename(&render(&segments, &ctx, truncated))
        } else {
            debug!(budget, "Dropped episode title to fit max path");
            tidy(&valid_filename(&render(&segments, &ctx, "")), &ctx.extension)
        }
    };

    if name.chars().count() > max_length {
        return Err(OrganizeError::PathTooLong(max_length));
    }
    Ok(name)
}

/// Max file name length for files placed in `folder`
pub fn max_file_name_length(folder: &Path) -> usize {
    MAX_PATH_LENGTH
        .saturating_sub(folder.to_string_lossy().chars().count())
        .saturating_sub(1)
        .saturating_sub(SIDECAR_MARGIN)
}

/// Folder an episode of `season` belongs in
pub fn resolve_season_folder(
    series: &Series,
    season: i32,
    existing: &[SeasonFolder],
    options: &TvOptions,
) -> PathBuf {
    if let Some(folder) = existing.iter().find(|f| f.season_number == season) {
        return folder.path.clone();
    }

    if series.episodes_without_season_folders {
        return series.path.clone();
    }

    let name = if season == 0 {
        options.season_zero_folder_name.clone()
    } else {
        let ctx = NamingContext {
            season: Some(season),
            ..Default::default()
        };
        render(&parse_pattern(&options.season_folder_pattern), &ctx, "")
    };

    let name = valid_filename(name.trim());
    if name.is_empty() {
        return series.path.clone();
    }
    series.path.join(name)
}

/// Numbering and title of the episode being placed
#[derive(Debug, Clone, Default)]
pub struct EpisodeNaming<'a> {
    pub season: i32,
    pub episode: i32,
    pub ending_episode: Option<i32>,
    pub title: &'a str,
    pub extension: &'a str,
}

/// Full library path for an episode file
pub fn build_episode_path(
    series: &Series,
    season_folders: &[SeasonFolder],
    naming: &EpisodeNaming<'_>,
    options: &TvOptions,
) -> OrganizeResult<PathBuf> {
    let folder = resolve_season_folder(series, naming.season, season_folders, options);
    let max_length = max_file_name_length(&folder);

    let pattern = if naming.ending_episode.is_some() {
        &options.multi_episode_name_pattern
    } else {
        &options.episode_name_pattern
    };

    let ctx = NamingContext {
        series_name: series.name.clone(),
        season: Some(naming.season),
        episode: Some(naming.episode),
        ending_episode: naming.ending_episode,
        episode_title: naming.title.to_string(),
        extension: naming.extension.to_string(),
        ..Default::default()
    };

    let file_name = expand_file_name(pattern, &ctx, max_length)?;
    Ok(folder.join(file_name))
}

/// Full library path for a movie file under `target_root`
pub fn build_movie_path(
    target_root: &Path,
    name: &str,
    year: Option<i32>,
    original_stem: &str,
    extension: &str,
    options: &MovieOptions,
) -> OrganizeResult<PathBuf> {
    let ctx = NamingContext {
        movie_name: valid_filename(name.trim()),
        movie_year: year,
        original_name: original_stem.to_string(),
        extension: extension.to_string(),
        ..Default::default()
    };

    let folder_name = valid_filename(render(&parse_pattern(&options.folder_pattern), &ctx, "").trim());
    let folder = if folder_name.is_empty() {
        target_root.to_path_buf()
    } else {
        target_root.join(folder_name)
    };

    let file_name = expand_file_name(&options.file_name_pattern, &ctx, max_file_name_length(&folder))?;
    Ok(folder.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn series(name: &str, path: &str) -> Series {
        Series {
            id: Uuid::new_v4(),
            name: name.to_string(),
            year: None,
            path: PathBuf::from(path),
            provider_ids: BTreeMap::from([("tvmaze".to_string(), "1".to_string())]),
            episodes_without_season_folders: false,
            metadata_language: None,
            metadata_country: None,
        }
    }

    fn naming<'a>(season: i32, episode: i32, title: &'a str) -> EpisodeNaming<'a> {
        EpisodeNaming {
            season,
            episode,
            ending_episode: None,
            title,
            extension: "mkv",
        }
    }

    #[test]
    fn test_parse_pattern_longest_match() {
        assert_eq!(
            parse_pattern("S%0sE%00ed.%ext"),
            vec![
                Segment::Literal("S".to_string()),
                Segment::Token(Token::Season(Padding::Two)),
                Segment::Literal("E".to_string()),
                Segment::Token(Token::EndingEpisode(Padding::Three)),
                Segment::Literal(".".to_string()),
                Segment::Token(Token::Extension),
            ]
        );
        assert_eq!(parse_pattern("100%"), vec![Segment::Literal("100%".to_string())]);
        assert_eq!(parse_pattern("%x"), vec![Segment::Literal("%x".to_string())]);
    }

    #[test]
    fn test_token_values_are_not_rescanned() {
        let ctx = NamingContext {
            series_name: "Show %e".to_string(),
            episode: Some(3),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        assert_eq!(expand_file_name("%sn E%0e.%ext", &ctx, 200).unwrap(), "Show %e E03.mkv");
    }

    #[test]
    fn test_separator_variants() {
        let ctx = NamingContext {
            series_name: "Show Name".to_string(),
            season: Some(1),
            episode: Some(2),
            episode_title: "The Big One".to_string(),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        assert_eq!(
            expand_file_name("%s.n.S%0sE%0e.%e_n.%ext", &ctx, 200).unwrap(),
            "Show.Name.S01E02.The_Big_One.mkv"
        );
        assert_eq!(expand_file_name("%s_n %sx%00e.%ext", &ctx, 200).unwrap(), "Show_Name 1x002.mkv");
    }

    #[test]
    fn test_build_episode_path_default_pattern() {
        let s = series("Show Name", "/tv/Show Name");
        let path = build_episode_path(&s, &[], &naming(2, 5, "The Return"), &TvOptions::default()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show Name/Season 02/Show Name S02E05 The Return.mkv"));
    }

    #[test]
    fn test_multi_episode_pattern() {
        let s = series("Show", "/tv/Show");
        let mut n = naming(1, 1, "Pilot");
        n.ending_episode = Some(2);
        let path = build_episode_path(&s, &[], &n, &TvOptions::default()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show/Season 01/Show S01E01-E02 Pilot.mkv"));
    }

    #[test]
    fn test_empty_title_leaves_no_dangling_space() {
        let s = series("Show Name", "/tv/Show Name");
        let path = build_episode_path(&s, &[], &naming(2, 5, ""), &TvOptions::default()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show Name/Season 02/Show Name S02E05.mkv"));

        let mut options = TvOptions::default();
        options.episode_name_pattern = "%sn - S%0sE%0e - %en.%ext".to_string();
        let path = build_episode_path(&s, &[], &naming(2, 5, ""), &options).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show Name/Season 02/Show Name - S02E05.mkv"));
    }

    #[test]
    fn test_existing_season_folder_is_reused() {
        let s = series("Show", "/tv/Show");
        let folders = vec![SeasonFolder {
            season_number: 2,
            path: PathBuf::from("/tv/Show/S2"),
        }];
        let path = build_episode_path(&s, &folders, &naming(2, 1, "A"), &TvOptions::default()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show/S2/Show S02E01 A.mkv"));
    }

    #[test]
    fn test_season_folder_fallbacks() {
        let options = TvOptions::default();
        let mut s = series("Show", "/tv/Show");
        assert_eq!(resolve_season_folder(&s, 0, &[], &options), PathBuf::from("/tv/Show/Specials"));
        assert_eq!(resolve_season_folder(&s, 12, &[], &options), PathBuf::from("/tv/Show/Season 12"));

        s.episodes_without_season_folders = true;
        assert_eq!(resolve_season_folder(&s, 3, &[], &options), PathBuf::from("/tv/Show"));
    }

    #[test]
    fn test_illegal_characters_are_stripped() {
        let s = series("Show: Reborn", "/tv/Show Reborn");
        let path = build_episode_path(&s, &[], &naming(1, 1, "Why?"), &TvOptions::default()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Show Reborn/Season 01/Show Reborn S01E01 Why.mkv"));
    }

    #[test]
    fn test_long_title_is_truncated_to_budget() {
        let ctx = NamingContext {
            series_name: "Show".to_string(),
            season: Some(1),
            episode: Some(1),
            episode_title: "A Very Long Episode Title".to_string(),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        // "Show S01E01 .mkv" is 16 characters, leaving 9 for the title
        let name = expand_file_name("%sn S%0sE%0e %en.%ext", &ctx, 25).unwrap();
        assert_eq!(name, "Show S01E01 A Very Lo.mkv");
        assert!(name.chars().count() <= 25);
    }

    #[test]
    fn test_short_budget_drops_title() {
        let ctx = NamingContext {
            series_name: "Show".to_string(),
            season: Some(1),
            episode: Some(1),
            episode_title: "A Very Long Episode Title".to_string(),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        // only 4 characters would remain for the title
        let name = expand_file_name("%sn S%0sE%0e %en.%ext", &ctx, 20).unwrap();
        assert_eq!(name, "Show S01E01.mkv");
    }

    #[test]
    fn test_title_cut_at_a_space_is_measured_after_trimming() {
        let ctx = NamingContext {
            series_name: "Show".to_string(),
            season: Some(1),
            episode: Some(1),
            episode_title: "Abc  Defghijklmnop".to_string(),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        // five characters remain, but the cut "Abc  " trims to three
        let name = expand_file_name("%sn S%0sE%0e %en.%ext", &ctx, 21).unwrap();
        assert_eq!(name, "Show S01E01.mkv");

        let name = expand_file_name("%sn S%0sE%0e %en.%ext", &ctx, 25).unwrap();
        assert_eq!(name, "Show S01E01 Abc  Defg.mkv");
    }

    #[test]
    fn test_path_too_long_after_dropping_title() {
        let ctx = NamingContext {
            series_name: "A".repeat(40),
            season: Some(1),
            episode: Some(1),
            episode_title: "Title".to_string(),
            extension: "mkv".to_string(),
            ..Default::default()
        };
        assert_matches!(
            expand_file_name("%sn S%0sE%0e %en.%ext", &ctx, 20),
            Err(OrganizeError::PathTooLong(20))
        );
    }

    #[test]
    fn test_episode_path_stays_within_max_path() {
        let s = series(&"Long Series Name ".repeat(6), &format!("/tv/{}", "x".repeat(120)));
        let title = "An Extraordinarily Long Episode Title That Goes On ".repeat(3);
        let path = build_episode_path(&s, &[], &naming(1, 1, &title), &TvOptions::default()).unwrap();
        assert!(path.to_string_lossy().chars().count() <= MAX_PATH_LENGTH - SIDECAR_MARGIN);
    }

    #[test]
    fn test_empty_pattern_fails() {
        let s = series("Show", "/tv/Show");
        let mut options = TvOptions::default();
        options.episode_name_pattern = "  ".to_string();
        assert_matches!(
            build_episode_path(&s, &[], &naming(1, 1, "A"), &options),
            Err(OrganizeError::EmptyNamePattern)
        );
    }

    #[test]
    fn test_build_movie_path_default() {
        let path = build_movie_path(
            Path::new("/movies"),
            "Movie Name",
            Some(2020),
            "Movie.Name.2020",
            "mkv",
            &MovieOptions::default(),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/movies/Movie Name (2020)/Movie Name (2020).mkv"));
    }

    #[test]
    fn test_build_movie_path_original_name_pattern() {
        let options = MovieOptions {
            folder_pattern: "%mn (%my)".to_string(),
            file_name_pattern: "%of.%ext".to_string(),
            copy_original_file: false,
        };
        let path =
            build_movie_path(Path::new("/movies"), "Movie: Name", Some(1999), "Movie.Name", "mp4", &options).unwrap();
        assert_eq!(path, PathBuf::from("/movies/Movie Name (1999)/Movie.Name.mp4"));
    }
}
