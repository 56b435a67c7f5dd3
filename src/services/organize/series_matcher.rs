//! Find the library series a parsed name belongs to

use anyhow::Result;
use tracing::debug;

use super::collaborators::{LibraryIndex, Series};
use super::types::{AutoOrganizeOptions, OrganizerType};
use crate::services::filename_parser::parse_name;
use crate::services::text_utils::{contains_words, name_similarity, normalize_show_name};

const EXACT_SCORE: f64 = 100.0;
const FUZZY_WEIGHT: f64 = 50.0;
const FUZZY_THRESHOLD: f64 = 0.85;
const PARTIAL_SCORE: f64 = 25.0;
const PARTIAL_MIN_LENGTH: usize = 4;
const YEAR_BONUS: f64 = 10.0;

/// Name score of `series` for a parsed name. Zero means "not this one".
///
/// A year on both sides that disagrees rules the series out.
pub fn score_series(series: &Series, name: &str, year: Option<i32>) -> f64 {
    let library_name = parse_name(&series.name);
    let series_year = series.year.or(library_name.year);

    let wanted = normalize_show_name(name);
    if wanted.is_empty() {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for candidate in [series.name.as_str(), library_name.name.as_str()] {
        let normalized = normalize_show_name(candidate);
        let score = if normalized == wanted {
            EXACT_SCORE
        } else {
            let similarity = name_similarity(candidate, name);
            if similarity >= FUZZY_THRESHOLD {
                similarity * FUZZY_WEIGHT
            } else if (wanted.len() >= PARTIAL_MIN_LENGTH && contains_words(candidate, name))
                || (normalized.len() >= PARTIAL_MIN_LENGTH && contains_words(name, candidate))
            {
                PARTIAL_SCORE
            } else {
                0.0
            }
        };
        best = best.max(score);
    }

    if best <= 0.0 {
        return 0.0;
    }

    match (year, series_year) {
        (Some(a), Some(b)) if a == b => best + YEAR_BONUS,
        (Some(_), Some(_)) => 0.0,
        _ => best,
    }
}

/// Highest scoring series; the first one wins a tie
pub fn best_match<'a>(candidates: &'a [Series], name: &str, year: Option<i32>) -> Option<&'a Series> {
    let mut best: Option<(&Series, f64)> = None;
    for series in candidates {
        let score = score_series(series, name, year);
        if score > 0.0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((series, score));
        }
    }
    best.map(|(series, _)| series)
}

/// Resolve a parsed series name against the library, falling back to the
/// remembered corrections in `options`.
///
/// `raw_names` are the strings the smart-match table is searched for, usually
/// the name as parsed and the same name with its year removed.
pub async fn find_series(
    library: &dyn LibraryIndex,
    options: &AutoOrganizeOptions,
    name: &str,
    year: Option<i32>,
    raw_names: &[&str],
) -> Result<Option<Series>> {
    let all = library.list_series().await?;

    if let Some(series) = best_match(&all, name, year) {
        debug!(name = %name, series = %series.name, "Matched series by name");
        return Ok(Some(series.clone()));
    }

    let Some(info) = options.find_smart_match(OrganizerType::Episode, raw_names) else {
        return Ok(None);
    };

    let series = library.get_series(info.id).await?;
    if let Some(series) = &series {
        debug!(name = %name, series = %series.name, "Matched series by remembered correction");
    }
    Ok(series)
}
