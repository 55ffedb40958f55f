//! Base-name extraction: strips version/amendment/year markers from a title
//! so that versions of the same underlying law compare equal

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Parenthesized amendment/ordinance/revision markers, e.g. "(Amendment)",
/// "(Revised)", "(No. 5)", "(Second Amendment) "
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*\((?:[^)]*\bamend[^)]*|[^)]*\brevis[^)]*|[^)]*\bsupplement[^)]*|[^)]*\bordinance[^)]*|no\.?\s*\d+[^)]*)\)",
    )
    .unwrap()
});

/// Trailing year tokens after an "Act"/"Ordinance" suffix. Requires a
/// non-empty phrase before the instrument word so a bare "Act 1984" is left
/// alone, and "Criminal Procedure Code 1898" keeps its year.
static TRAILING_YEARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+\b(?:act|ordinance))(?:(?:\s*,)?\s+(?:1[5-9]\d{2}|20\d{2}))+$").unwrap()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A year token anywhere in a title, used for year annotation only
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").unwrap());

/// Extract the comparable base name from an enactment title.
///
/// Applies, in order: strip parenthesized amendment/revision/number markers,
/// strip trailing bare years behind an Act/Ordinance suffix, collapse
/// whitespace. Pure and total: if nothing matches, the trimmed original
/// title is returned unchanged.
pub fn extract(title: &str) -> String {
    let stripped = MARKER_RE.replace_all(title, "");
    let collapsed = WHITESPACE_RE.replace_all(stripped.trim(), " ");

    match TRAILING_YEARS_RE.captures(&collapsed) {
        Some(caps) => caps[1].trim().to_string(),
        None => collapsed.trim().to_string(),
    }
}

/// Last year token appearing in the title, if any
pub fn title_year(title: &str) -> Option<i32> {
    YEAR_RE
        .find_iter(title)
        .last()
        .and_then(|m| m.as_str().parse().ok())
}
