// Author name normalization.
//
// PubMed renders authors as "Glennis A. Logsdon" while bioRxiv uses
// "Logsdon, G. A.". Both are reduced to a lower-cased, diacritic-free
// (first, last) pair so the author matcher can compare them directly.
// Middle names and suffixes are dropped.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name suffixes ignored when picking the first or last name.
/// Compared after stripping trailing periods, so "Jr." and "jr" both count.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "md", "phd"];

/// Canonical (first, last) form of an author name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePair {
    pub first: String,
    pub last: String,
}

impl NamePair {
    /// True when the first name is a bare initial ("g").
    pub fn has_initial(&self) -> bool {
        self.first.chars().count() == 1
    }
}

impl std::fmt::Display for NamePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

/// Strip diacritics: decompose to NFD and drop combining marks.
///
/// "Müller" -> "Muller", "José García" -> "Jose Garcia".
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn is_suffix(token: &str) -> bool {
    NAME_SUFFIXES.contains(&token.trim_end_matches('.'))
}

/// Tokenize on whitespace and drop trailing periods and commas
/// ("g." -> "g", "john," -> "john"). Tokens that were nothing but
/// punctuation disappear.
fn clean_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|t| t.trim_end_matches(['.', ',']))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Decompose a display-form author name into its canonical pair.
///
/// Returns `None` when nothing usable is left after normalization; callers
/// exclude such authors from matching rather than failing.
///
/// ```
/// use paperwatch::filter::names::normalize;
///
/// let pair = normalize("Logsdon, G. A.").unwrap();
/// assert_eq!((pair.first.as_str(), pair.last.as_str()), ("g", "logsdon"));
///
/// let pair = normalize("John B. Smith Jr.").unwrap();
/// assert_eq!((pair.first.as_str(), pair.last.as_str()), ("john", "smith"));
/// ```
pub fn normalize(raw_name: &str) -> Option<NamePair> {
    let normalized = strip_diacritics(raw_name).to_lowercase();
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return None;
    }

    match normalized.split_once(',') {
        // "John Smith, Jr.": the comma only sets off a suffix
        Some((name, after)) if clean_tokens(after).iter().all(|t| is_suffix(t)) => {
            from_first_last(name)
        }
        Some((last_part, first_part)) => from_last_first(last_part, first_part),
        None => from_first_last(normalized),
    }
}

/// "Last, First Middle" (bioRxiv style).
fn from_last_first(last_part: &str, first_part: &str) -> Option<NamePair> {
    let last = clean_tokens(last_part).join(" ");
    if last.is_empty() {
        return None;
    }

    let tokens = clean_tokens(first_part);

    // A full given name wins over an earlier initial ("G. Alice" -> "alice").
    let full = tokens
        .iter()
        .find(|t| t.chars().count() > 1 && !is_suffix(t));
    let initial = tokens.iter().find(|t| t.chars().count() == 1);

    let first = match full.or(initial) {
        Some(t) => (*t).to_string(),
        // "Smith," with nothing usable after the comma
        None => last.clone(),
    };

    Some(NamePair { first, last })
}

/// "First Middle Last Suffix" (PubMed style).
fn from_first_last(text: &str) -> Option<NamePair> {
    let tokens = clean_tokens(text);
    let (first, rest) = tokens.split_first()?;

    let last = rest
        .iter()
        .rev()
        .find(|t| !is_suffix(t))
        .unwrap_or(first);

    Some(NamePair {
        first: (*first).to_string(),
        last: (*last).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(raw: &str) -> (String, String) {
        let p = normalize(raw).unwrap_or_else(|| panic!("{raw:?} should normalize"));
        (p.first, p.last)
    }

    fn p(first: &str, last: &str) -> (String, String) {
        (first.to_string(), last.to_string())
    }

    #[test]
    fn first_last_with_middle_initial() {
        assert_eq!(pair("Glennis A. Logsdon"), p("glennis", "logsdon"));
    }

    #[test]
    fn first_last_with_suffix() {
        assert_eq!(pair("John B. Smith Jr."), p("john", "smith"));
        assert_eq!(pair("John Smith III"), p("john", "smith"));
        assert_eq!(pair("Jane Doe PhD"), p("jane", "doe"));
    }

    #[test]
    fn last_first_with_initials() {
        assert_eq!(pair("Logsdon, G. A."), p("g", "logsdon"));
    }

    #[test]
    fn last_first_with_full_name() {
        assert_eq!(pair("Eichler, Evan E."), p("evan", "eichler"));
    }

    #[test]
    fn last_first_prefers_full_name_over_leading_initial() {
        assert_eq!(pair("Venter, J. Craig"), p("craig", "venter"));
    }

    #[test]
    fn last_first_skips_suffix() {
        assert_eq!(pair("Smith, Jr. J."), p("j", "smith"));
        assert_eq!(pair("Smith, Jr. John"), p("john", "smith"));
    }

    #[test]
    fn trailing_commas_are_not_part_of_names() {
        assert_eq!(pair("Smith, John, Jr."), p("john", "smith"));
        assert_eq!(pair("Logsdon, G., A."), p("g", "logsdon"));
    }

    #[test]
    fn comma_before_suffix_keeps_first_last_order() {
        assert_eq!(pair("John Smith, Jr."), p("john", "smith"));
        assert_eq!(pair("Jane Doe, PhD"), p("jane", "doe"));
    }

    #[test]
    fn last_first_without_given_name_falls_back_to_last() {
        assert_eq!(pair("Smith,"), p("smith", "smith"));
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(pair("Jürgen Müller"), p("jurgen", "muller"));
        assert_eq!(pair("García, José"), p("jose", "garcia"));
        assert_eq!(strip_diacritics("Ångström"), "Angstrom");
    }

    #[test]
    fn leading_initial_loses_its_period() {
        assert_eq!(pair("G. Logsdon"), p("g", "logsdon"));
    }

    #[test]
    fn single_name_is_degenerate_pair() {
        assert_eq!(pair("Madonna"), p("madonna", "madonna"));
    }

    #[test]
    fn all_trailing_suffixes_degenerates_to_first() {
        assert_eq!(pair("Smith Jr. III"), p("smith", "smith"));
    }

    #[test]
    fn whitespace_and_case_are_normalized() {
        assert_eq!(pair("   EVAN    EICHLER  "), p("evan", "eichler"));
    }

    #[test]
    fn empty_input_is_none() {
        assert!(normalize("").is_none());
        assert!(normalize("   ").is_none());
        assert!(normalize(", John").is_none());
        assert!(normalize("...").is_none());
    }

    #[test]
    fn has_initial() {
        assert!(normalize("G. Logsdon").unwrap().has_initial());
        assert!(!normalize("Glennis Logsdon").unwrap().has_initial());
    }
}
