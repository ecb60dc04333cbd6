// Author matching: watch-list authors against a paper's author list.
//
// Last names must agree exactly (after normalization). First names must be
// compatible: identical, or one side is a bare initial that starts the other
// side's full first name. Last-name-only agreement is never enough.

use std::collections::BTreeSet;

use tracing::warn;

use super::names::{normalize, NamePair};

/// Whether two normalized names refer to the same person.
pub fn names_compatible(paper: &NamePair, watched: &NamePair) -> bool {
    if paper.last != watched.last {
        return false;
    }
    if paper.first == watched.first {
        return true;
    }
    // "g" vs "glennis", in either direction
    (paper.has_initial() && watched.first.starts_with(paper.first.as_str()))
        || (watched.has_initial() && paper.first.starts_with(watched.first.as_str()))
}

/// Configured watch-list authors, normalized once per filter session.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    entries: Vec<(String, NamePair)>,
}

impl WatchList {
    /// Normalize every configured author. Entries that normalize to nothing
    /// are logged and left out.
    pub fn new(authors: &[String]) -> Self {
        let entries = authors
            .iter()
            .filter_map(|author| match normalize(author) {
                Some(pair) => Some((author.clone(), pair)),
                None => {
                    warn!(author = %author, "Watch-list author has no usable name, ignoring");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return the configured watch-list entries (as written in config) that
    /// appear among the paper's authors.
    pub fn matches(&self, paper_authors: &[String]) -> BTreeSet<String> {
        if self.entries.is_empty() {
            return BTreeSet::new();
        }

        // Authors that fail to normalize simply can't match anything.
        let paper_pairs: Vec<NamePair> = paper_authors.iter().filter_map(|a| normalize(a)).collect();

        self.entries
            .iter()
            .filter(|(_, watched)| paper_pairs.iter().any(|p| names_compatible(p, watched)))
            .map(|(author, _)| author.clone())
            .collect()
    }
}

/// One-shot form of [`WatchList::matches`].
pub fn match_authors(paper_authors: &[String], watch_list: &[String]) -> BTreeSet<String> {
    WatchList::new(watch_list).matches(paper_authors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn matched(paper: &[&str], watch: &[&str]) -> Vec<String> {
        match_authors(&names(paper), &names(watch)).into_iter().collect()
    }

    #[test]
    fn exact_full_name_matches() {
        assert_eq!(
            matched(&["Evan Eichler", "John Smith"], &["Evan Eichler"]),
            vec!["Evan Eichler"]
        );
    }

    #[test]
    fn middle_initial_on_paper_side_is_ignored() {
        assert_eq!(
            matched(&["Glennis A. Logsdon"], &["Glennis Logsdon"]),
            vec!["Glennis Logsdon"]
        );
    }

    #[test]
    fn paper_initial_matches_full_watch_name() {
        assert_eq!(
            matched(&["G. Logsdon"], &["Glennis Logsdon"]),
            vec!["Glennis Logsdon"]
        );
        assert_eq!(
            matched(&["Logsdon, G. A."], &["Glennis Logsdon"]),
            vec!["Glennis Logsdon"]
        );
    }

    #[test]
    fn watch_initial_matches_full_paper_name() {
        assert_eq!(
            matched(&["Glennis Logsdon"], &["G. Logsdon"]),
            vec!["G. Logsdon"]
        );
    }

    #[test]
    fn last_name_alone_never_matches() {
        assert!(matched(&["John Smith"], &["Jane Smith"]).is_empty());
        assert!(matched(&["J. Smith"], &["Alice Smith"]).is_empty());
    }

    #[test]
    fn initial_must_be_a_prefix() {
        assert!(matched(&["K. Logsdon"], &["Glennis Logsdon"]).is_empty());
    }

    #[test]
    fn two_initials_must_agree() {
        assert_eq!(matched(&["G. Logsdon"], &["G. Logsdon"]), vec!["G. Logsdon"]);
        assert!(matched(&["H. Logsdon"], &["G. Logsdon"]).is_empty());
    }

    #[test]
    fn full_names_are_not_prefix_matched() {
        // Only a bare initial may prefix-match
        assert!(matched(&["Gle Logsdon"], &["Glennis Logsdon"]).is_empty());
    }

    #[test]
    fn diacritics_and_case_do_not_matter() {
        assert_eq!(
            matched(&["jürgen MÜLLER"], &["Jurgen Muller"]),
            vec!["Jurgen Muller"]
        );
    }

    #[test]
    fn each_watch_entry_reported_once() {
        let result = matched(
            &["Evan Eichler", "E. Eichler", "Eichler, Evan E."],
            &["Evan Eichler"],
        );
        assert_eq!(result, vec!["Evan Eichler"]);
    }

    #[test]
    fn multiple_watch_entries_sorted() {
        let result = matched(
            &["Glennis A. Logsdon", "Evan E. Eichler"],
            &["Glennis Logsdon", "Evan Eichler"],
        );
        assert_eq!(result, vec!["Evan Eichler", "Glennis Logsdon"]);
    }

    #[test]
    fn unusable_names_are_skipped() {
        let list = WatchList::new(&names(&["", "Evan Eichler"]));
        assert_eq!(list.len(), 1);
        assert!(list.matches(&names(&["", "   "])).is_empty());
    }

    #[test]
    fn empty_watch_list_matches_nothing() {
        assert!(WatchList::new(&[]).is_empty());
        assert!(matched(&["Evan Eichler"], &[]).is_empty());
    }
}
