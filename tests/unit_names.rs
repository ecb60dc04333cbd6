// Name normalization and author matching properties.
//
// Generated names are single alphabetic tokens of two or more letters that
// are not name suffixes, the shape for which "First Last" and "Last, First"
// both round-trip exactly.

use proptest::prelude::*;

use paperwatch::filter::authors::{match_authors, names_compatible};
use paperwatch::filter::names::{normalize, NamePair};

const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "md", "phd"];

fn name_token() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,11}".prop_filter("not a suffix", |t| {
        !SUFFIXES.contains(&t.to_lowercase().as_str())
    })
}

fn pair(first: &str, last: &str) -> NamePair {
    NamePair {
        first: first.to_lowercase(),
        last: last.to_lowercase(),
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

proptest! {
    #[test]
    fn first_last_round_trips(first in name_token(), last in name_token()) {
        let normalized = normalize(&format!("{first} {last}")).unwrap();
        prop_assert_eq!(&normalized, &pair(&first, &last));

        // Re-normalizing the canonical form is a fixed point
        let again = normalize(&normalized.to_string()).unwrap();
        prop_assert_eq!(again, normalized);
    }

    #[test]
    fn both_orderings_agree(first in name_token(), last in name_token()) {
        let a = normalize(&format!("{first} {last}")).unwrap();
        let b = normalize(&format!("{last}, {first}")).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn middle_initials_and_suffixes_are_ignored(
        first in name_token(),
        last in name_token(),
        middle in "[A-Z]",
        suffix in prop::sample::select(vec!["Jr.", "Sr", "III", "PhD"]),
    ) {
        let plain = normalize(&format!("{first} {last}")).unwrap();
        let decorated = normalize(&format!("{first} {middle}. {last} {suffix}")).unwrap();
        prop_assert_eq!(&decorated, &plain);

        let comma_suffix = normalize(&format!("{last}, {first}, {suffix}")).unwrap();
        prop_assert_eq!(comma_suffix, plain);
    }

    #[test]
    fn initial_matches_full_name_both_ways(first in name_token(), last in name_token()) {
        let initial = &first[..1];
        let full = format!("{first} {last}");
        let abbreviated = format!("{initial}. {last}");

        let forward = match_authors(&[abbreviated.clone()], &[full.clone()]);
        prop_assert!(forward.contains(&full));

        let reverse = match_authors(&[full], &[abbreviated.clone()]);
        prop_assert!(reverse.contains(&abbreviated));
    }

    #[test]
    fn different_full_first_names_never_match(
        a in name_token(),
        b in name_token(),
        last in name_token(),
    ) {
        prop_assume!(a.to_lowercase() != b.to_lowercase());
        prop_assert!(!names_compatible(&pair(&a, &last), &pair(&b, &last)));
        let name_a = format!("{a} {last}");
        let name_b = format!("{b} {last}");
        prop_assert!(match_authors(&[name_a], &[name_b]).is_empty());
    }
}

#[test]
fn same_last_name_different_first_name_is_not_a_match() {
    assert!(match_authors(&strings(&["John Smith"]), &strings(&["Jane Smith"])).is_empty());
}

#[test]
fn initial_must_agree_with_first_letter() {
    assert!(match_authors(&strings(&["J. Smith"]), &strings(&["Mary Smith"])).is_empty());
    assert_eq!(
        match_authors(&strings(&["M. Smith"]), &strings(&["Mary Smith"])).len(),
        1
    );
}

#[test]
fn diacritics_do_not_block_matches() {
    let matched = match_authors(
        &strings(&["José García-Márquez"]),
        &strings(&["Jose Garcia-Marquez"]),
    );
    assert_eq!(matched.len(), 1);

    let matched = match_authors(&strings(&["Müller, Jürgen"]), &strings(&["Jurgen Muller"]));
    assert_eq!(matched.len(), 1);
}

#[test]
fn unusable_names_are_skipped() {
    assert!(normalize("").is_none());
    assert!(normalize("   ").is_none());
    assert_eq!(
        match_authors(&strings(&["", "Evan Eichler"]), &strings(&["", "Evan Eichler"])).len(),
        1
    );
}

#[test]
fn suffix_after_second_comma_still_matches() {
    let matched = match_authors(
        &strings(&["Smith, John, Jr.", "Doe, J., PhD"]),
        &strings(&["John Smith", "Jane Doe"]),
    );
    assert!(matched.contains("John Smith"));
    assert!(matched.contains("Jane Doe"));
}
