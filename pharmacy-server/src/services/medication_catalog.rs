//! Medication labels, typed-name parsing and the merged catalog summary
//!
//! The catalog accumulates near-duplicate entries over time: the same
//! medication typed with an en dash instead of a hyphen, doubled spaces, a
//! zero-width character pasted from a spreadsheet. The summary view merges
//! them under one normalized key.

use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

#[allow(clippy::expect_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        /// Institutional code: `D-DD-DD-DDDD`
        pub static ref MEDICATION_CODE: Regex =
            Regex::new(r"^[0-9]-[0-9]{2}-[0-9]{2}-[0-9]{4}$").expect("static pattern compiles");
    }
}

/// Display label: `"<code> - <name>"`, or just the name without a code.
pub fn medication_label(code: Option<&str>, name: &str) -> String {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => format!("{} - {}", code, name),
        None => name.to_string(),
    }
}

pub fn is_medication_code(value: &str) -> bool {
    patterns::MEDICATION_CODE.is_match(value)
}

fn is_zero_width(ch: char) -> bool {
    matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}')
}

fn is_dash_variant(ch: char) -> bool {
    ('\u{2010}'..='\u{2015}').contains(&ch)
}

/// Grouping key for catalog entries: NFKC, zero-width characters removed,
/// dash variants folded to `-`, whitespace runs collapsed, trimmed and
/// upper-cased.
pub fn normalize_key(value: &str) -> String {
    let folded: String = value
        .nfkc()
        .filter(|ch| !is_zero_width(*ch))
        .map(|ch| if is_dash_variant(ch) { '-' } else { ch })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

/// Medication as typed in a record edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationInput {
    pub id: Option<Uuid>,
    pub code: Option<String>,
    pub name: String,
}

/// Resolve what the user typed into an explicit id, a code and a clean name.
///
/// Without id or code, `"1-01-02-0003 - PARACETAMOL"` is split into code and
/// name. With a code, a name that repeats the code as prefix is stripped.
pub fn parse_medication_input(id: Option<Uuid>, code: Option<&str>, name: &str) -> MedicationInput {
    let code = code.map(str::trim).filter(|c| !c.is_empty());
    let mut name = name.trim().to_string();

    if id.is_none() && code.is_none() {
        let parts: Vec<&str> = name
            .split(" - ")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 && is_medication_code(parts[0]) {
            return MedicationInput {
                id: None,
                code: Some(parts[0].to_uppercase()),
                name: parts[1..].join(" - ").to_uppercase(),
            };
        }
    }

    if let Some(code) = code {
        let prefix = format!("{} - ", code).to_uppercase();
        if name.to_uppercase().starts_with(&prefix) {
            name = name.chars().skip(prefix.chars().count()).collect::<String>().trim().to_string();
        }
    }

    MedicationInput {
        id,
        code: code.map(str::to_uppercase),
        name: name.to_uppercase(),
    }
}

/// One catalog row with its usage count, as fetched for the summary.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryCandidate {
    pub id: Uuid,
    pub code: Option<String>,
    pub name: String,
    pub item_count: i64,
}

/// Catalog entries merged under one normalized key
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MedicationGroup {
    pub key: String,
    /// Label of the first (most used) entry of the group
    pub name: String,
    pub ids: Vec<Uuid>,
    pub count: i64,
}

/// Merge candidates by normalized label, then sort by usage desc and label
/// asc, keeping at most `take` groups.
pub fn summarize(candidates: Vec<SummaryCandidate>, take: usize) -> Vec<MedicationGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, MedicationGroup> = HashMap::new();

    for candidate in candidates {
        let label = medication_label(candidate.code.as_deref(), &candidate.name);
        let key = normalize_key(&label);

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            MedicationGroup {
                key: key.clone(),
                name: label,
                ids: Vec::new(),
                count: 0,
            }
        });
        if !group.ids.contains(&candidate.id) {
            group.ids.push(candidate.id);
        }
        group.count += candidate.item_count;
    }

    let mut merged: Vec<MedicationGroup> = order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect();

    merged.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    merged.truncate(take);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(code: Option<&str>, name: &str, count: i64) -> SummaryCandidate {
        SummaryCandidate {
            id: Uuid::new_v4(),
            code: code.map(str::to_string),
            name: name.to_string(),
            item_count: count,
        }
    }

    #[test]
    fn test_label() {
        assert_eq!(medication_label(Some("1-01-02-0003"), "PARACETAMOL"), "1-01-02-0003 - PARACETAMOL");
        assert_eq!(medication_label(None, "PARACETAMOL"), "PARACETAMOL");
        assert_eq!(medication_label(Some(" "), "PARACETAMOL"), "PARACETAMOL");
    }

    #[test]
    fn test_normalize_key_folds_variants() {
        assert_eq!(normalize_key("1\u{2013}01-02-0003  -  paracetamol"), "1-01-02-0003 - PARACETAMOL");
        assert_eq!(normalize_key("\u{FEFF}Metamizol\u{200B} 1g "), "METAMIZOL 1G");
        // NFKC folds the full-width letters and the ligature
        assert_eq!(normalize_key("ＡＢＣ ﬁ"), "ABC FI");
    }

    #[test]
    fn test_parse_typed_code_and_name() {
        let parsed = parse_medication_input(None, None, "1-01-02-0003 - paracetamol - jarabe");
        assert_eq!(parsed.code.as_deref(), Some("1-01-02-0003"));
        assert_eq!(parsed.name, "PARACETAMOL - JARABE");
    }

    #[test]
    fn test_code_pattern_is_ascii_only() {
        assert!(is_medication_code("1-23-45-6789"));
        assert!(!is_medication_code("١-٢٣-٤٥-٦٧٨٩"));

        let parsed = parse_medication_input(None, None, "١-٢٣-٤٥-٦٧٨٩ - paracetamol");
        assert_eq!(parsed.code, None);
        assert_eq!(parsed.name, "١-٢٣-٤٥-٦٧٨٩ - PARACETAMOL");
    }

    #[test]
    fn test_parse_keeps_plain_names() {
        let parsed = parse_medication_input(None, None, "ondansetron - 8mg");
        assert_eq!(parsed.code, None);
        assert_eq!(parsed.name, "ONDANSETRON - 8MG");
    }

    #[test]
    fn test_parse_strips_repeated_code_prefix() {
        let parsed = parse_medication_input(None, Some("1-01-02-0003"), "1-01-02-0003 - Paracetamol");
        assert_eq!(parsed.code.as_deref(), Some("1-01-02-0003"));
        assert_eq!(parsed.name, "PARACETAMOL");
    }

    #[test]
    fn test_parse_explicit_id_wins() {
        let id = Uuid::new_v4();
        let parsed = parse_medication_input(Some(id), None, "1-01-02-0003 - paracetamol");
        assert_eq!(parsed.id, Some(id));
        assert_eq!(parsed.code, None);
        assert_eq!(parsed.name, "1-01-02-0003 - PARACETAMOL");
    }

    #[test]
    fn test_summarize_merges_and_sorts() {
        let groups = summarize(
            vec![
                candidate(Some("1-01-02-0003"), "PARACETAMOL", 5),
                candidate(Some("1\u{2013}01\u{2013}02\u{2013}0003"), "PARACETAMOL", 3),
                candidate(None, "METAMIZOL", 7),
                candidate(None, "ACICLOVIR", 7),
                candidate(None, "ZINC", 0),
            ],
            3,
        );

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name, "1-01-02-0003 - PARACETAMOL");
        assert_eq!(groups[0].ids.len(), 2);
        assert_eq!(groups[0].count, 8);
        // ties on count fall back to the label
        assert_eq!(groups[1].name, "ACICLOVIR");
        assert_eq!(groups[2].name, "METAMIZOL");
    }

    proptest! {
        #[test]
        fn prop_normalize_key_is_idempotent(
            input in "[a-zA-Z0-9 áéíóúñÁÉÍÓÚÑ\u{2010}-\u{2015}\u{200B}\u{FEFF}-]{0,40}"
        ) {
            let once = normalize_key(&input);
            prop_assert_eq!(normalize_key(&once), once);
        }

        #[test]
        fn prop_whitespace_and_dashes_do_not_split_groups(
            word_a in "[a-z]{1,8}",
            word_b in "[a-z]{1,8}",
            spaces in " {1,4}",
            dash in prop::sample::select(vec!['-', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}']),
        ) {
            let plain = format!("{} - {}", word_a, word_b);
            let noisy = format!("\u{200B}{}{}{}{}{} ", word_a, spaces, dash, spaces, word_b);
            prop_assert_eq!(normalize_key(&plain), normalize_key(&noisy));
        }
    }
}
