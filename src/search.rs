use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Display mode controlling which pages are listed. Matching itself is
/// whole-word and case-insensitive, performed server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Highlights,
    Words,
    Both,
    All,
}

impl FilterType {
    pub const ORDER: [FilterType; 4] = [
        FilterType::Highlights,
        FilterType::Words,
        FilterType::Both,
        FilterType::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterType::Highlights => "Highlights Only",
            FilterType::Words => "Search Words Only",
            FilterType::Both => "Highlights OR Search Words",
            FilterType::All => "All Pages",
        }
    }

    /// Cycle through the filter modes in display order.
    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }
}

/// Server-supplied expansion of a canonical search term into its surface
/// variants (stems, synonyms). Fetched once at page load.
pub type WordGroups = HashMap<String, Vec<String>>;

/// Tracks which canonical words the user has selected and expands them
/// into the request payload.
#[derive(Debug, Default, Clone)]
pub struct WordSelection {
    groups: WordGroups,
    /// Canonical words in a stable display order.
    canonical: Vec<String>,
    selected: Vec<bool>,
}

impl WordSelection {
    pub fn new(groups: WordGroups) -> Self {
        let mut canonical: Vec<String> = groups.keys().cloned().collect();
        canonical.sort();
        let selected = vec![false; canonical.len()];
        Self {
            groups,
            canonical,
            selected,
        }
    }

    pub fn canonical_words(&self) -> &[String] {
        &self.canonical
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(flag) = self.selected.get_mut(index) {
            *flag = !*flag;
        }
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    /// The de-duplicated union of every selected word's representative
    /// group, preserving first-seen order. A canonical word with no group
    /// entry represents itself.
    pub fn request_words(&self) -> Vec<String> {
        let mut words = Vec::new();
        for (word, selected) in self.canonical.iter().zip(&self.selected) {
            if !selected {
                continue;
            }
            match self.groups.get(word) {
                Some(variants) if !variants.is_empty() => {
                    for variant in variants {
                        if !words.contains(variant) {
                            words.push(variant.clone());
                        }
                    }
                }
                _ => {
                    if !words.contains(word) {
                        words.push(word.clone());
                    }
                }
            }
        }
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection_with(groups: &[(&str, &[&str])]) -> WordSelection {
        let groups: WordGroups = groups
            .iter()
            .map(|(word, variants)| {
                (
                    word.to_string(),
                    variants.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();
        WordSelection::new(groups)
    }

    #[test]
    fn filter_type_wire_form() {
        assert_eq!(
            serde_json::to_string(&FilterType::Highlights).unwrap(),
            "\"highlights\""
        );
        let parsed: FilterType = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(parsed, FilterType::All);
    }

    #[test]
    fn filter_type_cycles_through_all_modes() {
        let mut mode = FilterType::Highlights;
        for _ in 0..FilterType::ORDER.len() {
            mode = mode.next();
        }
        assert_eq!(mode, FilterType::Highlights);
    }

    #[test]
    fn request_words_are_union_of_groups() {
        let mut selection = selection_with(&[
            ("note", &["note", "notes", "noted"]),
            ("pose", &["pose", "poses"]),
        ]);
        selection.toggle(0);
        selection.toggle(1);

        assert_eq!(
            selection.request_words(),
            vec!["note", "notes", "noted", "pose", "poses"]
        );
    }

    #[test]
    fn request_words_deduplicate_across_groups() {
        let mut selection = selection_with(&[
            ("important", &["important", "importance", "key"]),
            ("key", &["key", "keys"]),
        ]);
        selection.toggle(0);
        selection.toggle(1);

        let words = selection.request_words();
        assert_eq!(words.iter().filter(|w| *w == "key").count(), 1);
        assert_eq!(words, vec!["important", "importance", "key", "keys"]);
    }

    #[test]
    fn unselected_words_contribute_nothing() {
        let mut selection = selection_with(&[("note", &["note", "notes"])]);
        assert!(selection.request_words().is_empty());
        selection.toggle(0);
        selection.toggle(0);
        assert!(selection.request_words().is_empty());
    }

    #[test]
    fn word_without_group_represents_itself() {
        let mut selection = selection_with(&[("conclusion", &[])]);
        selection.toggle(0);
        assert_eq!(selection.request_words(), vec!["conclusion"]);
    }
}
