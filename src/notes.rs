use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Doctor type options offered by the note form. The set is advisory on the
/// client; the server validates on publish.
pub const DOCTOR_TYPES: &[&str] = &[
    "General Practitioner",
    "Specialist",
    "Surgeon",
    "Radiologist",
    "Psychiatrist",
    "Other",
];

/// One structured annotation record for a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSet {
    #[serde(default)]
    pub is_hospital: bool,
    #[serde(default)]
    pub doctor_type: String,
    /// `DD/MM/YYYY` after normalization; invalid values are kept as typed.
    #[serde(default)]
    pub case_date: String,
    #[serde(default)]
    pub citation_notes: String,
}

impl NoteSet {
    /// A note set with all four fields falsy/blank is dropped from the
    /// persisted store on save.
    pub fn is_empty(&self) -> bool {
        !self.is_hospital
            && self.doctor_type.trim().is_empty()
            && self.case_date.trim().is_empty()
            && self.citation_notes.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseDate {
    Blank,
    /// Zero-padded `DD/MM/YYYY`.
    Valid(String),
    /// Wrong shape or not a calendar date; stored as typed.
    Invalid,
}

/// Normalize a `D/M/YYYY`-shaped date to `DD/MM/YYYY`. Validation is
/// advisory: invalid input is flagged, never rejected.
pub fn normalize_case_date(raw: &str) -> CaseDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return CaseDate::Blank;
    }
    let shape = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("date shape regex");
    let Some(captures) = shape.captures(raw) else {
        return CaseDate::Invalid;
    };
    let day: u32 = captures[1].parse().unwrap_or(0);
    let month: u32 = captures[2].parse().unwrap_or(0);
    let year: i32 = captures[3].parse().unwrap_or(0);

    match chrono::NaiveDate::from_ymd_opt(year, month, day) {
        Some(_) => CaseDate::Valid(format!("{day:02}/{month:02}/{year:04}")),
        None => CaseDate::Invalid,
    }
}

/// Page number → ordered note sets. Order is the visual order and is
/// preserved through export. Entries are created lazily on the first save
/// of a page with content and cleared entirely on new-document load.
#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    notes: HashMap<u32, Vec<NoteSet>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the page's list wholesale, dropping empty sets. Returns the
    /// retained count so the page-list badge can refresh.
    pub fn set_note_sets(&mut self, page_number: u32, sets: Vec<NoteSet>) -> usize {
        let retained: Vec<NoteSet> = sets.into_iter().filter(|s| !s.is_empty()).collect();
        let count = retained.len();
        if retained.is_empty() {
            self.notes.remove(&page_number);
        } else {
            self.notes.insert(page_number, retained);
        }
        count
    }

    pub fn note_sets(&self, page_number: u32) -> &[NoteSet] {
        self.notes
            .get(&page_number)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn note_count(&self, page_number: u32) -> usize {
        self.notes.get(&page_number).map_or(0, Vec::len)
    }

    /// True iff at least one stored set has a non-blank field. Gates the
    /// publish action.
    pub fn has_any_content(&self) -> bool {
        self.notes.values().flatten().any(|set| !set.is_empty())
    }

    /// Full mapping for the publish endpoint, ordered by page number.
    pub fn export_snapshot(&self) -> BTreeMap<u32, Vec<NoteSet>> {
        self.notes
            .iter()
            .map(|(page, sets)| (*page, sets.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub set: NoteSet,
    /// Advisory flag from the last normalization pass.
    pub date_invalid: bool,
}

impl NoteDraft {
    fn from_set(set: NoteSet) -> Self {
        Self {
            set,
            date_invalid: false,
        }
    }
}

/// Editable drafts for the currently displayed page. Drafts only reach the
/// `AnnotationStore` through a save cycle; an empty draft stays visible in
/// the form until then. Removal is the only mutation gated by confirmation.
#[derive(Debug, Default, Clone)]
pub struct NoteEditor {
    page_number: Option<u32>,
    drafts: Vec<NoteDraft>,
    pending_removal: Option<usize>,
}

impl NoteEditor {
    /// Begin editing a page, seeding drafts from the store.
    pub fn open(&mut self, page_number: u32, store: &AnnotationStore) {
        self.page_number = Some(page_number);
        self.drafts = store
            .note_sets(page_number)
            .iter()
            .cloned()
            .map(NoteDraft::from_set)
            .collect();
        self.pending_removal = None;
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    pub fn drafts(&self) -> &[NoteDraft] {
        &self.drafts
    }

    pub fn draft_mut(&mut self, index: usize) -> Option<&mut NoteSet> {
        self.drafts.get_mut(index).map(|d| &mut d.set)
    }

    /// Display index shown next to a draft, always renumbered 1..N.
    pub fn display_index(&self, index: usize) -> usize {
        index + 1
    }

    pub fn add_draft(&mut self, initial: Option<NoteSet>) -> usize {
        self.drafts
            .push(NoteDraft::from_set(initial.unwrap_or_default()));
        self.drafts.len() - 1
    }

    /// First step of removal: remember the index and wait for confirmation.
    pub fn request_removal(&mut self, index: usize) -> bool {
        if index < self.drafts.len() {
            self.pending_removal = Some(index);
            true
        } else {
            false
        }
    }

    pub fn pending_removal(&self) -> Option<usize> {
        self.pending_removal
    }

    pub fn cancel_removal(&mut self) {
        self.pending_removal = None;
    }

    /// Execute a confirmed removal. Remaining drafts keep their relative
    /// order; display indices renumber implicitly.
    pub fn confirm_removal(&mut self) -> Option<NoteDraft> {
        let index = self.pending_removal.take()?;
        if index < self.drafts.len() {
            Some(self.drafts.remove(index))
        } else {
            None
        }
    }

    /// Re-run date normalization over every draft, rewriting valid dates in
    /// place and flagging invalid ones.
    pub fn normalize_dates(&mut self) {
        for draft in &mut self.drafts {
            match normalize_case_date(&draft.set.case_date) {
                CaseDate::Blank => {
                    draft.date_invalid = false;
                }
                CaseDate::Valid(normalized) => {
                    draft.set.case_date = normalized;
                    draft.date_invalid = false;
                }
                CaseDate::Invalid => {
                    draft.date_invalid = true;
                }
            }
        }
    }

    /// Flush the drafts into the store (the save cycle). Runs before every
    /// navigation so edits are never lost to a page change. Returns the
    /// page and its retained note count for the badge refresh, or `None`
    /// when no page is open.
    pub fn save_into(&mut self, store: &mut AnnotationStore) -> Option<(u32, usize)> {
        let page_number = self.page_number?;
        self.normalize_dates();
        let sets: Vec<NoteSet> = self.drafts.iter().map(|d| d.set.clone()).collect();
        let count = store.set_note_sets(page_number, sets);
        Some((page_number, count))
    }
}
