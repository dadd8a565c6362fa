use crate::model::FilterResult;
use crate::navigation::NavigationState;
use crate::notes::AnnotationStore;
use crate::search::{WordGroups, WordSelection};

/// Fixed suffix the server appends to result artifacts.
const RESULT_SUFFIX: &str = "_ocr_results.json";

/// Identifies the currently loaded document and its server-side result
/// artifact. Created on successful upload, dropped on reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSession {
    pub result_id: String,
    pub original_filename: String,
    pub result_artifact_path: String,
}

impl DocumentSession {
    pub fn new(result_id: impl Into<String>, original_filename: impl Into<String>) -> Self {
        let result_id = result_id.into();
        let original_filename = original_filename.into();
        let result_artifact_path = derive_artifact_path(&result_id, &original_filename);
        Self {
            result_id,
            original_filename,
            result_artifact_path,
        }
    }
}

/// `results/{id}_{stem}_ocr_results.json`: the extension is stripped and
/// the fixed suffix appended, matching the server's layout.
fn derive_artifact_path(result_id: &str, original_filename: &str) -> String {
    let stem = match original_filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => original_filename,
    };
    format!("results/{result_id}_{stem}{RESULT_SUFFIX}")
}

/// All per-document mutable state, owned by the controller. A single
/// document session at a time: `reset()` clears every field atomically so
/// page numbers from an old document can never collide with a new one.
/// Word groups are page-load configuration and survive resets.
#[derive(Debug, Default)]
pub struct SessionState {
    pub session: Option<DocumentSession>,
    pub filter_result: Option<FilterResult>,
    pub store: AnnotationStore,
    pub navigation: NavigationState,
    pub words: WordSelection,
    /// The whole-word matching caveat is shown once per document session,
    /// on the first search.
    pub caveat_shown: bool,
}

impl SessionState {
    pub fn new(groups: WordGroups) -> Self {
        Self {
            words: WordSelection::new(groups),
            ..Self::default()
        }
    }

    pub fn has_document(&self) -> bool {
        self.session.is_some()
    }

    /// Clear everything belonging to the previous document before any new
    /// data is attached.
    pub fn reset(&mut self) {
        self.session = None;
        self.filter_result = None;
        self.store.clear();
        self.navigation.clear();
        self.caveat_shown = false;
    }
}
