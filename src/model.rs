use serde::{Deserialize, Serialize};

use crate::search::FilterType;

/// Shown in the text pane when the server returned no text for a page.
pub const NO_TEXT_SENTINEL: &str = "No text content available for this page.";

/// One OCR'd page as reported by the server. Read-only on the client;
/// `page_number` is 1-based and is the sole join key between the catalog,
/// the filter results and the annotation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    #[serde(default)]
    pub has_annotations: bool,
    /// Present only when `has_annotations` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_highlights_count: Option<u32>,
    #[serde(default)]
    pub contains_search_words: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_image_url: Option<String>,
}

impl Page {
    /// Match predicate: a page counts as matching when it carried source
    /// highlight markup or a whole-word search hit.
    pub fn is_match(&self) -> bool {
        self.has_annotations || self.contains_search_words
    }

    pub fn display_text(&self) -> &str {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_TEXT_SENTINEL,
        }
    }
}

/// Raw OCR result document from `GET /get-results/{id}/{filename}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub total_pages_in_document: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_processed: Option<u32>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInformation {
    pub filter_type: FilterType,
    pub total_matching_pages: usize,
    #[serde(default)]
    pub search_words: Vec<String>,
}

/// Response of `POST /search-results`. `pages` is every page of the
/// document in ascending order; `filtered_pages` is the subset satisfying
/// the active filter (same order, same join key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    pub total_pages_in_document: u32,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub filtered_pages: Vec<Page>,
    pub search_information: SearchInformation,
}

impl FilterResult {
    pub fn page(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Pages the catalog should list: everything for `FilterType::All`,
    /// otherwise the server-filtered subset.
    pub fn listed_pages(&self) -> &[Page] {
        if self.search_information.filter_type == FilterType::All {
            &self.pages
        } else {
            &self.filtered_pages
        }
    }
}

/// Response of `POST /upload-pdf`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /search-results`. The server expects camelCase keys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub result_path: String,
    pub search_words: Vec<String>,
    pub filter_type: FilterType,
}

/// Payload of a `progress_update` push event.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub percentage: u32,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub message: String,
    pub status: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ProgressUpdate {
    pub fn latest_error(&self) -> Option<&str> {
        self.errors.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_sentinel() {
        let page: Page = serde_json::from_str(r#"{"page_number": 4}"#).unwrap();
        assert_eq!(page.page_number, 4);
        assert!(!page.has_annotations);
        assert!(!page.is_match());
        assert_eq!(page.display_text(), NO_TEXT_SENTINEL);
    }

    #[test]
    fn blank_text_uses_sentinel() {
        let page: Page =
            serde_json::from_str(r#"{"page_number": 1, "text": "   "}"#).unwrap();
        assert_eq!(page.display_text(), NO_TEXT_SENTINEL);
    }

    #[test]
    fn search_request_is_camel_case() {
        let request = SearchRequest {
            result_path: "results/abc_doc_ocr_results.json".to_string(),
            search_words: vec!["pose".to_string()],
            filter_type: FilterType::Both,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("resultPath").is_some());
        assert!(json.get("searchWords").is_some());
        assert_eq!(json["filterType"], "both");
    }

    #[test]
    fn filter_result_listed_pages_depend_on_filter_type() {
        let raw = r#"{
            "total_pages_in_document": 2,
            "pages": [
                {"page_number": 1},
                {"page_number": 2, "has_annotations": true}
            ],
            "filtered_pages": [
                {"page_number": 2, "has_annotations": true}
            ],
            "search_information": {
                "filter_type": "highlights",
                "total_matching_pages": 1,
                "search_words": []
            }
        }"#;
        let mut result: FilterResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.listed_pages().len(), 1);

        result.search_information.filter_type = FilterType::All;
        assert_eq!(result.listed_pages().len(), 2);
    }
}
