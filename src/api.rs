use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::model::{FilterResult, OcrResults, SearchRequest, UploadResponse};
use crate::notes::NoteSet;
use crate::search::WordGroups;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Failures at the backend boundary, one variant per action so the caller
/// can report them under the right heading. Nothing here retries.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("could not retrieve OCR results: {0}")]
    Results(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("publish failed: {0}")]
    Export(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Body of `POST /publish-notes`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub note_sets: BTreeMap<u32, Vec<NoteSet>>,
    pub filename: String,
}

/// Everything the client asks of the OCR review server. The trait is the
/// seam the tests fake out; the app never talks HTTP directly. `Send +
/// Sync` because uploads run on a worker thread.
pub trait Backend: Send + Sync {
    fn upload_pdf(
        &self,
        path: &Path,
        page_range: Option<(u32, u32)>,
    ) -> Result<UploadResponse, BackendError>;

    fn get_results(&self, result_id: &str, filename: &str) -> Result<OcrResults, BackendError>;

    fn search(&self, request: &SearchRequest) -> Result<FilterResult, BackendError>;

    /// Returns the binary export artifact.
    fn publish_notes(&self, request: &PublishRequest) -> Result<Vec<u8>, BackendError>;

    /// Representative groups for the canonical search words, fetched once
    /// at startup.
    fn word_groups(&self) -> Result<WordGroups, BackendError>;

    fn base_url(&self) -> &str;

    /// Direct-navigation URL for the raw JSON download (no request made).
    fn download_json_url(&self, result_id: &str, filename: &str) -> String {
        format!(
            "{}/download-json/{}/{}",
            self.base_url().trim_end_matches('/'),
            result_id,
            filename
        )
    }

    /// Rendered page image with word-level highlight overlay.
    fn highlighted_image_url(&self, result_id: &str, page_number: u32, words: &[String]) -> String {
        let base = format!(
            "{}/highlighted-page-images/{}/{}",
            self.base_url().trim_end_matches('/'),
            result_id,
            page_number
        );
        if words.is_empty() {
            base
        } else {
            format!("{}?words={}", base, words.join(","))
        }
    }
}

/// Blocking-reqwest implementation. Calls are issued from worker threads
/// or between ticks; per the transport model there is no application-layer
/// timeout beyond the connection itself.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pull the `{"error": "..."}` message out of a failed response, falling
/// back to the HTTP status line.
fn failure_message(response: reqwest::blocking::Response) -> String {
    let status = response.status();
    let body: Option<serde_json::Value> = response.json().ok();
    body.as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("server returned {status}"))
}

impl Backend for HttpBackend {
    fn upload_pdf(
        &self,
        path: &Path,
        page_range: Option<(u32, u32)>,
    ) -> Result<UploadResponse, BackendError> {
        info!("uploading {}", path.display());
        let mut form = reqwest::blocking::multipart::Form::new()
            .file("pdfFile", path)
            .map_err(|e| BackendError::Upload(e.to_string()))?;
        if let Some((start, end)) = page_range {
            form = form
                .text("startPage", start.to_string())
                .text("endPage", end.to_string());
        }

        let response = self
            .client
            .post(self.url("/upload-pdf"))
            .multipart(form)
            .send()?;
        if !response.status().is_success() {
            return Err(BackendError::Upload(failure_message(response)));
        }
        let upload: UploadResponse = response.json()?;
        if !upload.success {
            let message = upload
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BackendError::Upload(message));
        }
        Ok(upload)
    }

    fn get_results(&self, result_id: &str, filename: &str) -> Result<OcrResults, BackendError> {
        debug!("fetching results for {}", result_id);
        let response = self
            .client
            .get(self.url(&format!("/get-results/{result_id}/{filename}")))
            .send()?;
        if !response.status().is_success() {
            return Err(BackendError::Results(failure_message(response)));
        }
        Ok(response.json()?)
    }

    fn search(&self, request: &SearchRequest) -> Result<FilterResult, BackendError> {
        debug!(
            "search: {} words, filter {:?}",
            request.search_words.len(),
            request.filter_type
        );
        let response = self
            .client
            .post(self.url("/search-results"))
            .json(request)
            .send()?;
        if !response.status().is_success() {
            return Err(BackendError::Search(failure_message(response)));
        }
        Ok(response.json()?)
    }

    fn publish_notes(&self, request: &PublishRequest) -> Result<Vec<u8>, BackendError> {
        info!("publishing notes for {} pages", request.note_sets.len());
        let response = self
            .client
            .post(self.url("/publish-notes"))
            .json(request)
            .send()?;
        if !response.status().is_success() {
            return Err(BackendError::Export(failure_message(response)));
        }
        Ok(response.bytes()?.to_vec())
    }

    fn word_groups(&self) -> Result<WordGroups, BackendError> {
        let response = self.client.get(self.url("/word-groups")).send()?;
        if !response.status().is_success() {
            return Err(BackendError::Results(failure_message(response)));
        }
        Ok(response.json()?)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
