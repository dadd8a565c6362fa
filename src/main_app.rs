//! The controller. Owns all mutable state and consumes [`Intent`]s; render
//! code never mutates anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use log::{info, warn};
use tui_textarea::TextArea;

use crate::api::{Backend, BackendError, PublishRequest};
use crate::export::save_export;
use crate::inputs::{Event, EventSource, Intent, KeyCode, KeyEvent, KeyModifiers, Panel, map_key};
use crate::model::{FilterResult, OcrResults, Page, SearchRequest, UploadResponse};
use crate::navigation::{NavTarget, NavigationState};
use crate::notes::{DOCTOR_TYPES, NoteEditor};
use crate::notification::NotificationManager;
use crate::progress::ProgressMonitor;
use crate::search::FilterType;
use crate::session::{DocumentSession, SessionState};
use crate::transport::{ChannelEvent, ProgressChannel};

/// Shown once per document session, on the first search.
pub const WHOLE_WORD_CAVEAT: &str =
    "Matching is whole-word and case-insensitive; partial words will not match.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Text,
    Image,
}

impl ViewMode {
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Text => ViewMode::Image,
            ViewMode::Image => ViewMode::Text,
        }
    }
}

/// Which note field a textarea is currently capturing input for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    CaseDate,
    CitationNotes,
}

pub struct FieldEdit {
    pub field: NoteField,
    pub textarea: TextArea<'static>,
}

/// Result of one backend request, delivered back to the event loop over a
/// flume channel. Every request runs on a named worker thread so a stalled
/// server can never freeze the UI; the loop keeps repainting and quitting
/// stays possible. One request is in flight at a time, no cancellation.
enum TaskOutcome {
    Upload(Result<UploadResponse, BackendError>),
    Results(Result<OcrResults, BackendError>),
    Search(Result<FilterResult, BackendError>),
    Publish(Result<Vec<u8>, BackendError>),
}

pub struct App {
    backend: Arc<dyn Backend>,
    pub state: SessionState,
    pub editor: NoteEditor,
    pub monitor: ProgressMonitor,
    pub notifications: NotificationManager,
    channel: Option<ProgressChannel>,
    task_rx: Option<flume::Receiver<TaskOutcome>>,
    /// A search was requested while another request was in flight; re-run
    /// with the then-current selection once the task finishes.
    pending_search: bool,
    pub filter_type: FilterType,
    pub focus: Panel,
    pub view_mode: ViewMode,
    pub selected_draft: usize,
    pub field_edit: Option<FieldEdit>,
    export_dir: PathBuf,
    page_range: Option<(u32, u32)>,
    last_upload: Option<PathBuf>,
    should_quit: bool,
    test_mode: bool,
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        export_dir: PathBuf,
        page_range: Option<(u32, u32)>,
    ) -> Self {
        let mut notifications = NotificationManager::new();
        let groups = match backend.word_groups() {
            Ok(groups) => groups,
            Err(e) => {
                warn!("word groups unavailable: {}", e);
                notifications.warn(format!("Search word groups unavailable: {e}"));
                Default::default()
            }
        };
        Self {
            backend,
            state: SessionState::new(groups),
            editor: NoteEditor::default(),
            monitor: ProgressMonitor::new(),
            notifications,
            channel: None,
            task_rx: None,
            pending_search: false,
            filter_type: FilterType::Both,
            focus: Panel::Pages,
            view_mode: ViewMode::Text,
            selected_draft: 0,
            field_edit: None,
            export_dir,
            page_range,
            last_upload: None,
            should_quit: false,
            test_mode: false,
        }
    }

    /// App wired for tests: synchronous backend requests, no reader
    /// thread, no completion display delay.
    pub fn for_tests(backend: Arc<dyn Backend>, export_dir: PathBuf) -> Self {
        let mut app = Self::new(backend, export_dir, None);
        app.test_mode = true;
        app.monitor = ProgressMonitor::with_display_delay(std::time::Duration::ZERO);
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Inject a scripted progress channel (tests).
    pub fn attach_channel(&mut self, channel: ProgressChannel) {
        self.channel = Some(channel);
    }

    pub fn current_page(&self) -> Option<&Page> {
        let current = self.state.navigation.current()?;
        self.state.filter_result.as_ref()?.page(current)
    }

    pub fn matching_count(&self) -> usize {
        self.state.navigation.matching_pages().len()
    }

    pub fn download_json_url(&self) -> Option<String> {
        let session = self.state.session.as_ref()?;
        Some(
            self.backend
                .download_json_url(&session.result_id, &session.original_filename),
        )
    }

    /// URL of the currently displayed page's image with the active search
    /// words highlighted.
    pub fn highlighted_image_url(&self) -> Option<String> {
        let session = self.state.session.as_ref()?;
        let page = self.state.navigation.current()?;
        Some(self.backend.highlighted_image_url(
            &session.result_id,
            page,
            &self.state.words.request_words(),
        ))
    }

    // --- event handling ---------------------------------------------------

    pub fn handle_event(&mut self, event: &Event) {
        let Event::Key(key) = event else {
            return;
        };
        if self.field_edit.is_some() {
            self.handle_field_edit_key(key);
            return;
        }
        let confirming = self.editor.pending_removal().is_some();
        if let Some(intent) = map_key(key, self.focus, confirming) {
            self.dispatch(intent);
        }
    }

    pub fn dispatch(&mut self, intent: Intent) {
        match intent {
            Intent::Quit => self.should_quit = true,
            Intent::Navigate(target) => self.navigate(target),
            Intent::CycleFilter => self.cycle_filter(),
            Intent::ToggleWord(index) => self.toggle_word(index),
            Intent::RunSearch => self.run_search(),
            Intent::ToggleViewMode => self.view_mode = self.view_mode.toggle(),
            Intent::FocusNextPanel => self.focus = self.focus.next(),
            Intent::SelectNextDraft => self.select_draft(1),
            Intent::SelectPrevDraft => self.select_draft(-1),
            Intent::AddNoteSet => {
                self.selected_draft = self.editor.add_draft(None);
            }
            Intent::RequestRemoveNoteSet => {
                self.editor.request_removal(self.selected_draft);
            }
            Intent::ConfirmRemoval => {
                if self.editor.confirm_removal().is_some() {
                    self.clamp_selected_draft();
                    // Persist the removal right away: an unconfirmed save
                    // would resurrect the set on the next page open.
                    self.save_notes();
                }
            }
            Intent::CancelRemoval => self.editor.cancel_removal(),
            Intent::ToggleHospital => {
                if let Some(set) = self.editor.draft_mut(self.selected_draft) {
                    set.is_hospital = !set.is_hospital;
                }
            }
            Intent::CycleDoctorType => self.cycle_doctor_type(),
            Intent::EditCaseDate => self.begin_field_edit(NoteField::CaseDate),
            Intent::EditCitationNotes => self.begin_field_edit(NoteField::CitationNotes),
            Intent::SaveNotes => {
                if let Some((page, count)) = self.save_notes() {
                    self.notifications
                        .info(format!("Saved {count} note set(s) for page {page}"));
                }
            }
            Intent::Publish => self.publish(),
            Intent::DownloadJson => self.download_json(),
            Intent::Dismiss => {
                self.notifications.dismiss_current();
            }
        }
    }

    /// Per-tick housekeeping: worker results, push-channel events, delayed
    /// completion, notification expiry.
    pub fn tick(&mut self) {
        let outcome = self.task_rx.as_ref().and_then(|rx| rx.try_recv().ok());
        if let Some(outcome) = outcome {
            self.task_rx = None;
            self.handle_outcome(outcome);
            if self.pending_search {
                self.pending_search = false;
                self.run_search();
            }
        }

        let events: Vec<ChannelEvent> = self
            .channel
            .as_ref()
            .map(|c| c.drain())
            .unwrap_or_default();
        for event in events {
            match event {
                ChannelEvent::Progress(update) => self.monitor.apply(&update),
                ChannelEvent::ConnectError(message) => {
                    // Every failed connect attempt raises the persistent
                    // banner, not just the final give-up.
                    self.monitor
                        .transport_failed(format!("Progress connection error: {message}"));
                }
                ChannelEvent::ReconnectFailed => {
                    self.monitor.transport_failed(
                        "Lost connection to the server; progress updates stopped. \
                         Re-upload to retry.",
                    );
                }
            }
        }

        if self.monitor.completion_due() {
            self.monitor.acknowledge_completion();
            self.channel = None;
            self.load_results();
        }

        self.notifications.update();
    }

    // --- backend tasks ------------------------------------------------------

    fn task_in_flight(&self) -> bool {
        self.task_rx.is_some()
    }

    /// Run one backend request on a named worker thread; the outcome comes
    /// back through [`tick`]. In test mode the request runs synchronously
    /// for determinism.
    ///
    /// [`tick`]: Self::tick
    fn spawn_task<F>(&mut self, name: &str, job: F)
    where
        F: FnOnce(&dyn Backend) -> TaskOutcome + Send + 'static,
    {
        if self.test_mode {
            let outcome = job(self.backend.as_ref());
            self.handle_outcome(outcome);
            return;
        }
        let backend = Arc::clone(&self.backend);
        let (tx, rx) = flume::bounded(1);
        self.task_rx = Some(rx);
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _ = tx.send(job(backend.as_ref()));
            })
            .expect("spawn backend task thread");
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Upload(result) => self.finish_upload(result),
            TaskOutcome::Results(Ok(results)) => {
                self.notifications.info(format!(
                    "Processing complete: {} pages",
                    results.total_pages_in_document
                ));
                self.run_search();
            }
            TaskOutcome::Results(Err(e)) => self.notifications.error(e.to_string()),
            TaskOutcome::Search(Ok(result)) => self.apply_filter_result(result),
            // Failed search keeps the previous results on screen.
            TaskOutcome::Search(Err(e)) => self.notifications.error(e.to_string()),
            TaskOutcome::Publish(result) => self.finish_publish(result),
        }
    }

    // --- upload -----------------------------------------------------------

    /// Kick off an upload. Everything from the previous document is cleared
    /// before any new data is attached.
    pub fn upload_document(&mut self, path: &Path) {
        if self.monitor.is_busy() || self.task_in_flight() {
            self.notifications
                .warn("A document is already being processed");
            return;
        }
        self.state.reset();
        self.editor = NoteEditor::default();
        self.selected_draft = 0;
        self.field_edit = None;
        self.channel = None;
        self.filter_type = FilterType::Both;
        self.pending_search = false;
        self.last_upload = Some(path.to_path_buf());
        self.monitor.begin_upload();
        self.notifications
            .info(format!("Uploading {}", path.display()));

        let path = path.to_path_buf();
        let page_range = self.page_range;
        self.spawn_task("upload", move |backend| {
            TaskOutcome::Upload(backend.upload_pdf(&path, page_range))
        });
    }

    fn finish_upload(&mut self, result: Result<UploadResponse, BackendError>) {
        match result {
            Ok(response) => {
                let Some(result_id) = response.result_id.filter(|id| !id.is_empty()) else {
                    self.monitor
                        .upload_failed("server accepted the upload but returned no result id");
                    return;
                };
                let filename = response.original_filename.unwrap_or_else(|| {
                    self.last_upload
                        .as_deref()
                        .and_then(Path::file_name)
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });
                info!("upload accepted: {} ({})", result_id, filename);
                self.state.session = Some(DocumentSession::new(&result_id, filename));
                if !self.test_mode {
                    self.channel = Some(ProgressChannel::connect(
                        self.backend.base_url(),
                        &result_id,
                    ));
                }
            }
            Err(e) => {
                self.monitor.upload_failed(e.to_string());
                self.notifications.error(e.to_string());
            }
        }
    }

    // --- results & search ---------------------------------------------------

    fn load_results(&mut self) {
        let Some(session) = self.state.session.clone() else {
            return;
        };
        self.spawn_task("fetch-results", move |backend| {
            TaskOutcome::Results(
                backend.get_results(&session.result_id, &session.original_filename),
            )
        });
    }

    /// Search and filter with the current word selection and filter mode.
    /// Requests issued while another one is in flight coalesce into a
    /// single re-run with the selection as it stands when the slot frees
    /// up. On failure the previous results stay on screen.
    pub fn run_search(&mut self) {
        let Some(session) = self.state.session.clone() else {
            self.notifications.warn("Upload a document first");
            return;
        };
        if self.task_in_flight() {
            self.pending_search = true;
            return;
        }
        if !self.state.caveat_shown {
            self.state.caveat_shown = true;
            self.notifications.info(WHOLE_WORD_CAVEAT);
        }
        let request = SearchRequest {
            result_path: session.result_artifact_path.clone(),
            search_words: self.state.words.request_words(),
            filter_type: self.filter_type,
        };
        self.spawn_task("search", move |backend| {
            TaskOutcome::Search(backend.search(&request))
        });
    }

    fn apply_filter_result(&mut self, result: FilterResult) {
        // Flush any open edits first: replacing the catalog moves the
        // cursor, and edits must never be lost to a page change.
        self.editor.save_into(&mut self.state.store);

        self.state.navigation = NavigationState::from_filter_result(&result);
        let first = result.listed_pages().first().map(|p| p.page_number);
        self.state.filter_result = Some(result);

        if let Some(page) = first {
            self.state.navigation.select(page);
            self.editor.open(page, &self.state.store);
        } else {
            self.editor = NoteEditor::default();
        }
        self.selected_draft = 0;
        self.field_edit = None;
    }

    fn cycle_filter(&mut self) {
        self.filter_type = self.filter_type.next();
        if self.state.has_document() {
            self.run_search();
        }
    }

    fn toggle_word(&mut self, index: usize) {
        if index >= self.state.words.canonical_words().len() {
            return;
        }
        self.state.words.toggle(index);
        if self.state.has_document() {
            self.run_search();
        }
    }

    // --- navigation ---------------------------------------------------------

    /// Save-before-navigate: flush the editor, move the cursor, reopen the
    /// editor on the destination page. A no-op target leaves everything
    /// untouched.
    fn navigate(&mut self, target: NavTarget) {
        if !self.state.navigation.can_apply(target) {
            return;
        }
        self.editor.save_into(&mut self.state.store);
        if let Some(page) = self.state.navigation.apply(target) {
            self.editor.open(page, &self.state.store);
            self.selected_draft = 0;
            self.field_edit = None;
        }
    }

    // --- notes ----------------------------------------------------------------

    fn save_notes(&mut self) -> Option<(u32, usize)> {
        self.editor.save_into(&mut self.state.store)
    }

    fn select_draft(&mut self, delta: isize) {
        let len = self.editor.drafts().len();
        if len == 0 {
            return;
        }
        let next = self.selected_draft as isize + delta;
        self.selected_draft = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_selected_draft(&mut self) {
        let len = self.editor.drafts().len();
        self.selected_draft = self.selected_draft.min(len.saturating_sub(1));
    }

    fn cycle_doctor_type(&mut self) {
        if let Some(set) = self.editor.draft_mut(self.selected_draft) {
            let next = match DOCTOR_TYPES.iter().position(|t| *t == set.doctor_type) {
                Some(idx) => DOCTOR_TYPES.get(idx + 1).copied().unwrap_or(""),
                None => DOCTOR_TYPES[0],
            };
            set.doctor_type = next.to_string();
        }
    }

    fn begin_field_edit(&mut self, field: NoteField) {
        let Some(set) = self.editor.draft_mut(self.selected_draft) else {
            self.notifications.warn("Add a note set first");
            return;
        };
        let value = match field {
            NoteField::CaseDate => &set.case_date,
            NoteField::CitationNotes => &set.citation_notes,
        };
        let textarea = TextArea::from(value.lines());
        self.field_edit = Some(FieldEdit { field, textarea });
    }

    fn handle_field_edit_key(&mut self, key: &KeyEvent) {
        let Some(edit) = &mut self.field_edit else {
            return;
        };
        let single_line = edit.field == NoteField::CaseDate;
        match key.code {
            KeyCode::Esc => self.commit_field_edit(),
            KeyCode::Enter if single_line => self.commit_field_edit(),
            _ => {
                edit.textarea.input(textarea_input(key));
            }
        }
    }

    fn commit_field_edit(&mut self) {
        let Some(edit) = self.field_edit.take() else {
            return;
        };
        let value = edit.textarea.lines().join("\n");
        if let Some(set) = self.editor.draft_mut(self.selected_draft) {
            match edit.field {
                NoteField::CaseDate => set.case_date = value.trim().to_string(),
                NoteField::CitationNotes => set.citation_notes = value,
            }
        }
        // Date validation is advisory and runs on every normalization pass.
        self.editor.normalize_dates();
    }

    // --- publish & download -----------------------------------------------------

    fn publish(&mut self) {
        self.editor.save_into(&mut self.state.store);
        let Some(session) = self.state.session.clone() else {
            self.notifications.warn("Upload a document first");
            return;
        };
        if !self.state.store.has_any_content() {
            self.notifications
                .warn("Nothing to export: add at least one note first");
            return;
        }
        if self.task_in_flight() {
            self.notifications.warn("Another request is in progress");
            return;
        }
        let request = PublishRequest {
            note_sets: self.state.store.export_snapshot(),
            filename: session.original_filename.clone(),
        };
        self.spawn_task("publish", move |backend| {
            TaskOutcome::Publish(backend.publish_notes(&request))
        });
    }

    fn finish_publish(&mut self, result: Result<Vec<u8>, BackendError>) {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                self.notifications.error(e.to_string());
                return;
            }
        };
        // Uploads are blocked while a task is in flight, so the session
        // here is the one the request was built from.
        let filename = self
            .state
            .session
            .as_ref()
            .map(|s| s.original_filename.clone())
            .unwrap_or_else(|| "document".to_string());
        match save_export(&bytes, &self.export_dir, &filename, chrono::Utc::now()) {
            Ok(path) => self
                .notifications
                .info(format!("Exported notes to {}", path.display())),
            Err(e) => self.notifications.error(format!("{e:#}")),
        }
    }

    fn download_json(&mut self) {
        match self.download_json_url() {
            Some(url) => {
                info!("raw results download url: {}", url);
                self.notifications.info(format!("Raw results: {url}"));
            }
            None => self.notifications.warn("Upload a document first"),
        }
    }
}

/// Main loop: repaint, poll input, tick. Generic over the terminal backend
/// so tests can drive the same loop with `ratatui::backend::TestBackend`.
pub fn run_app<B>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut App,
    events: &mut dyn EventSource,
) -> anyhow::Result<()>
where
    B: ratatui::backend::Backend,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let tick_rate = std::time::Duration::from_millis(100);
    loop {
        terminal.draw(|frame| crate::ui::render(frame, app))?;
        if events.poll(tick_rate)? {
            let event = events.read()?;
            app.handle_event(&event);
        }
        app.tick();
        if app.should_quit() {
            return Ok(());
        }
    }
}

/// Convert a key event into a textarea input without tying the two crates'
/// event types together.
fn textarea_input(key: &KeyEvent) -> tui_textarea::Input {
    use tui_textarea::Key;
    let tkey = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab => Key::Tab,
        _ => Key::Null,
    };
    tui_textarea::Input {
        key: tkey,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OcrResults, SearchInformation};
    use crate::search::WordGroups;
    use std::sync::Mutex;

    fn page(number: u32, annotated: bool, words: bool) -> Page {
        Page {
            page_number: number,
            has_annotations: annotated,
            removed_highlights_count: annotated.then_some(1),
            contains_search_words: words,
            matched_words: Vec::new(),
            text: Some(format!("page {number} text")),
            image_url: None,
            clean_image_url: None,
        }
    }

    /// Scripted backend: serves a fixed three-page document where page 2
    /// has highlights and page 3 matches a search word.
    struct FakeBackend {
        requests: Mutex<Vec<SearchRequest>>,
        published: Mutex<Vec<PublishRequest>>,
        fail_search: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
                fail_search: false,
            }
        }

        fn pages() -> Vec<Page> {
            vec![page(1, false, false), page(2, true, false), page(3, false, true)]
        }
    }

    impl Backend for FakeBackend {
        fn upload_pdf(
            &self,
            _path: &Path,
            _page_range: Option<(u32, u32)>,
        ) -> Result<UploadResponse, BackendError> {
            Ok(UploadResponse {
                success: true,
                result_id: Some("fake-id".to_string()),
                original_filename: Some("report.pdf".to_string()),
                total_pages: Some(3),
                error: None,
            })
        }

        fn get_results(&self, _: &str, _: &str) -> Result<OcrResults, BackendError> {
            Ok(OcrResults {
                document_name: Some("report.pdf".to_string()),
                total_pages_in_document: 3,
                pages_processed: Some(3),
                pages: Self::pages(),
            })
        }

        fn search(&self, request: &SearchRequest) -> Result<FilterResult, BackendError> {
            if self.fail_search {
                return Err(BackendError::Search("boom".to_string()));
            }
            self.requests.lock().unwrap().push(request.clone());
            let pages = Self::pages();
            let filtered: Vec<Page> = pages.iter().filter(|p| p.is_match()).cloned().collect();
            let total_matching_pages = filtered.len();
            Ok(FilterResult {
                total_pages_in_document: 3,
                pages,
                filtered_pages: filtered,
                search_information: SearchInformation {
                    filter_type: request.filter_type,
                    total_matching_pages,
                    search_words: request.search_words.clone(),
                },
            })
        }

        fn publish_notes(&self, request: &PublishRequest) -> Result<Vec<u8>, BackendError> {
            self.published.lock().unwrap().push(PublishRequest {
                note_sets: request.note_sets.clone(),
                filename: request.filename.clone(),
            });
            Ok(b"PK\x03\x04".to_vec())
        }

        fn word_groups(&self) -> Result<WordGroups, BackendError> {
            let mut groups = WordGroups::new();
            groups.insert(
                "pose".to_string(),
                vec!["pose".to_string(), "poses".to_string()],
            );
            Ok(groups)
        }

        fn base_url(&self) -> &str {
            "http://localhost:5000"
        }
    }

    /// Backend whose search stalls, standing in for a slow server.
    struct SlowSearchBackend {
        inner: FakeBackend,
        delay: std::time::Duration,
    }

    impl Backend for SlowSearchBackend {
        fn upload_pdf(
            &self,
            path: &Path,
            page_range: Option<(u32, u32)>,
        ) -> Result<UploadResponse, BackendError> {
            self.inner.upload_pdf(path, page_range)
        }

        fn get_results(&self, id: &str, name: &str) -> Result<OcrResults, BackendError> {
            self.inner.get_results(id, name)
        }

        fn search(&self, request: &SearchRequest) -> Result<FilterResult, BackendError> {
            thread::sleep(self.delay);
            self.inner.search(request)
        }

        fn publish_notes(&self, request: &PublishRequest) -> Result<Vec<u8>, BackendError> {
            self.inner.publish_notes(request)
        }

        fn word_groups(&self) -> Result<crate::search::WordGroups, BackendError> {
            self.inner.word_groups()
        }

        fn base_url(&self) -> &str {
            self.inner.base_url()
        }
    }

    fn completed_update() -> crate::model::ProgressUpdate {
        crate::model::ProgressUpdate {
            percentage: 100,
            current_page: 3,
            total_pages: 3,
            message: "Done".to_string(),
            status: "completed".to_string(),
            errors: Vec::new(),
        }
    }

    /// Upload and drive processing to completion so the first search has
    /// run and the monitor is idle again.
    fn loaded_app() -> (Arc<FakeBackend>, App, tempfile::TempDir) {
        let backend = Arc::new(FakeBackend::new());
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = App::for_tests(backend.clone(), dir.path().to_path_buf());
        app.upload_document(Path::new("/tmp/report.pdf"));

        let (tx, channel) = ProgressChannel::pair();
        app.attach_channel(channel);
        tx.send(ChannelEvent::Progress(completed_update())).unwrap();
        app.tick();
        app.tick();
        (backend, app, dir)
    }

    #[test]
    fn upload_creates_session_and_derives_artifact_path() {
        let (_, app, _dir) = loaded_app();
        let session = app.state.session.as_ref().unwrap();
        assert_eq!(session.result_id, "fake-id");
        assert_eq!(
            session.result_artifact_path,
            "results/fake-id_report_ocr_results.json"
        );
    }

    #[test]
    fn search_selects_first_listed_page_and_counts_matches() {
        let (backend, app, _dir) = loaded_app();
        // Filter "both" lists only matching pages; the first is page 2.
        assert_eq!(app.state.navigation.current(), Some(2));
        assert_eq!(app.matching_count(), 2);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(
            requests[0].result_path,
            "results/fake-id_report_ocr_results.json"
        );
    }

    #[test]
    fn caveat_shows_once_per_session() {
        let (_, mut app, _dir) = loaded_app();
        assert!(app.state.caveat_shown);
        let before = app.notifications.count();
        app.run_search();
        assert_eq!(app.notifications.count(), before, "no second caveat");
    }

    #[test]
    fn navigation_flushes_editor_before_moving() {
        let (_, mut app, _dir) = loaded_app();
        assert_eq!(app.state.navigation.current(), Some(2));

        app.dispatch(Intent::AddNoteSet);
        if let Some(set) = app.editor.draft_mut(app.selected_draft) {
            set.citation_notes = "written on page 2".to_string();
        }
        app.dispatch(Intent::Navigate(NavTarget::NextMatch));

        assert_eq!(app.state.navigation.current(), Some(3));
        assert_eq!(app.state.store.note_count(2), 1);
        assert_eq!(
            app.state.store.note_sets(2)[0].citation_notes,
            "written on page 2"
        );
        // Destination page starts with its own (empty) drafts.
        assert!(app.editor.drafts().is_empty());
    }

    #[test]
    fn publish_is_gated_on_content() {
        let (backend, mut app, _dir) = loaded_app();
        app.dispatch(Intent::Publish);
        assert!(backend.published.lock().unwrap().is_empty());

        app.dispatch(Intent::AddNoteSet);
        if let Some(set) = app.editor.draft_mut(app.selected_draft) {
            set.citation_notes = "cited".to_string();
        }
        app.dispatch(Intent::Publish);

        let published = backend.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].filename, "report.pdf");
        assert_eq!(published[0].note_sets[&2][0].citation_notes, "cited");
    }

    #[test]
    fn publish_writes_export_artifact() {
        let (_, mut app, dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        if let Some(set) = app.editor.draft_mut(app.selected_draft) {
            set.is_hospital = true;
        }
        app.dispatch(Intent::Publish);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("notes_report_"));
        assert!(name.ends_with(".docx"));
    }

    #[test]
    fn failed_search_keeps_previous_results() {
        let (_, mut app, _dir) = loaded_app();
        assert_eq!(app.state.navigation.current(), Some(2));
        let pages_before = app.state.navigation.all_pages().to_vec();

        app.backend = Arc::new(FakeBackend {
            requests: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            fail_search: true,
        });
        app.run_search();

        assert_eq!(app.state.navigation.all_pages(), pages_before.as_slice());
        assert_eq!(app.state.navigation.current(), Some(2));
    }

    #[test]
    fn new_upload_resets_previous_document_state() {
        let (_, mut app, _dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        if let Some(set) = app.editor.draft_mut(app.selected_draft) {
            set.citation_notes = "stale".to_string();
        }
        app.dispatch(Intent::SaveNotes);
        assert!(app.state.store.has_any_content());

        app.upload_document(Path::new("/tmp/other.pdf"));
        assert!(!app.state.store.has_any_content());
        assert!(app.state.filter_result.is_none());
        assert!(!app.state.caveat_shown);
        assert_eq!(app.filter_type, FilterType::Both);
    }

    #[test]
    fn removal_confirmation_persists_immediately() {
        let (_, mut app, _dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        if let Some(set) = app.editor.draft_mut(app.selected_draft) {
            set.citation_notes = "to remove".to_string();
        }
        app.dispatch(Intent::SaveNotes);
        assert_eq!(app.state.store.note_count(2), 1);

        app.dispatch(Intent::RequestRemoveNoteSet);
        assert!(app.editor.pending_removal().is_some());
        app.dispatch(Intent::ConfirmRemoval);

        assert_eq!(app.state.store.note_count(2), 0);
        assert!(app.editor.drafts().is_empty());
    }

    #[test]
    fn field_edit_normalizes_case_date_on_commit() {
        let (_, mut app, _dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        app.dispatch(Intent::EditCaseDate);
        assert!(app.field_edit.is_some());

        for c in "5/3/2024".chars() {
            app.handle_field_edit_key(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::empty()));
        }
        app.handle_field_edit_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::empty()));

        assert!(app.field_edit.is_none());
        assert_eq!(app.editor.drafts()[0].set.case_date, "05/03/2024");
        assert!(!app.editor.drafts()[0].date_invalid);
    }

    #[test]
    fn invalid_date_is_flagged_but_kept_as_typed() {
        let (_, mut app, _dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        app.dispatch(Intent::EditCaseDate);
        for c in "31/4/2024".chars() {
            app.handle_field_edit_key(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::empty()));
        }
        app.handle_field_edit_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::empty()));

        assert_eq!(app.editor.drafts()[0].set.case_date, "31/4/2024");
        assert!(app.editor.drafts()[0].date_invalid);
    }

    #[test]
    fn doctor_type_cycles_through_options() {
        let (_, mut app, _dir) = loaded_app();
        app.dispatch(Intent::AddNoteSet);
        app.dispatch(Intent::CycleDoctorType);
        assert_eq!(
            app.editor.drafts()[0].set.doctor_type,
            DOCTOR_TYPES[0]
        );
        app.dispatch(Intent::CycleDoctorType);
        assert_eq!(
            app.editor.drafts()[0].set.doctor_type,
            DOCTOR_TYPES[1]
        );
    }

    #[test]
    fn progress_events_drive_results_fetch() {
        let backend = Arc::new(FakeBackend::new());
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = App::for_tests(backend.clone(), dir.path().to_path_buf());
        app.upload_document(Path::new("/tmp/report.pdf"));

        let (tx, channel) = ProgressChannel::pair();
        app.attach_channel(channel);
        tx.send(ChannelEvent::Progress(completed_update())).unwrap();

        // Zero display delay in test mode: the same tick that sees the
        // completed event also fetches results.
        app.tick();

        assert!(app.state.filter_result.is_some());
        assert_eq!(app.state.navigation.current(), Some(2));
        assert!(!app.monitor.is_busy());
    }

    #[test]
    fn search_dispatch_does_not_block_the_event_loop() {
        use std::time::{Duration, Instant};

        let backend = Arc::new(SlowSearchBackend {
            inner: FakeBackend::new(),
            delay: Duration::from_millis(200),
        });
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = App::new(backend.clone(), dir.path().to_path_buf(), None);
        app.state.session = Some(DocumentSession::new("fake-id", "report.pdf".to_string()));

        let started = Instant::now();
        app.run_search();
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "dispatch waited on the request: {:?}",
            started.elapsed()
        );

        // A second request while the first is in flight coalesces into one
        // re-run once the slot frees up.
        app.run_search();

        let deadline = Instant::now() + Duration::from_secs(3);
        while backend.inner.requests.lock().unwrap().len() < 2 && Instant::now() < deadline {
            app.tick();
            thread::sleep(Duration::from_millis(10));
        }
        let deadline = Instant::now() + Duration::from_secs(3);
        while app.state.filter_result.is_none() && Instant::now() < deadline {
            app.tick();
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(backend.inner.requests.lock().unwrap().len(), 2);
        assert!(app.state.filter_result.is_some());
        assert_eq!(app.state.navigation.current(), Some(2));
    }

    #[test]
    fn connect_error_raises_persistent_banner() {
        let backend = Arc::new(FakeBackend::new());
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = App::for_tests(backend, dir.path().to_path_buf());
        app.upload_document(Path::new("/tmp/report.pdf"));

        let (tx, channel) = ProgressChannel::pair();
        app.attach_channel(channel);
        tx.send(ChannelEvent::ConnectError("connection refused".to_string()))
            .unwrap();
        app.tick();

        let banner = app.monitor.banner().expect("banner after connect error");
        assert!(banner.contains("connection refused"));
    }
}
