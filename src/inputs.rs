use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::navigation::NavTarget;

/// Abstracts the terminal event queue so the app loop can be driven by
/// scripted events in tests.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool>;
    fn read(&mut self) -> Result<Event>;
}

pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Scripted event source for tests; reports exhaustion instead of
/// inventing events.
pub struct SimulatedEventSource {
    events: Vec<Event>,
    cursor: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, cursor: 0 }
    }

    pub fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        })
    }

    pub fn char_key(c: char) -> Event {
        Self::key(KeyCode::Char(c), KeyModifiers::empty())
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.cursor < self.events.len())
    }

    fn read(&mut self) -> Result<Event> {
        if self.cursor < self.events.len() {
            let event = self.events[self.cursor].clone();
            self.cursor += 1;
            Ok(event)
        } else {
            Ok(Self::char_key('q'))
        }
    }
}

/// What the user asked for, decoupled from how it was asked. The
/// controller consumes intents; render code never mutates state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Quit,
    Navigate(NavTarget),
    CycleFilter,
    ToggleWord(usize),
    RunSearch,
    ToggleViewMode,
    FocusNextPanel,
    SelectNextDraft,
    SelectPrevDraft,
    AddNoteSet,
    RequestRemoveNoteSet,
    ConfirmRemoval,
    CancelRemoval,
    ToggleHospital,
    CycleDoctorType,
    EditCaseDate,
    EditCitationNotes,
    SaveNotes,
    Publish,
    DownloadJson,
    Dismiss,
}

/// Which pane has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Pages,
    Content,
    Notes,
}

impl Panel {
    pub fn next(self) -> Self {
        match self {
            Panel::Pages => Panel::Content,
            Panel::Content => Panel::Notes,
            Panel::Notes => Panel::Pages,
        }
    }
}

/// Map a key press to an intent. Field editing (textarea capture) and the
/// removal confirmation prompt are modal and take precedence over the
/// normal bindings.
pub fn map_key(key: &KeyEvent, focus: Panel, confirming: bool) -> Option<Intent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    if confirming {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(Intent::ConfirmRemoval),
            KeyCode::Char('n') | KeyCode::Esc => Some(Intent::CancelRemoval),
            _ => None,
        };
    }

    // Global bindings.
    match key.code {
        KeyCode::Char('q') => return Some(Intent::Quit),
        KeyCode::Tab => return Some(Intent::FocusNextPanel),
        KeyCode::Esc => return Some(Intent::Dismiss),
        KeyCode::Char('h') | KeyCode::Left => return Some(Intent::Navigate(NavTarget::Prev)),
        KeyCode::Char('l') | KeyCode::Right => return Some(Intent::Navigate(NavTarget::Next)),
        KeyCode::Char(']') => return Some(Intent::Navigate(NavTarget::NextMatch)),
        KeyCode::Char('[') => return Some(Intent::Navigate(NavTarget::PrevMatch)),
        KeyCode::Char('f') => return Some(Intent::CycleFilter),
        KeyCode::Char('s') => return Some(Intent::RunSearch),
        KeyCode::Char('v') => return Some(Intent::ToggleViewMode),
        KeyCode::Char('e') => return Some(Intent::Publish),
        KeyCode::Char('o') => return Some(Intent::DownloadJson),
        KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
            return Some(Intent::ToggleWord(c as usize - '1' as usize));
        }
        _ => {}
    }

    // Notes panel bindings.
    if focus == Panel::Notes {
        return match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(Intent::SelectNextDraft),
            KeyCode::Char('k') | KeyCode::Up => Some(Intent::SelectPrevDraft),
            KeyCode::Char('a') => Some(Intent::AddNoteSet),
            KeyCode::Char('d') => Some(Intent::RequestRemoveNoteSet),
            KeyCode::Char('H') => Some(Intent::ToggleHospital),
            KeyCode::Char('t') => Some(Intent::CycleDoctorType),
            KeyCode::Char('c') => Some(Intent::EditCaseDate),
            KeyCode::Char('i') | KeyCode::Enter => Some(Intent::EditCitationNotes),
            KeyCode::Char('w') => Some(Intent::SaveNotes),
            _ => None,
        };
    }

    None
}
