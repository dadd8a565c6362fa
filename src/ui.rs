//! Declarative rendering. Everything here reads the [`App`] and draws; no
//! state transitions live in this module.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::inputs::Panel;
use crate::main_app::{App, NoteField, ViewMode};
use crate::model::Page;
use crate::notes::NoteDraft;
use crate::notification::NotificationLevel;
use crate::progress::MonitorState;

/// Unicode blocks for scripts written right-to-left (Hebrew, Arabic and
/// their extensions). Per-page detection only; rendering stays LTR with an
/// indicator in the title.
pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0590}'..='\u{05FF}'
                | '\u{0600}'..='\u{06FF}'
                | '\u{0750}'..='\u{077F}'
                | '\u{08A0}'..='\u{08FF}'
                | '\u{FB50}'..='\u{FDFF}'
                | '\u{FE70}'..='\u{FEFF}'
        )
    })
}

/// One row of the page catalog: number, match badges, note count.
pub fn page_list_entry(page: &Page, note_count: usize) -> String {
    let mut entry = format!("p.{}", page.page_number);
    if page.has_annotations {
        entry.push_str(" [H]");
    }
    if page.contains_search_words {
        entry.push_str(" [W]");
    }
    if note_count > 0 {
        entry.push_str(&format!(" ({note_count})"));
    }
    entry
}

pub fn render(frame: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_status(frame, outer[0], app);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(26),
            Constraint::Min(30),
            Constraint::Length(44),
        ])
        .split(outer[1]);

    render_pages(frame, main[0], app);
    render_content(frame, main[1], app);
    render_notes(frame, main[2], app);
    render_notification(frame, outer[2], app);
    render_help(frame, outer[3], app);
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("ocreview");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let MonitorState::Processing {
        percentage,
        current_page,
        total_pages,
        message,
    } = app.monitor.state()
    {
        let gauge = Gauge::default()
            .ratio(f64::from(*percentage).min(100.0) / 100.0)
            .label(format!("{message} ({current_page}/{total_pages})"))
            .gauge_style(Style::default().fg(Color::Green));
        frame.render_widget(gauge, inner);
        return;
    }

    let mut spans = vec![Span::styled(
        format!(" Filter: {} ", app.filter_type.label()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw(format!("| {} matching ", app.matching_count())));
    for (i, word) in app.state.words.canonical_words().iter().enumerate() {
        let style = if app.state.words.is_selected(i) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("[{}:{}] ", i + 1, word), style));
    }
    match app.monitor.state() {
        MonitorState::Uploading => spans.push(Span::styled(
            "| uploading...",
            Style::default().fg(Color::Green),
        )),
        MonitorState::Errored { message } => spans.push(Span::styled(
            format!("| failed: {message}"),
            Style::default().fg(Color::Red),
        )),
        _ => {}
    }
    if let Some(banner) = app.monitor.banner() {
        spans.push(Span::styled(
            format!("| {banner}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_pages(frame: &mut Frame, area: Rect, app: &App) {
    let title = match &app.state.filter_result {
        Some(result) => format!(
            "Pages {}/{}",
            result.listed_pages().len(),
            result.total_pages_in_document
        ),
        None => "Pages".to_string(),
    };
    let block = panel_block(title, app.focus == Panel::Pages);

    let Some(result) = &app.state.filter_result else {
        frame.render_widget(
            Paragraph::new("No document loaded.\nStart with a PDF path argument.").block(block),
            area,
        );
        return;
    };

    let items: Vec<ListItem> = result
        .listed_pages()
        .iter()
        .map(|page| {
            let entry = page_list_entry(page, app.state.store.note_count(page.page_number));
            ListItem::new(entry)
        })
        .collect();

    let mut list_state = ListState::default();
    if let Some(current) = app.state.navigation.current() {
        list_state.select(
            result
                .listed_pages()
                .iter()
                .position(|p| p.page_number == current),
        );
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_content(frame: &mut Frame, area: Rect, app: &App) {
    let Some(page) = app.current_page() else {
        let block = panel_block("Content".to_string(), app.focus == Panel::Content);
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let mut title = format!("Page {}", page.page_number);
    if let Some(removed) = page.removed_highlights_count {
        title.push_str(&format!(" | {removed} highlight(s) removed"));
    }
    if !page.matched_words.is_empty() {
        title.push_str(&format!(" | hits: {}", page.matched_words.join(", ")));
    }
    if contains_rtl(page.display_text()) {
        title.push_str(" | RTL");
    }
    let block = panel_block(title, app.focus == Panel::Content);

    let body = match app.view_mode {
        ViewMode::Text => page.display_text().to_string(),
        ViewMode::Image => {
            let mut lines = Vec::new();
            if let Some(url) = app.highlighted_image_url() {
                lines.push(format!("highlighted: {url}"));
            }
            if let Some(url) = &page.image_url {
                lines.push(format!("original:    {url}"));
            }
            if let Some(url) = &page.clean_image_url {
                lines.push(format!("clean:       {url}"));
            }
            if lines.is_empty() {
                "No page images available.".to_string()
            } else {
                lines.join("\n")
            }
        }
    };

    frame.render_widget(
        Paragraph::new(body).wrap(Wrap { trim: false }).block(block),
        area,
    );
}

fn draft_lines(draft: &NoteDraft, index: usize, selected: bool) -> Vec<Line<'static>> {
    let marker = if selected { "> " } else { "  " };
    let header_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let hospital = if draft.set.is_hospital { "[x]" } else { "[ ]" };
    let doctor = if draft.set.doctor_type.is_empty() {
        "-"
    } else {
        &draft.set.doctor_type
    };
    let date = if draft.set.case_date.is_empty() {
        "-".to_string()
    } else if draft.date_invalid {
        format!("{} (invalid)", draft.set.case_date)
    } else {
        draft.set.case_date.clone()
    };

    let mut lines = vec![
        Line::styled(format!("{marker}Note set {}", index + 1), header_style),
        Line::raw(format!("   {hospital} Hospital   Dr: {doctor}")),
        Line::styled(
            format!("   Date: {date}"),
            if draft.date_invalid {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            },
        ),
    ];
    let notes = draft.set.citation_notes.trim();
    if notes.is_empty() {
        lines.push(Line::styled(
            "   (no citation notes)".to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        for text in notes.lines().take(3) {
            lines.push(Line::raw(format!("   {text}")));
        }
    }
    lines.push(Line::raw(String::new()));
    lines
}

fn render_notes(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.editor.page_number() {
        Some(page) => format!("Notes - page {page}"),
        None => "Notes".to_string(),
    };
    let block = panel_block(title, app.focus == Panel::Notes);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(index) = app.editor.pending_removal() {
        let prompt = Paragraph::new(format!(
            "Remove note set {}?\n\ny: remove    n: keep",
            index + 1
        ))
        .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(prompt, inner);
        return;
    }

    if let Some(edit) = &app.field_edit {
        let label = match edit.field {
            NoteField::CaseDate => "Case date (DD/MM/YYYY), Enter to confirm",
            NoteField::CitationNotes => "Citation notes, Esc to confirm",
        };
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);
        frame.render_widget(
            Paragraph::new(label).style(Style::default().fg(Color::Yellow)),
            parts[0],
        );
        // tui-textarea's widget impl targets an older ratatui; draw the
        // buffer as a paragraph and place the cursor ourselves.
        let buffer: Vec<Line> = edit
            .textarea
            .lines()
            .iter()
            .map(|l| Line::raw(l.clone()))
            .collect();
        frame.render_widget(Paragraph::new(buffer), parts[1]);
        let (row, col) = edit.textarea.cursor();
        let x = parts[1].x + (col as u16).min(parts[1].width.saturating_sub(1));
        let y = parts[1].y + (row as u16).min(parts[1].height.saturating_sub(1));
        frame.set_cursor_position((x, y));
        return;
    }

    if app.editor.drafts().is_empty() {
        frame.render_widget(
            Paragraph::new("No note sets. Press 'a' to add one.")
                .style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let mut lines = Vec::new();
    for (i, draft) in app.editor.drafts().iter().enumerate() {
        lines.extend(draft_lines(draft, i, i == app.selected_draft));
    }
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        inner,
    );
}

fn render_notification(frame: &mut Frame, area: Rect, app: &App) {
    let Some(notification) = app.notifications.current() else {
        frame.render_widget(Paragraph::new(""), area);
        return;
    };
    let style = match notification.level {
        NotificationLevel::Info => Style::default().fg(Color::Green),
        NotificationLevel::Warning => Style::default().fg(Color::Yellow),
        NotificationLevel::Error => Style::default().fg(Color::Red),
    };
    let mut text = notification.message.clone();
    if app.notifications.count() > 1 {
        text.push_str(&format!(" (+{} more)", app.notifications.count() - 1));
    }
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_help(frame: &mut Frame, area: Rect, app: &App) {
    let help = if app.field_edit.is_some() {
        "editing: type to insert, Esc/Enter to confirm"
    } else if app.editor.pending_removal().is_some() {
        "y: remove  n: keep"
    } else {
        match app.focus {
            Panel::Notes => {
                "Tab: panel  j/k: set  a: add  d: remove  H: hospital  t: doctor  \
                 c: date  i: notes  w: save  e: export  q: quit"
            }
            _ => {
                "Tab: panel  h/l: page  [/]: match  f: filter  1-9: words  s: search  \
                 v: view  e: export  o: raw json  q: quit"
            }
        }
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32) -> Page {
        Page {
            page_number: number,
            has_annotations: false,
            removed_highlights_count: None,
            contains_search_words: false,
            matched_words: Vec::new(),
            text: None,
            image_url: None,
            clean_image_url: None,
        }
    }

    #[test]
    fn rtl_detection() {
        assert!(contains_rtl("חוות דעת רפואית"));
        assert!(contains_rtl("تقرير طبي"));
        assert!(!contains_rtl("medical report, p. 3"));
        assert!(contains_rtl("mixed שורה line"));
    }

    #[test]
    fn page_entry_badges() {
        let mut p = page(7);
        assert_eq!(page_list_entry(&p, 0), "p.7");

        p.has_annotations = true;
        p.contains_search_words = true;
        assert_eq!(page_list_entry(&p, 2), "p.7 [H] [W] (2)");
    }
}
