use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use helena_core::{ChatRole, ContentKind, RenderableContent};
use crate::app::{App, FocusPane, InputMode, TextInput};
use crate::preview::html_to_text;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Chat on the left, raw content and preview stacked on the right
    let [chat_column, content_column] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(body_area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    let [raw_area, preview_area] = Layout::vertical([
        Constraint::Percentage(40),
        Constraint::Percentage(60),
    ])
    .areas(content_column);

    // Store areas for mouse hit-testing
    app.chat_area = Some(chat_area);
    app.raw_area = Some(raw_area);
    app.preview_area = Some(preview_area);
    app.pane_height = preview_area.height.saturating_sub(2);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_raw(app, frame, raw_area);
    render_preview(app, frame, preview_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let state = if !app.snapshot.ready {
        Span::styled(" offline ", Style::default().fg(Color::Red))
    } else if app.snapshot.generating {
        Span::styled(" generating ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("")
    };

    let title = Line::from(vec![
        Span::styled(" Helena - Digital Writer & 3D/4K Editor ", Style::default().fg(Color::Red).bold()),
        state,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn border_color(app: &App, pane: FocusPane) -> Color {
    if app.focus == pane {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app, FocusPane::Chat)))
        .title(format!(" Gemini: {} ", app.model_label));

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.snapshot.messages {
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", Color::Cyan),
            ChatRole::Assistant => ("Helena:", Color::Red),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for line in msg.content.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    if app.snapshot.generating {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Generating{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing_prompt = app.input_mode == InputMode::Editing && app.raw_editor.is_none();
    let border = if editing_prompt || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if !app.snapshot.ready {
        " Chat disabled: set GEMINI_API_KEY "
    } else if app.snapshot.generating {
        " Generating... "
    } else {
        " Ask Helena (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.prompt.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .prompt
        .text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing_prompt && inner_width > 0 {
        let cursor_x = u16::try_from(cursor_pos - scroll_offset).unwrap_or(u16::MAX);
        frame.set_cursor_position((
            area.x.saturating_add(1).saturating_add(cursor_x),
            area.y.saturating_add(1),
        ));
    }
}

fn render_raw(app: &App, frame: &mut Frame, area: Rect) {
    let (title, body) = match &app.raw_editor {
        Some(editor) => (" Content (editing, Esc to apply) ", editor_text(editor)),
        None => (" Content (raw) ", app.snapshot.raw_content.clone()),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.raw_editor.is_some() {
            Color::Yellow
        } else {
            border_color(app, FocusPane::Raw)
        }))
        .title(title);

    let paragraph = if body.is_empty() {
        Paragraph::new(Span::styled(
            "Waiting for a book, an image description or generated code...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Paragraph::new(body).style(Style::default().fg(Color::Yellow))
    };

    frame.render_widget(
        paragraph
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((app.raw_scroll, 0)),
        area,
    );
}

/// Editor text with a block cursor marker at the cursor position.
fn editor_text(editor: &TextInput) -> String {
    let mut text = editor.text.clone();
    let byte_pos = text
        .char_indices()
        .nth(editor.cursor)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.insert(byte_pos, '▏');
    text
}

fn render_preview(app: &App, frame: &mut Frame, area: Rect) {
    let kind = app.snapshot.content.as_ref().map(RenderableContent::kind);
    let title = match kind {
        Some(ContentKind::Image) => " Preview: image ",
        Some(ContentKind::Markup) => " Preview: HTML document ",
        Some(ContentKind::Text) => " Preview: book/text ",
        None => " Preview ",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app, FocusPane::Preview)))
        .title(title);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(content) = &app.snapshot.content {
        if let RenderableContent::Image { mime_type, .. } = content {
            let size = content
                .image_bytes()
                .map(|b| format!("{} KB", b.len().div_ceil(1024)))
                .unwrap_or_else(|| "undecodable payload".to_string());
            lines.push(Line::from(Span::styled(
                format!("[{} image, {}] press o to open", mime_type, size),
                Style::default().fg(Color::Magenta),
            )));
            lines.push(Line::default());
        }
    }
    for line in html_to_text(&app.snapshot.preview_document).lines() {
        lines.push(Line::from(line.to_string()));
    }

    let preview = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.preview_scroll, 0));
    frame.render_widget(preview, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.input_mode, app.raw_editor.is_some()) {
        (InputMode::Editing, true) => {
            hints.extend(hint("Esc", "apply"));
            hints.extend(hint("Enter", "newline"));
        }
        (InputMode::Editing, false) => {
            hints.extend(hint("Enter", "send"));
            hints.extend(hint("Esc", "stop typing"));
        }
        (InputMode::Normal, _) => {
            hints.extend(hint("Tab", "focus"));
            hints.extend(hint("j/k", "scroll"));
            match app.focus {
                FocusPane::Input => hints.extend(hint("i", "type")),
                FocusPane::Raw => {
                    hints.extend(hint("e", "edit"));
                    hints.extend(hint("c", "copy"));
                }
                FocusPane::Chat | FocusPane::Preview => {}
            }
            hints.extend(hint("o", "open preview"));
            hints.extend(hint("q", "quit"));
        }
    }

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    spans.extend(hints);
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {} ", status), Style::default().fg(Color::Yellow)));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use helena_core::Session;
    use ratatui::{backend::TestBackend, Terminal};

    fn editing_app(prompt: &str) -> App {
        let mut app = App::new(Session::new(None));
        app.input_mode = InputMode::Editing;
        app.prompt = TextInput::from_text(prompt);
        app
    }

    #[test]
    fn renders_in_a_terminal_too_narrow_for_the_prompt() {
        let mut app = editing_app(&"a".repeat(500));
        let mut terminal = Terminal::new(TestBackend::new(3, 12)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
    }

    #[test]
    fn renders_conversation_and_preview() {
        let mut app = editing_app("hello");
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Helena, Digital Writer"));
        assert!(screen.contains("hello"));
        assert!(app.preview_area.is_some());
    }
}
