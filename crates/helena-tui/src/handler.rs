use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.refresh();
            app.tick_animation();
        }
    }
    app.reap_finished_task().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing if app.raw_editor.is_some() => handle_raw_editing(app, key),
        InputMode::Editing => handle_prompt_editing(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    app.status = None;
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.snapshot.ready {
                app.focus = FocusPane::Input;
                app.input_mode = InputMode::Editing;
            } else {
                app.status = Some("Chat is disabled until an API key is configured".to_string());
            }
        }
        KeyCode::Char('e') => app.begin_raw_edit(),
        KeyCode::Char('d') if ctrl => app.scroll_focused(app.half_page()),
        KeyCode::Char('u') if ctrl => app.scroll_focused(-app.half_page()),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_focused(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_focused(-1),
        KeyCode::PageDown => app.scroll_focused(app.half_page() * 2),
        KeyCode::PageUp => app.scroll_focused(-app.half_page() * 2),
        KeyCode::Char('g') => app.scroll_focused(-i32::from(u16::MAX)),
        KeyCode::Char('G') => {
            if matches!(app.focus, FocusPane::Chat | FocusPane::Input) {
                app.scroll_chat_to_bottom();
            }
        }
        KeyCode::Char('o') => match app.export_preview() {
            Ok(path) => app.status = Some(open_status(&path, open::that(&path))),
            Err(e) => {
                log::error!("Failed to export preview: {}", e);
                app.status = Some(format!("Export failed: {}", e));
            }
        },
        KeyCode::Char('c') => {
            if app.snapshot.raw_content.is_empty() {
                app.status = Some("Nothing to copy yet".to_string());
            } else {
                copy_to_clipboard(&app.snapshot.raw_content);
                app.status = Some("Content copied".to_string());
            }
        }
        _ => {}
    }
}

fn handle_prompt_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_prompt(),
        KeyCode::Backspace => app.prompt.backspace(),
        KeyCode::Delete => app.prompt.delete(),
        KeyCode::Left => app.prompt.left(),
        KeyCode::Right => app.prompt.right(),
        KeyCode::Home => app.prompt.home(),
        KeyCode::End => app.prompt.end(),
        KeyCode::Up => app.scroll_focused(-1),
        KeyCode::Down => app.scroll_focused(1),
        KeyCode::Char(c) => app.prompt.insert(c),
        _ => {}
    }
}

fn handle_raw_editing(app: &mut App, key: KeyEvent) {
    let Some(editor) = app.raw_editor.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => app.commit_raw_edit(),
        KeyCode::Enter => editor.insert('\n'),
        KeyCode::Tab => editor.insert_str("    "),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete(),
        KeyCode::Left => editor.left(),
        KeyCode::Right => editor.right(),
        KeyCode::Home => editor.home(),
        KeyCode::End => editor.end(),
        KeyCode::Char(c) => editor.insert(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.input_mode != InputMode::Editing {
        return;
    }
    match app.raw_editor.as_mut() {
        Some(editor) => editor.insert_str(text),
        // The prompt is a single line
        None => app.prompt.insert_str(&text.replace(['\r', '\n'], " ")),
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let delta = match mouse.kind {
        MouseEventKind::ScrollDown => 3,
        MouseEventKind::ScrollUp => -3,
        _ => return,
    };

    let (x, y) = (mouse.column, mouse.row);
    let inside = |area: Option<Rect>| area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    // Position-based scrolling: the pane under the pointer scrolls
    let pane = if inside(app.chat_area) {
        FocusPane::Chat
    } else if inside(app.raw_area) {
        FocusPane::Raw
    } else if inside(app.preview_area) {
        FocusPane::Preview
    } else {
        return;
    };

    let focus = app.focus;
    app.focus = pane;
    app.scroll_focused(delta);
    app.focus = focus;
}

fn copy_to_clipboard(text: &str) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let commands: &[&[&str]] = if cfg!(target_os = "macos") {
        &[&["pbcopy"]]
    } else {
        &[&["wl-copy"], &["xclip", "-selection", "clipboard"]]
    };

    for command in commands {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        if let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
        {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
            let _ = child.wait();
            return;
        }
    }
    log::warn!("No clipboard command available");
}

/// Status line after exporting; a failed launch still leaves the file on disk.
fn open_status(path: &std::path::Path, launched: std::io::Result<()>) -> String {
    match launched {
        Ok(()) => format!("Preview opened from {}", path.display()),
        Err(e) => {
            log::warn!("Could not open {}: {}", path.display(), e);
            format!("Preview written to {} (could not open: {})", path.display(), e)
        }
    }
}
