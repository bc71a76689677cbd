use std::path::PathBuf;
use anyhow::{Result, anyhow};
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use helena_core::{Session, SessionSnapshot, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Raw,
    Preview,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Chat,
            FocusPane::Chat => FocusPane::Raw,
            FocusPane::Raw => FocusPane::Preview,
            FocusPane::Preview => FocusPane::Input,
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-buffer text editor with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert_str(byte_pos, s);
        self.cursor += s.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Session and the copy of it we draw from
    pub session: Session,
    pub snapshot: SessionSnapshot,
    pub model_label: String,
    pub query_task: Option<JoinHandle<Submission>>,

    // Prompt input
    pub prompt: TextInput,

    // Raw-content editor, present while the raw pane is being edited
    pub raw_editor: Option<TextInput>,

    // Scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub raw_scroll: u16,
    pub preview_scroll: u16,
    pub pane_height: u16,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status: Option<String>,

    // Areas for mouse hit-testing
    pub chat_area: Option<Rect>,
    pub raw_area: Option<Rect>,
    pub preview_area: Option<Rect>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let snapshot = session.snapshot();
        let model_label = session
            .model_name()
            .unwrap_or_else(|| "not configured".to_string());

        Self {
            should_quit: false,
            input_mode: if snapshot.ready { InputMode::Editing } else { InputMode::Normal },
            focus: FocusPane::Input,

            session,
            snapshot,
            model_label,
            query_task: None,

            prompt: TextInput::default(),
            raw_editor: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            raw_scroll: 0,
            preview_scroll: 0,
            pane_height: 0,

            animation_frame: 0,
            status: None,

            chat_area: None,
            raw_area: None,
            preview_area: None,
        }
    }

    /// Pull a fresh snapshot; follow the conversation when it grows.
    pub fn refresh(&mut self) {
        let previous_len = self.snapshot.messages.len();
        let previous_raw_len = self.snapshot.raw_content.len();
        self.snapshot = self.session.snapshot();

        if self.snapshot.messages.len() != previous_len {
            self.scroll_chat_to_bottom();
        }
        if self.snapshot.raw_content.len() != previous_raw_len {
            self.raw_scroll = 0;
            self.preview_scroll = 0;
        }
    }

    pub fn can_submit(&self) -> bool {
        self.snapshot.ready && !self.snapshot.generating && self.query_task.is_none()
    }

    /// Hand the prompt to the session on a background task so the event
    /// loop keeps running while the backend works.
    pub fn submit_prompt(&mut self) {
        if self.prompt.text.trim().is_empty() {
            return;
        }
        if !self.can_submit() {
            self.status = Some("Helena is still working on the previous request".to_string());
            return;
        }

        let prompt = self.prompt.take();
        let session = self.session.clone();
        self.query_task = Some(tokio::spawn(async move { session.submit(&prompt).await }));
        self.status = None;
    }

    /// Collect the background task once it is done.
    pub async fn reap_finished_task(&mut self) {
        let finished = self
            .query_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.query_task.take() {
            match task.await {
                Ok(submission) => log::debug!("Submission finished: {:?}", submission),
                Err(e) => log::error!("Submission task failed: {}", e),
            }
        }
        self.refresh();
    }

    pub fn begin_raw_edit(&mut self) {
        self.raw_editor = Some(TextInput::from_text(&self.snapshot.raw_content));
        self.focus = FocusPane::Raw;
        self.input_mode = InputMode::Editing;
    }

    /// Push the edited raw text back into the session; the preview follows.
    pub fn commit_raw_edit(&mut self) {
        if let Some(editor) = self.raw_editor.take() {
            if editor.text != self.snapshot.raw_content {
                self.session.edit_raw_content(editor.text);
                self.refresh();
            }
        }
        self.input_mode = InputMode::Normal;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.snapshot.generating {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_focused(&mut self, delta: i32) {
        let target = match self.focus {
            FocusPane::Chat | FocusPane::Input => &mut self.chat_scroll,
            FocusPane::Raw => &mut self.raw_scroll,
            FocusPane::Preview => &mut self.preview_scroll,
        };
        *target = apply_delta(*target, delta);
    }

    pub fn half_page(&self) -> i32 {
        i32::from((self.pane_height / 2).max(1))
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in &self.snapshot.messages {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count / wrap_width + 1 };
                total_lines = total_lines.saturating_add(u16::try_from(wrapped).unwrap_or(u16::MAX));
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }
        if self.snapshot.generating {
            total_lines = total_lines.saturating_add(1);
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Write the preview document (and the image, if any) to the data
    /// directory and return the document path.
    pub fn export_preview(&self) -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("helena");
        export_preview_to(&self.snapshot, &dir)
    }
}

fn apply_delta(value: u16, delta: i32) -> u16 {
    if delta >= 0 {
        value.saturating_add(delta as u16)
    } else {
        value.saturating_sub(delta.unsigned_abs() as u16)
    }
}

pub fn export_preview_to(snapshot: &SessionSnapshot, dir: &std::path::Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let document_path = dir.join("preview.html");
    std::fs::write(&document_path, &snapshot.preview_document)?;

    if let Some(content) = &snapshot.content {
        if let (Some(bytes), Some(ext)) = (content.image_bytes(), content.image_extension()) {
            let image_path = dir.join(format!("preview.{}", ext));
            std::fs::write(&image_path, bytes)?;
            log::info!("Exported image to {}", image_path.display());
        }
    }

    log::info!("Exported preview to {}", document_path.display());
    Ok(document_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helena_core::{ChatMessage, RenderableContent};
    use tempfile::tempdir;

    #[test]
    fn text_input_handles_multibyte_chars() {
        let mut input = TextInput::default();
        for c in "olá".chars() {
            input.insert(c);
        }
        input.left();
        input.backspace();
        assert_eq!(input.text, "oá");
        assert_eq!(input.cursor, 1);

        input.end();
        input.insert_str(" 🚀");
        assert_eq!(input.text, "oá 🚀");
        assert_eq!(input.cursor, 4);

        input.home();
        input.delete();
        assert_eq!(input.text, "á 🚀");
        assert_eq!(input.take(), "á 🚀");
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn focus_cycles_through_all_panes() {
        let mut focus = FocusPane::Input;
        let mut seen = Vec::new();
        for _ in 0..4 {
            focus = focus.next();
            seen.push(focus);
        }
        assert_eq!(
            seen,
            vec![FocusPane::Chat, FocusPane::Raw, FocusPane::Preview, FocusPane::Input]
        );
    }

    #[test]
    fn scroll_never_underflows() {
        assert_eq!(apply_delta(2, -5), 0);
        assert_eq!(apply_delta(2, 3), 5);
    }

    #[test]
    fn unconfigured_app_starts_in_normal_mode() {
        let app = App::new(Session::new(None));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(!app.can_submit());
        assert_eq!(app.model_label, "not configured");
    }

    #[test]
    fn huge_message_saturates_chat_scroll() {
        let mut app = App::new(Session::new(None));
        app.chat_width = 1;
        app.chat_height = 10;
        app.snapshot.messages.push(ChatMessage::assistant("x".repeat(70_000)));

        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, u16::MAX - 10);
    }

    #[test]
    fn export_writes_document_and_image() {
        let dir = tempdir().unwrap();
        let content = RenderableContent::Image {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        let snapshot = SessionSnapshot {
            messages: vec![ChatMessage::user("draw")],
            preview_document: content.preview_document(),
            content: Some(content),
            raw_content: "a picture".to_string(),
            generating: false,
            ready: true,
        };

        let path = export_preview_to(&snapshot, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), snapshot.preview_document);
        assert_eq!(std::fs::read(dir.path().join("preview.png")).unwrap(), b"hello");
    }
}
