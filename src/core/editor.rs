//! Editor capability seam.
//!
//! The engine never talks to a UI toolkit. Integrations implement
//! [`EditorAdapter`] once, at bootstrap, and hand it to the orchestrator.
//! Only content access is required; cursor and viewport support are optional
//! and their absence just makes backups smaller and rollbacks partial.

use serde::{Deserialize, Serialize};

use crate::core::error::EditorError;

/// Cosmetic editor state restored on rollback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: u32,
    pub scroll_left: u32,
    pub focused: bool,
}

/// What the engine needs from an editor
pub trait EditorAdapter {
    /// Current full text
    fn content(&self) -> Result<String, EditorError>;

    /// Replace the full text
    fn replace_content(&mut self, text: &str) -> Result<(), EditorError>;

    /// Cursor byte offset, if the editor exposes one
    fn cursor(&self) -> Option<usize> {
        None
    }

    fn set_cursor(&mut self, _offset: usize) -> Result<(), EditorError> {
        Ok(())
    }

    /// Scroll/focus state, if the editor exposes it
    fn viewport(&self) -> Option<Viewport> {
        None
    }

    fn restore_viewport(&mut self, _viewport: Viewport) -> Result<(), EditorError> {
        Ok(())
    }
}

/// In-memory editor buffer; backs the CLI and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferEditor {
    text: String,
    cursor: Option<usize>,
    viewport: Viewport,
}

impl BufferEditor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), cursor: None, viewport: Viewport::default() }
    }

    pub fn with_cursor(mut self, offset: usize) -> Self {
        self.cursor = Some(offset);
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Insert `snippet` at `offset`, moving the cursor past it
    pub fn insert(&mut self, offset: usize, snippet: &str) -> Result<(), EditorError> {
        if offset > self.text.len() || !self.text.is_char_boundary(offset) {
            return Err(EditorError::WriteRejected(format!(
                "offset {offset} is not a character boundary"
            )));
        }
        self.text.insert_str(offset, snippet);
        self.cursor = Some(offset + snippet.len());
        Ok(())
    }
}

impl EditorAdapter for BufferEditor {
    fn content(&self) -> Result<String, EditorError> {
        Ok(self.text.clone())
    }

    fn replace_content(&mut self, text: &str) -> Result<(), EditorError> {
        self.text = text.to_string();
        // Keep the cursor inside the new buffer
        if let Some(c) = self.cursor {
            self.cursor = Some(clamp_to_boundary(&self.text, c));
        }
        Ok(())
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn set_cursor(&mut self, offset: usize) -> Result<(), EditorError> {
        self.cursor = Some(clamp_to_boundary(&self.text, offset));
        Ok(())
    }

    fn viewport(&self) -> Option<Viewport> {
        Some(self.viewport)
    }

    fn restore_viewport(&mut self, viewport: Viewport) -> Result<(), EditorError> {
        self.viewport = viewport;
        Ok(())
    }
}

fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut at = offset.min(text.len());
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}
