//! Display surfaces the view draws on.

use std::io::Write;

/// Write target of a [`crate::TerminalView`].
///
/// Text may contain ANSI escape sequences and uses `\r\n` line breaks.
pub trait TerminalSurface {
    fn write(&mut self, text: &str);

    /// Erase everything shown so far.
    fn clear(&mut self);

    fn scroll_to_bottom(&mut self);

    /// Width of the display in columns.
    fn cols(&self) -> usize;
}

/// Surface that records what was drawn, for hosts without a display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySurface {
    cols: usize,
    contents: String,
    clears: usize,
    scrolls: usize,
}

impl MemorySurface {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            ..Self::default()
        }
    }

    /// Everything written since the last clear.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Return and forget the current contents.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.contents)
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }
}

impl TerminalSurface for MemorySurface {
    fn write(&mut self, text: &str) {
        self.contents.push_str(text);
    }

    fn clear(&mut self) {
        self.contents.clear();
        self.clears += 1;
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
    }

    fn cols(&self) -> usize {
        self.cols
    }
}

/// Surface backed by a byte stream understood by an ANSI terminal.
pub struct AnsiSurface<W: Write> {
    out: W,
    cols: usize,
}

impl<W: Write> AnsiSurface<W> {
    pub fn new(out: W, cols: usize) -> Self {
        Self { out, cols }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> TerminalSurface for AnsiSurface<W> {
    fn write(&mut self, text: &str) {
        self.emit(text.as_bytes());
    }

    fn clear(&mut self) {
        // Erase display, then home the cursor.
        self.emit(b"\x1b[2J\x1b[H");
    }

    fn scroll_to_bottom(&mut self) {
        // A stream terminal always shows its newest line; flushing makes it visible.
        if let Err(e) = self.out.flush() {
            tracing::warn!("Failed to flush terminal: {}", e);
        }
    }

    fn cols(&self) -> usize {
        self.cols
    }
}
