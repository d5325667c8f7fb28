//! Keystroke decoding, command history and the pending input line.

/// A keystroke the view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    ArrowUp,
    ArrowDown,
}

impl Key {
    /// Decode raw terminal input into keys.
    ///
    /// `\r\n` counts as a single Enter. Escape sequences other than the up
    /// and down arrows, and control characters, are dropped.
    pub fn parse_input(input: &str) -> Vec<Key> {
        let mut keys = Vec::new();
        let mut chars = input.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\x1b' => {
                    if chars.next_if_eq(&'[').is_none() && chars.next_if_eq(&'O').is_none() {
                        continue;
                    }
                    // Parameters, then a single final byte.
                    while chars.next_if(|c| c.is_ascii_digit() || *c == ';').is_some() {}
                    match chars.next() {
                        Some('A') => keys.push(Key::ArrowUp),
                        Some('B') => keys.push(Key::ArrowDown),
                        _ => {}
                    }
                }
                '\r' => {
                    chars.next_if_eq(&'\n');
                    keys.push(Key::Enter);
                }
                '\n' => keys.push(Key::Enter),
                '\x7f' | '\x08' => keys.push(Key::Backspace),
                c if c.is_control() => {}
                c => keys.push(Key::Char(c)),
            }
        }
        keys
    }
}

/// Previously submitted commands, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHistory {
    entries: Vec<String>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Into<String>) {
        self.entries.push(command.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `steps_back` positions before the newest one; `0` is the newest.
    pub fn recall(&self, steps_back: usize) -> Option<&str> {
        let index = self.entries.len().checked_sub(steps_back + 1)?;
        self.entries.get(index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// The line being typed and the history cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEditState {
    line: String,
    /// Whether each character of `line` was drawn.
    echoed: Vec<bool>,
    /// Steps back from the newest history entry; `None` when not navigating.
    history_index: Option<usize>,
}

impl LineEditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn history_index(&self) -> Option<usize> {
        self.history_index
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Number of characters in the line.
    pub fn len(&self) -> usize {
        self.echoed.len()
    }

    pub fn push(&mut self, c: char, echoed: bool) {
        self.line.push(c);
        self.echoed.push(echoed);
    }

    /// Remove the last character. Returns whether it had been drawn, or
    /// `None` when the line was already empty.
    pub fn pop(&mut self) -> Option<bool> {
        self.line.pop()?;
        self.echoed.pop()
    }

    /// Replace the line with a recalled command, fully drawn.
    pub fn replace(&mut self, text: &str) {
        self.line = text.to_string();
        self.echoed = vec![true; text.chars().count()];
    }

    /// Take the line and reset the state, history cursor included.
    pub fn take(&mut self) -> String {
        self.echoed.clear();
        self.history_index = None;
        std::mem::take(&mut self.line)
    }

    /// Move one entry towards the oldest. Returns the recalled command.
    pub fn history_up<'h>(&mut self, history: &'h CommandHistory) -> Option<&'h str> {
        let next = self.history_index.map_or(0, |index| index + 1);
        let command = history.recall(next)?;
        self.history_index = Some(next);
        self.replace(command);
        Some(command)
    }

    /// Move one entry towards the newest. Past the newest entry the cursor
    /// stops navigating and the line is emptied; `None` is returned then.
    pub fn history_down<'h>(&mut self, history: &'h CommandHistory) -> Option<&'h str> {
        let recalled = match self.history_index {
            Some(index) if index > 0 => history.recall(index - 1).map(|command| (index - 1, command)),
            _ => None,
        };
        match recalled {
            Some((index, command)) => {
                self.history_index = Some(index);
                self.replace(command);
                Some(command)
            }
            None => {
                self.history_index = None;
                self.line.clear();
                self.echoed.clear();
                None
            }
        }
    }
}
