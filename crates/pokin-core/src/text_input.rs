use unicode_width::UnicodeWidthStr;

/// A single-line text buffer with a byte-offset cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an input pre-filled with `value`, cursor at the end.
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.len();
        Self { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Display column of the cursor (for terminal cursor placement).
    pub fn cursor_column(&self) -> usize {
        self.value[..self.cursor].width()
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Replace the whole value, cursor at the end.
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.len();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        self.value.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let prev = self.prev_boundary();
            self.value.drain(prev..self.cursor);
            self.cursor = prev;
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = self.prev_boundary();
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.value.len() {
            self.cursor = self.value[self.cursor..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor + i)
                .unwrap_or(self.value.len());
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.len();
    }

    fn prev_boundary(&self) -> usize {
        self.value[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_backspace() {
        let mut input = TextInput::new();
        for c in "Pendidikan".chars() {
            input.insert_char(c);
        }
        assert_eq!(input.value(), "Pendidikan");
        assert_eq!(input.cursor(), 10);

        input.backspace();
        input.backspace();
        assert_eq!(input.value(), "Pendidik");
    }

    #[test]
    fn test_cursor_movement_multibyte() {
        let mut input = TextInput::with_value("a\u{e9}b");
        assert_eq!(input.cursor(), 4);

        input.move_left();
        assert_eq!(input.cursor(), 3);
        input.move_left();
        assert_eq!(input.cursor(), 1);
        input.insert_char('x');
        assert_eq!(input.value(), "ax\u{e9}b");

        input.move_right();
        assert_eq!(input.cursor(), 4);
        input.move_end();
        input.move_right();
        assert_eq!(input.cursor(), input.value().len());
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut input = TextInput::with_value("12");
        input.move_home();
        input.backspace();
        assert_eq!(input.value(), "12");
    }

    #[test]
    fn test_blank_and_set() {
        let mut input = TextInput::with_value("   ");
        assert!(input.is_blank());
        input.set("Persen");
        assert!(!input.is_blank());
        assert_eq!(input.cursor_column(), 6);
        input.clear();
        assert_eq!(input.value(), "");
    }
}
