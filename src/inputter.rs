use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

pub const FILTER_PLACEHOLDER: &str = "Filter";

#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
    /// Whether the key changed the text.
    pub changed: bool,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        let before = self.current_input.clone();
        let mut result = match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.enter(),
            (KeyCode::Esc, KeyModifiers::NONE) => self.escape(),
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Delete, KeyModifiers::NONE) => self.delete(),
            (KeyCode::Left, KeyModifiers::NONE) => self.left(),
            (KeyCode::Right, KeyModifiers::NONE) => self.right(),
            (KeyCode::Home, KeyModifiers::NONE) => self.home(),
            (KeyCode::End, KeyModifiers::NONE) => self.end(),
            (kc, km) => self.key(kc, km),
        };
        result.changed = before != self.current_input;
        result
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
            changed: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    // Leaves the input but keeps the text, the filter stays applied.
    fn escape(&mut self) -> InputResult {
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.contains(KeyModifiers::CONTROL) || modifier.contains(KeyModifiers::ALT) {
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            self.current_input.insert(self.getbytepos(), chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

/// Filter text field with a placeholder.
///
/// While unfocused and empty it shows [`FILTER_PLACEHOLDER`] in the hint style.
/// Focusing drops the hint, blurring an empty field brings it back. The
/// placeholder never counts as filter text.
pub struct FilterInput {
    input: Inputter,
    focused: bool,
    placeholder: bool,
}

impl Default for FilterInput {
    fn default() -> Self {
        let mut input = Inputter::default();
        input.set(FILTER_PLACEHOLDER);
        Self {
            input,
            focused: false,
            placeholder: true,
        }
    }
}

impl FilterInput {
    pub fn focus(&mut self) {
        self.focused = true;
        if self.placeholder {
            self.placeholder = false;
            self.input.clear();
        }
        trace!("Filter focused");
    }

    pub fn blur(&mut self) {
        self.focused = false;
        if self.input.value().is_empty() {
            self.placeholder = true;
            self.input.set(FILTER_PLACEHOLDER);
        }
        trace!("Filter blurred, placeholder: {}", self.placeholder);
    }

    /// Feeds a key into the focused field. Returns the input state after the key.
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        if !self.focused {
            return self.input.get();
        }
        let result = self.input.read(key);
        if result.finished {
            self.input.finished = false;
            self.input.canceled = false;
            self.blur();
        }
        result
    }

    pub fn filter_text(&self) -> &str {
        if self.placeholder {
            ""
        } else {
            self.input.value()
        }
    }

    pub fn display_text(&self) -> &str {
        self.input.value()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn shows_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn curser_pos(&self) -> usize {
        self.input.curser_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut FilterInput, s: &str) {
        for c in s.chars() {
            input.read(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn placeholder_is_not_filter_text() {
        let input = FilterInput::default();
        assert!(input.shows_placeholder());
        assert_eq!(input.display_text(), FILTER_PLACEHOLDER);
        assert_eq!(input.filter_text(), "");
    }

    #[test]
    fn focus_clears_and_blur_restores_placeholder() {
        let mut input = FilterInput::default();
        input.focus();
        assert_eq!(input.display_text(), "");
        input.blur();
        assert!(input.shows_placeholder());
        assert_eq!(input.display_text(), FILTER_PLACEHOLDER);
    }

    #[test]
    fn typed_text_survives_blur() {
        let mut input = FilterInput::default();
        input.focus();
        type_str(&mut input, "File");
        let result = input.read(key(KeyCode::Enter));
        assert!(result.finished);
        assert!(!input.is_focused());
        assert_eq!(input.filter_text(), "File");

        input.focus();
        assert_eq!(input.display_text(), "File");
    }

    #[test]
    fn keys_are_ignored_while_unfocused() {
        let mut input = FilterInput::default();
        let result = input.read(key(KeyCode::Char('x')));
        assert!(!result.changed);
        assert_eq!(input.filter_text(), "");
    }

    #[test]
    fn editing_in_the_middle() {
        let mut input = Inputter::default();
        for c in "Fles".chars() {
            input.read(key(KeyCode::Char(c)));
        }
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        let result = input.read(key(KeyCode::Char('i')));
        assert!(result.changed);
        assert_eq!(input.value(), "Files");

        input.read(key(KeyCode::End));
        input.read(key(KeyCode::Backspace));
        assert_eq!(input.value(), "File");
        input.read(key(KeyCode::Home));
        input.read(key(KeyCode::Delete));
        assert_eq!(input.value(), "ile");
    }
}
