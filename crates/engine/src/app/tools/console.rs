use std::collections::VecDeque;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::app::rendering::{draw_text_clipped, fill_rect, line_advance};

const TEXT_SCALE: i32 = 2;
const CONSOLE_PADDING: i32 = 4 * TEXT_SCALE;
const CONSOLE_BG_COLOR: [u8; 4] = [16, 16, 18, 235];
const CONSOLE_TEXT_COLOR: [u8; 4] = [210, 230, 210, 255];
const CONSOLE_ERROR_COLOR: [u8; 4] = [255, 140, 140, 255];
const CONSOLE_PROMPT_PREFIX: &str = "> ";
const MAX_VISIBLE_ROWS: usize = 14;

pub(crate) const MAX_HISTORY_LINES: usize = 64;
pub(crate) const MAX_OUTPUT_LINES: usize = 256;
pub(crate) const MAX_PENDING_LINES: usize = 64;
pub(crate) const MAX_CURRENT_LINE_CHARS: usize = 256;

/// Line editor for the dev console. Submitted lines queue up until the loop
/// drains them and hands each one to the scene.
#[derive(Debug, Default)]
pub(crate) struct ConsoleState {
    is_open: bool,
    current_line: String,
    history: VecDeque<String>,
    history_cursor: Option<usize>,
    history_draft: Option<String>,
    output_lines: VecDeque<String>,
    pending_lines: VecDeque<String>,
}

impl ConsoleState {
    pub(crate) fn is_open(&self) -> bool {
        self.is_open
    }

    pub(crate) fn toggle_open(&mut self) {
        self.is_open = !self.is_open;
        self.clear_input_line_state();
    }

    pub(crate) fn handle_key_event(&mut self, key_event: &KeyEvent) {
        if !self.is_open || key_event.state != ElementState::Pressed {
            return;
        }
        let PhysicalKey::Code(code) = key_event.physical_key else {
            return;
        };
        self.handle_key_code(code);
        if let Some(text) = key_event.text.as_ref() {
            self.append_printable_text(text);
        }
    }

    pub(crate) fn append_output_line(&mut self, line: impl Into<String>) {
        push_bounded(&mut self.output_lines, line.into(), MAX_OUTPUT_LINES);
    }

    pub(crate) fn clear_output_lines(&mut self) {
        self.output_lines.clear();
    }

    pub(crate) fn output_lines(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.output_lines.iter().map(String::as_str)
    }

    pub(crate) fn current_line(&self) -> &str {
        &self.current_line
    }

    pub(crate) fn drain_pending_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.pending_lines.drain(..));
    }

    fn handle_key_code(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Backspace => {
                self.current_line.pop();
            }
            KeyCode::Enter | KeyCode::NumpadEnter => self.submit_current_line(),
            KeyCode::Escape => {
                self.is_open = false;
                self.clear_input_line_state();
            }
            KeyCode::ArrowUp => self.navigate_history_up(),
            KeyCode::ArrowDown => self.navigate_history_down(),
            _ => {}
        }
    }

    fn append_printable_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            if self.current_line.chars().count() >= MAX_CURRENT_LINE_CHARS {
                break;
            }
            self.current_line.push(ch);
        }
    }

    fn clear_input_line_state(&mut self) {
        self.current_line.clear();
        self.history_cursor = None;
        self.history_draft = None;
    }

    fn submit_current_line(&mut self) {
        let raw_line = std::mem::take(&mut self.current_line);
        if raw_line.trim().is_empty() {
            self.clear_input_line_state();
            return;
        }
        push_bounded(&mut self.history, raw_line.clone(), MAX_HISTORY_LINES);
        self.append_output_line(format!("{CONSOLE_PROMPT_PREFIX}{raw_line}"));
        push_bounded(&mut self.pending_lines, raw_line, MAX_PENDING_LINES);
        self.clear_input_line_state();
    }

    fn navigate_history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        if self.history_cursor.is_none() {
            self.history_draft = Some(self.current_line.clone());
        }
        let next_index = match self.history_cursor {
            Some(index) => index.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.history_cursor = Some(next_index);
        self.current_line = self.history[next_index].clone();
    }

    fn navigate_history_down(&mut self) {
        let Some(index) = self.history_cursor else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_cursor = Some(index + 1);
            self.current_line = self.history[index + 1].clone();
            return;
        }
        self.history_cursor = None;
        self.current_line = self.history_draft.take().unwrap_or_default();
    }
}

fn push_bounded(queue: &mut VecDeque<String>, value: String, max_len: usize) {
    if queue.len() == max_len {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Bottom-docked panel: newest output directly above the prompt.
pub(crate) fn draw_console(frame: &mut [u8], width: u32, height: u32, state: &ConsoleState) {
    if !state.is_open() || width == 0 || height == 0 {
        return;
    }

    let row_height = line_advance(TEXT_SCALE);
    let output_rows = state.output_lines.len().min(MAX_VISIBLE_ROWS);
    let panel_height = (output_rows as i32 + 1) * row_height + 2 * CONSOLE_PADDING;
    let top = (height as i32 - panel_height).max(0);
    fill_rect(
        frame,
        width,
        height,
        0,
        top,
        width as i32,
        panel_height,
        CONSOLE_BG_COLOR,
    );

    let prompt = format!("{CONSOLE_PROMPT_PREFIX}{}_", state.current_line());
    let prompt_y = height as i32 - CONSOLE_PADDING - row_height;
    draw_text_clipped(
        frame,
        width,
        height,
        CONSOLE_PADDING,
        prompt_y,
        &prompt,
        TEXT_SCALE,
        CONSOLE_TEXT_COLOR,
    );

    let mut line_y = prompt_y - row_height;
    for line in state.output_lines().rev().take(output_rows) {
        let color = if line.starts_with("error:") {
            CONSOLE_ERROR_COLOR
        } else {
            CONSOLE_TEXT_COLOR
        };
        draw_text_clipped(
            frame,
            width,
            height,
            CONSOLE_PADDING,
            line_y,
            line,
            TEXT_SCALE,
            color,
        );
        line_y -= row_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_console() -> ConsoleState {
        let mut console = ConsoleState::default();
        console.toggle_open();
        console
    }

    fn submit(console: &mut ConsoleState, line: &str) {
        console.append_printable_text(line);
        console.handle_key_code(KeyCode::Enter);
    }

    #[test]
    fn escape_closes_and_clears_input_line() {
        let mut console = open_console();
        console.append_printable_text("new Ada");
        console.handle_key_code(KeyCode::Escape);

        assert!(!console.is_open());
        assert_eq!(console.current_line(), "");
    }

    #[test]
    fn text_input_ignores_control_characters() {
        let mut console = open_console();
        console.append_printable_text("a\n\tb");
        assert_eq!(console.current_line(), "ab");
    }

    #[test]
    fn enter_echoes_and_queues_raw_line() {
        let mut console = open_console();
        submit(&mut console, "say \"hello there\"");

        assert_eq!(console.current_line(), "");
        assert_eq!(
            console.output_lines().last(),
            Some("> say \"hello there\"")
        );
        let mut drained = Vec::new();
        console.drain_pending_lines_into(&mut drained);
        assert_eq!(drained, vec!["say \"hello there\"".to_string()]);
        assert!(console.pending_lines.is_empty());
    }

    #[test]
    fn blank_lines_are_not_queued() {
        let mut console = open_console();
        submit(&mut console, "   ");
        assert!(console.pending_lines.is_empty());
        assert!(console.history.is_empty());
    }

    #[test]
    fn history_cycles_and_restores_draft() {
        let mut console = open_console();
        submit(&mut console, "agents");
        submit(&mut console, "deselect");

        console.append_printable_text("dra");
        console.handle_key_code(KeyCode::ArrowUp);
        assert_eq!(console.current_line(), "deselect");
        console.handle_key_code(KeyCode::ArrowUp);
        assert_eq!(console.current_line(), "agents");
        console.handle_key_code(KeyCode::ArrowDown);
        console.handle_key_code(KeyCode::ArrowDown);
        assert_eq!(console.current_line(), "dra");
    }

    #[test]
    fn bounded_buffers_drop_oldest_entries() {
        let mut console = open_console();
        for idx in 0..(MAX_HISTORY_LINES + 2) {
            submit(&mut console, &format!("h{idx}"));
        }
        assert_eq!(console.history.len(), MAX_HISTORY_LINES);
        assert_eq!(console.history.front().map(String::as_str), Some("h2"));
        assert_eq!(console.pending_lines.len(), MAX_PENDING_LINES);

        let over_limit = "x".repeat(MAX_CURRENT_LINE_CHARS + 20);
        console.append_printable_text(&over_limit);
        assert_eq!(console.current_line().chars().count(), MAX_CURRENT_LINE_CHARS);
    }

    #[test]
    fn clear_output_keeps_history() {
        let mut console = open_console();
        submit(&mut console, "help");
        console.append_output_line("help - list commands");
        console.clear_output_lines();
        assert_eq!(console.output_lines().count(), 0);
        assert_eq!(console.history.len(), 1);
    }

    #[test]
    fn draw_console_is_safe_on_tiny_viewports() {
        let mut frame = vec![0u8; 4];
        let mut console = open_console();
        console.append_output_line("error: nope");
        draw_console(&mut frame, 1, 1, &console);
        assert_eq!(frame.len(), 4);
    }
}
