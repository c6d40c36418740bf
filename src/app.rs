//! Terminal event loop.
//!
//! One task owns the [`BrowserState`]. Each iteration draws, waits for the
//! next terminal event and applies it. An extraction is awaited in place, so
//! no further key is handled until its status is recorded.

use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use ratatui::widgets::TableState;
use tracing::{debug, info, warn};

use crate::browser::{BrowserState, Effect, ExtractRequest, Key};
use crate::ui;
use crate::zip;

pub struct App {
    state: BrowserState,
    table_state: TableState,
    archive_path: PathBuf,
    dest_dir: PathBuf,
}

impl App {
    pub fn new(state: BrowserState, archive_path: PathBuf, dest_dir: PathBuf) -> Self {
        Self {
            state,
            table_state: TableState::default(),
            archive_path,
            dest_dir,
        }
    }

    pub async fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let mut events = EventStream::new();

        loop {
            terminal.draw(|frame| ui::render(frame, &mut self.state, &mut self.table_state))?;

            let Some(event) = events.next().await else {
                break;
            };

            // Resize and focus events only need the redraw above
            let Event::Key(key) = event? else {
                continue;
            };
            let Some(key) = translate_key(key) else {
                continue;
            };

            match self.state.handle_key(key) {
                Effect::None => {}
                Effect::Quit => {
                    debug!("quit requested");
                    break;
                }
                Effect::Extract(request) => self.extract(&request).await,
            }
        }

        Ok(())
    }

    async fn extract(&mut self, request: &ExtractRequest) {
        info!(
            archive = %self.archive_path.display(),
            name = %request.target,
            folder = request.is_folder,
            "extracting"
        );

        let result = zip::extract(&self.archive_path, &request.target, &self.dest_dir).await;
        if let Err(err) = &result {
            warn!(name = %request.target, extracted = err.extracted(), "extraction failed: {}", err);
        }

        self.state.complete_extraction(request, result);
    }
}

/// Map a terminal key press to a browser key. Releases, repeats and
/// modified keys other than Ctrl+C are dropped.
pub fn translate_key(event: KeyEvent) -> Option<Key> {
    if event.kind != KeyEventKind::Press {
        return None;
    }

    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c' | 'C') => Some(Key::Interrupt),
            _ => None,
        };
    }
    if event.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }

    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        _ => return None,
    };
    Some(key)
}
