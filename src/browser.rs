//! Browser state machine.
//!
//! [`BrowserState`] owns everything the archive view needs between key
//! presses: the mode, the filter text, the visible rows, the selection and
//! the status left by the last extraction. It knows nothing about the
//! terminal. Keys come in as [`Key`] values and anything with a side effect
//! goes back to the caller as an [`Effect`]; the caller runs the extraction
//! and reports the outcome through [`BrowserState::complete_extraction`].

use crate::catalog::{ArchiveEntry, ArchiveListing};
use crate::filter::filter_indices;
use crate::zip::ExtractError;

/// Rows moved by PageUp/PageDown until the view reports its height.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Input mode determines how keys are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Table has focus
    Normal,
    /// Filter input has focus; printable keys edit the filter text
    Filtering,
    /// Yes/No dialog for extracting a whole folder
    ConfirmingFolderExtraction,
}

/// Keys the browser reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Left,
    Right,
    Tab,
    BackTab,
    /// Ctrl+C
    Interrupt,
}

/// Focused button of the folder confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Yes,
    No,
}

impl ConfirmChoice {
    fn toggled(self) -> Self {
        match self {
            ConfirmChoice::Yes => ConfirmChoice::No,
            ConfirmChoice::No => ConfirmChoice::Yes,
        }
    }
}

/// What the caller has to do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Quit,
    Extract(ExtractRequest),
}

/// An extraction asked for by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Entry name as stored in the archive
    pub target: String,
    pub is_folder: bool,
    /// Visible row that triggered the request
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

/// Outcome of the last extraction, attached to the row that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionStatus {
    pub row: usize,
    pub message: String,
    pub kind: StatusKind,
}

pub struct BrowserState {
    archive_name: String,
    listing: ArchiveListing,
    mode: Mode,
    filter_text: String,
    /// Indices into `listing`, in listing order
    visible: Vec<usize>,
    /// Index into `visible`
    selected: Option<usize>,
    extraction_status: Option<ExtractionStatus>,
    pending_folder: Option<ExtractRequest>,
    confirm_choice: ConfirmChoice,
    page_size: usize,
}

impl BrowserState {
    pub fn new(archive_name: impl Into<String>, listing: ArchiveListing) -> Self {
        let visible: Vec<usize> = (0..listing.len()).collect();
        let selected = if visible.is_empty() { None } else { Some(0) };

        Self {
            archive_name: archive_name.into(),
            listing,
            mode: Mode::Normal,
            filter_text: String::new(),
            visible,
            selected,
            extraction_status: None,
            pending_folder: None,
            confirm_choice: ConfirmChoice::Yes,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn listing(&self) -> &ArchiveListing {
        &self.listing
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Rows currently shown, in listing order.
    pub fn visible_rows(&self) -> impl Iterator<Item = &ArchiveEntry> + '_ {
        self.visible.iter().filter_map(|&i| self.listing.get(i))
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_entry(&self) -> Option<&ArchiveEntry> {
        self.selected
            .and_then(|row| self.visible.get(row))
            .and_then(|&i| self.listing.get(i))
    }

    pub fn extraction_status(&self) -> Option<&ExtractionStatus> {
        self.extraction_status.as_ref()
    }

    /// Folder waiting for confirmation, while the dialog is open.
    pub fn pending_folder(&self) -> Option<&ExtractRequest> {
        self.pending_folder.as_ref()
    }

    pub fn confirm_choice(&self) -> ConfirmChoice {
        self.confirm_choice
    }

    /// Title of the table: the extraction status if any, else the archive
    /// name.
    pub fn title(&self) -> &str {
        match &self.extraction_status {
            Some(status) => &status.message,
            None => &self.archive_name,
        }
    }

    /// Rows per page, from the height of the table viewport.
    pub fn set_page_size(&mut self, rows: usize) {
        self.page_size = rows.max(1);
    }

    pub fn handle_key(&mut self, key: Key) -> Effect {
        if key == Key::Interrupt {
            return Effect::Quit;
        }

        match self.mode {
            Mode::Normal => self.handle_normal(key),
            Mode::Filtering => {
                self.handle_filtering(key);
                Effect::None
            }
            Mode::ConfirmingFolderExtraction => self.handle_confirm(key),
        }
    }

    /// Record the outcome of an extraction requested through
    /// [`Effect::Extract`].
    pub fn complete_extraction(
        &mut self,
        request: &ExtractRequest,
        result: Result<usize, ExtractError>,
    ) {
        let (message, kind) = match result {
            Ok(count) if request.is_folder => (
                format!("Extracted folder: {} files", count),
                StatusKind::Success,
            ),
            Ok(_) => (format!("Extracted: {}", request.target), StatusKind::Success),
            Err(err) if err.extracted() > 0 => (
                format!("Error: {} ({} files extracted)", err, err.extracted()),
                StatusKind::Error,
            ),
            Err(err) => (format!("Error: {}", err), StatusKind::Error),
        };

        self.extraction_status = Some(ExtractionStatus {
            row: request.row,
            message,
            kind,
        });
    }

    fn handle_normal(&mut self, key: Key) -> Effect {
        match key {
            Key::Char('q' | 'Q') => return Effect::Quit,
            Key::Char('f' | 'F') => {
                self.mode = Mode::Filtering;
                self.filter_text.clear();
                self.refilter();
            }
            Key::Enter => return self.request_extraction(),
            Key::Up | Key::Char('k') => self.move_selection(-1),
            Key::Down | Key::Char('j') => self.move_selection(1),
            Key::PageUp => self.move_selection(-(self.page_size as isize)),
            Key::PageDown => self.move_selection(self.page_size as isize),
            Key::Home | Key::Char('g') => self.select_first(),
            Key::End | Key::Char('G') => {
                let last = self.visible.len().checked_sub(1);
                self.select(last);
            }
            _ => {}
        }
        Effect::None
    }

    fn handle_filtering(&mut self, key: Key) {
        match key {
            Key::Enter => self.mode = Mode::Normal,
            Key::Esc => {
                self.filter_text.clear();
                self.refilter();
                self.mode = Mode::Normal;
            }
            Key::Backspace => {
                if self.filter_text.pop().is_some() {
                    self.refilter();
                }
            }
            // Quit keys included: the input owns the keyboard
            Key::Char(c) => {
                self.filter_text.push(c);
                self.refilter();
            }
            _ => {}
        }
    }

    fn handle_confirm(&mut self, key: Key) -> Effect {
        match key {
            Key::Char('q' | 'Q') => Effect::Quit,
            Key::Left | Key::Right | Key::Tab | Key::BackTab => {
                self.confirm_choice = self.confirm_choice.toggled();
                Effect::None
            }
            Key::Enter => self.close_confirm(self.confirm_choice),
            Key::Char('y' | 'Y') => self.close_confirm(ConfirmChoice::Yes),
            Key::Char('n' | 'N') | Key::Esc => self.close_confirm(ConfirmChoice::No),
            _ => Effect::None,
        }
    }

    fn request_extraction(&mut self) -> Effect {
        let (Some(row), Some(entry)) = (self.selected, self.selected_entry()) else {
            return Effect::None;
        };

        let request = ExtractRequest {
            target: entry.name().to_string(),
            is_folder: entry.is_directory(),
            row,
        };

        if request.is_folder {
            self.pending_folder = Some(request);
            self.confirm_choice = ConfirmChoice::Yes;
            self.mode = Mode::ConfirmingFolderExtraction;
            Effect::None
        } else {
            Effect::Extract(request)
        }
    }

    fn close_confirm(&mut self, choice: ConfirmChoice) -> Effect {
        self.mode = Mode::Normal;
        match (choice, self.pending_folder.take()) {
            (ConfirmChoice::Yes, Some(request)) => Effect::Extract(request),
            _ => Effect::None,
        }
    }

    /// Recompute the visible rows for the current filter text and move the
    /// selection to the first row.
    fn refilter(&mut self) {
        self.visible = filter_indices(self.listing.entries(), &self.filter_text);
        self.select_first();
    }

    fn select_first(&mut self) {
        let first = if self.visible.is_empty() { None } else { Some(0) };
        self.select(first);
    }

    fn move_selection(&mut self, delta: isize) {
        let Some(current) = self.selected else {
            return;
        };
        let last = self.visible.len().saturating_sub(1);
        let target = current.saturating_add_signed(delta).min(last);
        self.select(Some(target));
    }

    /// Change the selection; a status attached to another row goes stale.
    fn select(&mut self, row: Option<usize>) {
        self.selected = row;

        if let Some(status) = &self.extraction_status {
            if Some(status.row) != row {
                self.extraction_status = None;
            }
        }
    }
}
