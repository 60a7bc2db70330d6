//! Back/forward history for the modal window.
//!
//! Opening the modal marks the current entry as the pre-modal one and pushes
//! a new entry. Stepping back onto a pre-modal entry hides the modal again;
//! stepping forward changes nothing.

use oceannav_core::AppState;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEntry {
    Plain,
    /// Entry that was current when the modal opened.
    PreModal,
    Modal,
}

#[derive(Debug, Clone)]
pub struct ModalHistory {
    entries: Vec<HistoryEntry>,
    pos: usize,
    modal_open: bool,
    limit: usize,
}

impl ModalHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: vec![HistoryEntry::Plain],
            pos: 0,
            modal_open: false,
            limit: limit.max(2),
        }
    }

    /// Record a state transition. Pushes an entry when the modal opens.
    pub fn observe(&mut self, state: &AppState) {
        let opened = state.ui.show_modal && !self.modal_open;
        self.modal_open = state.ui.show_modal;
        if opened {
            self.push();
        }
    }

    fn push(&mut self) {
        self.entries[self.pos] = HistoryEntry::PreModal;
        self.entries.truncate(self.pos + 1);
        self.entries.push(HistoryEntry::Modal);
        self.pos = self.entries.len() - 1;
        if self.entries.len() > self.limit {
            self.entries.remove(0);
            self.pos = self.entries.len() - 1;
        }
        debug!(entries = self.entries.len(), "Pushed modal history entry");
    }

    /// Step back. Returns the entry stepped onto, or `None` at the start.
    pub fn back(&mut self) -> Option<HistoryEntry> {
        if self.pos > 0 {
            self.pos -= 1;
            Some(self.entries[self.pos])
        } else {
            None
        }
    }

    pub fn forward(&mut self) -> Option<HistoryEntry> {
        if self.pos + 1 < self.entries.len() {
            self.pos += 1;
            Some(self.entries[self.pos])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
