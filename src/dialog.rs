//! Delete confirmation dialog visibility
//!
//! The dialog fades in and out; it counts as visible (and swallows keys)
//! for the whole transition.

use std::time::{Duration, Instant};

/// Delay before the dialog is fully shown
pub const ENTRANCE: Duration = Duration::from_millis(10);
/// Exit transition length
pub const EXIT: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Hidden,
    Opening(Instant),
    Shown,
    Closing(Instant),
}

/// What a tick changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogEvent {
    Shown,
    /// Exit finished; any pending delete must be forgotten
    Hidden,
}

#[derive(Debug, Clone)]
pub struct DeleteDialog {
    state: DialogState,
}

impl Default for DeleteDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteDialog {
    pub fn new() -> Self {
        Self { state: DialogState::Hidden }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state != DialogState::Hidden
    }

    /// Fully shown, not mid-transition
    pub fn is_shown(&self) -> bool {
        self.state == DialogState::Shown
    }

    pub fn open(&mut self, now: Instant) {
        if matches!(self.state, DialogState::Hidden | DialogState::Closing(_)) {
            self.state = DialogState::Opening(now);
        }
    }

    pub fn close(&mut self, now: Instant) {
        if matches!(self.state, DialogState::Opening(_) | DialogState::Shown) {
            self.state = DialogState::Closing(now);
        }
    }

    /// Advance transitions that have run their course
    pub fn tick(&mut self, now: Instant) -> Option<DialogEvent> {
        match self.state {
            DialogState::Opening(since) if now.duration_since(since) >= ENTRANCE => {
                self.state = DialogState::Shown;
                Some(DialogEvent::Shown)
            }
            DialogState::Closing(since) if now.duration_since(since) >= EXIT => {
                self.state = DialogState::Hidden;
                Some(DialogEvent::Hidden)
            }
            _ => None,
        }
    }
}
