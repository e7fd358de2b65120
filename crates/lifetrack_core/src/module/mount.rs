//! Mount point abstraction for rendered module content.

use std::sync::{Mutex, PoisonError};

/// Error state shown in place of a module that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    pub module: String,
    pub message: String,
    /// Whether the host should offer a retry control.
    pub retry_available: bool,
}

/// DOM-like target the registry mounts module content into.
pub trait MountPoint: Send + Sync {
    fn mount(&self, module: &str, content: String);
    fn show_error(&self, panel: ErrorPanel);
    fn clear(&self);
}

/// What a [`MemoryMount`] currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MountView {
    #[default]
    Empty,
    Content {
        module: String,
        content: String,
    },
    Error(ErrorPanel),
}

/// In-memory mount point for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryMount {
    view: Mutex<MountView>,
}

impl MemoryMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> MountView {
        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, view: MountView) {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }
}

impl MountPoint for MemoryMount {
    fn mount(&self, module: &str, content: String) {
        self.set(MountView::Content {
            module: module.to_string(),
            content,
        });
    }

    fn show_error(&self, panel: ErrorPanel) {
        self.set(MountView::Error(panel));
    }

    fn clear(&self) {
        self.set(MountView::Empty);
    }
}
