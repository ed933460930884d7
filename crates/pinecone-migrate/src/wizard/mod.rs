//! Interactive console front end.
//!
//! When the index names are not given on the command line the wizard asks
//! for them, then reports progress and the final summary.

mod prompts;
mod ui;

pub use prompts::{destination_or_source, require_source_index, WizardPrompts};
pub use ui::WizardUI;

use crate::error::Result;

/// Source and destination index names chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSelection {
    /// Index to copy from.
    pub source: String,
    /// Index to copy into.
    pub destination: String,
}

/// Interactive migration wizard.
pub struct Wizard {
    ui: WizardUI,
    prompts: WizardPrompts,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    /// Creates a new wizard instance.
    pub fn new() -> Self {
        Self {
            ui: WizardUI::new(),
            prompts: WizardPrompts::new(),
        }
    }

    /// Asks for the source index (required) and the destination index
    /// (defaults to the source name).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Prompt`] if input is cancelled or the source
    /// name is blank.
    pub fn select_indexes(&self) -> Result<IndexSelection> {
        self.ui.print_header();
        let source = self.prompts.source_index()?;
        let destination = self.prompts.destination_index(&source)?;
        Ok(IndexSelection {
            source,
            destination,
        })
    }
}
