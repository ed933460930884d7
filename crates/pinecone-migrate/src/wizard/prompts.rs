//! Interactive prompts for the migration wizard.

use dialoguer::{theme::ColorfulTheme, Input};

use crate::error::{Error, Result};

/// Validates a typed source index name.
///
/// # Errors
///
/// Returns [`Error::Prompt`] if the name is blank.
pub fn require_source_index(answer: &str) -> Result<String> {
    let name = answer.trim();
    if name.is_empty() {
        return Err(Error::Prompt("Source index name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Destination name from a typed answer; blank means "same as source".
#[must_use]
pub fn destination_or_source(answer: &str, source: &str) -> String {
    let name = answer.trim();
    if name.is_empty() {
        source.to_string()
    } else {
        name.to_string()
    }
}

/// Interactive prompts handler.
pub struct WizardPrompts {
    theme: ColorfulTheme,
}

impl Default for WizardPrompts {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardPrompts {
    /// Creates a new prompts handler.
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Prompts for the source index name.
    pub fn source_index(&self) -> Result<String> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt("Source index name")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Prompt(format!("Input cancelled: {e}")))?;
        require_source_index(&answer)
    }

    /// Prompts for the destination index name.
    pub fn destination_index(&self, source: &str) -> Result<String> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(format!("Destination index name (blank for '{source}')"))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Prompt(format!("Input cancelled: {e}")))?;
        Ok(destination_or_source(&answer, source))
    }
}
