use std::io::{self, IsTerminal};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};

use crate::error::BootstrapError;

/// Source of operator answers.
///
/// Every blocking question the tools ask goes through this trait so the flows
/// can run against scripted answers.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, BootstrapError>;

    /// Read a value without echoing it.
    fn secret(&self, question: &str) -> Result<String, BootstrapError>;

    /// Read a line of text; blank input yields `default`.
    fn input(&self, question: &str, default: &str) -> Result<String, BootstrapError>;
}

/// Interactive prompts on the controlling terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, BootstrapError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(map_dialoguer_err)
    }

    fn secret(&self, question: &str) -> Result<String, BootstrapError> {
        Password::with_theme(&self.theme)
            .with_prompt(question)
            .allow_empty_password(true)
            .interact()
            .map(|value| value.trim().to_string())
            .map_err(map_dialoguer_err)
    }

    fn input(&self, question: &str, default: &str) -> Result<String, BootstrapError> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(question)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map(|value| value.trim().to_string())
            .map_err(map_dialoguer_err)
    }
}

/// Answers every question with its default. Used for `--yes` and when stdin is
/// not a terminal.
pub struct DefaultsPrompter;

impl Prompter for DefaultsPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, BootstrapError> {
        tracing::debug!("Auto-answering '{}' with {}", question, default);
        Ok(default)
    }

    fn secret(&self, question: &str) -> Result<String, BootstrapError> {
        tracing::warn!("Non-interactive run, leaving '{}' empty", question);
        Ok(String::new())
    }

    fn input(&self, question: &str, default: &str) -> Result<String, BootstrapError> {
        tracing::debug!("Auto-answering '{}' with '{}'", question, default);
        Ok(default.to_string())
    }
}

pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Pick the prompter for this run: defaults when asked to, or when nobody is
/// there to answer.
pub fn select(assume_yes: bool) -> Box<dyn Prompter> {
    if assume_yes || !is_interactive() {
        Box::new(DefaultsPrompter)
    } else {
        Box::new(TerminalPrompter::new())
    }
}

fn map_dialoguer_err(err: dialoguer::Error) -> BootstrapError {
    match err {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => {
            BootstrapError::Cancelled
        }
        dialoguer::Error::IO(e) => BootstrapError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prompter_returns_defaults() {
        let prompter = DefaultsPrompter;
        assert!(!prompter.confirm("Recreate?", false).unwrap());
        assert!(prompter.confirm("Continue?", true).unwrap());
        assert_eq!(prompter.input("Mode", "1").unwrap(), "1");
        assert_eq!(prompter.secret("API key").unwrap(), "");
    }

    #[test]
    fn interrupted_prompt_maps_to_cancelled() {
        let err = map_dialoguer_err(dialoguer::Error::IO(io::Error::from(
            io::ErrorKind::Interrupted,
        )));
        assert!(matches!(err, BootstrapError::Cancelled));
    }
}
