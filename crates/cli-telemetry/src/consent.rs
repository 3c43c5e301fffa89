//! First-run consent resolution
//!
//! Telemetry is opt-in: a brand new config is only enabled after the user
//! answers a prompt on a real terminal. CI runners and piped invocations are
//! never prompted.

use inquire::Text;
use std::env;
use std::io::IsTerminal;

/// Environment variables that mark a continuous-integration run
const CI_INDICATORS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "BUILD_NUMBER",
    "RUN_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
];

/// Source of a consent decision
pub trait ConsentPrompt {
    /// Whether a human can be asked at all
    fn is_interactive(&self) -> bool;

    /// Ask a yes/no question and block until it is answered
    fn prompt_yes_no(&self, message: &str) -> bool;
}

/// Consent collected on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsent;

impl ConsentPrompt for TerminalConsent {
    fn is_interactive(&self) -> bool {
        is_interactive()
    }

    fn prompt_yes_no(&self, message: &str) -> bool {
        prompt_yes_no(message)
    }
}

/// True when stdin and stdout are both terminals and no CI indicator is set
pub fn is_interactive() -> bool {
    if is_ci() {
        return false;
    }

    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Check if running in CI environment
pub fn is_ci() -> bool {
    CI_INDICATORS.iter().any(|name| env::var_os(name).is_some())
}

/// Prompt on the terminal and read one line of answer
///
/// The terminal is held only for the duration of the prompt. An interrupted
/// or failed prompt counts as "no".
pub fn prompt_yes_no(message: &str) -> bool {
    match Text::new(message).prompt() {
        Ok(answer) => answer_is_yes(&answer),
        Err(err) => {
            tracing::debug!(error = %err, "consent prompt aborted");
            false
        }
    }
}

/// Any answer starting with `y` or `Y` is a yes
pub fn answer_is_yes(answer: &str) -> bool {
    answer
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'y'))
}
