//! Runs commands on a [Session] and classifies what came back.
//!
//! Everything above this module sees a [CommandResult] rather than raw text or a transport
//! error, so no caller can forget that a device might answer with an error message instead of
//! data.

use crate::error::{HostError, TransportError};
use crate::transport::Session;
use tracing::debug;

/// Substrings that Cisco IOS prints when it refuses a command.
pub const DEFAULT_ERROR_MARKERS: &[&str] = &["Invalid input detected at "];

/// The outcome of running one command on one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// The device answered with usable output.
    Success(String),

    /// The device answered with nothing but white space.
    Empty,

    /// The device rejected the command. Holds the error marker that was found.
    CommandError { marker: String },

    /// The session failed before the device could answer.
    TransportError(TransportError),
}

impl CommandResult {
    /// Returns whether this is a [CommandResult::Success].
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }

    /// Converts the result into the command's output, treating every other variant as fatal
    /// for the host.
    pub fn into_text(self, command: &str) -> Result<String, HostError> {
        match self {
            CommandResult::Success(text) => Ok(text),
            CommandResult::Empty => Err(HostError::EmptyOutput {
                command: command.to_owned(),
            }),
            CommandResult::CommandError { marker } => Err(HostError::Command {
                command: command.to_owned(),
                marker,
            }),
            CommandResult::TransportError(source) => Err(HostError::Transport {
                command: command.to_owned(),
                source,
            }),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CommandResult::Success(_) => "success",
            CommandResult::Empty => "empty",
            CommandResult::CommandError { .. } => "command error",
            CommandResult::TransportError(_) => "transport error",
        }
    }
}

/// Wraps [Session] calls and turns their outcomes into [CommandResult]s.
#[derive(Clone, Debug)]
pub struct Executor {
    markers: Vec<String>,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new(DEFAULT_ERROR_MARKERS.iter().map(|&m| m.to_owned()))
    }
}

impl Executor {
    /// Creates an [Executor] that recognizes the given device error markers.
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Executor {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    /// Runs `command` on `session`.
    pub async fn execute<S: Session>(&self, session: &mut S, command: &str) -> CommandResult {
        debug!(command, "running command");
        let result = self.classify(session.run(command).await);
        debug!(command, outcome = result.label(), "command finished");
        result
    }

    /// Sends a batch of configuration lines to `session`.
    pub async fn configure<S: Session>(&self, session: &mut S, lines: &[String]) -> CommandResult {
        debug!(lines = lines.len(), "sending configuration");
        self.classify(session.configure(lines).await)
    }

    fn classify(&self, response: Result<String, TransportError>) -> CommandResult {
        let text = match response {
            Ok(text) => text,
            Err(error) => return CommandResult::TransportError(error),
        };

        if let Some(marker) = self.markers.iter().find(|m| text.contains(m.as_str())) {
            return CommandResult::CommandError {
                marker: marker.trim_end().to_owned(),
            };
        }

        if text.trim().is_empty() {
            CommandResult::Empty
        } else {
            CommandResult::Success(text)
        }
    }
}
