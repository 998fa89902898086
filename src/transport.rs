//! Provides an interface for talking to managed devices.
//!
//! The audit pipeline never touches SSH directly. It opens sessions through [ManageSession] and
//! exchanges text through [Session], so tests can substitute scripted fakes and other transports
//! can be plugged in without touching [crate::fleet].

use crate::error::{ConnectError, TransportError};
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

#[cfg(feature = "openssh")]
pub mod openssh;
#[cfg(feature = "russh")]
pub mod russh;
pub mod shell;

#[cfg(test)]
pub mod fixtures;

/// Login credentials shared by every host in a run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            user: user.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connects to devices and returns values representing those connections.
#[async_trait]
pub trait ManageSession<S: Session> {
    /// Connect to `address` and, on success, return a session with the device.
    async fn connect(
        &mut self,
        address: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<S, ConnectError>;
}

/// A live command-execution channel to one device.
///
/// Each call is a single command/response exchange bounded by the transport's own timeouts.
#[async_trait]
pub trait Session: Send + Sized {
    /// Runs one command and returns its raw output.
    async fn run(&mut self, command: &str) -> Result<String, TransportError>;

    /// Sends `lines` to the device's configuration mode as one batch and returns the device's
    /// raw response.
    async fn configure(&mut self, lines: &[String]) -> Result<String, TransportError>;

    /// Ends the session.
    async fn close(self) -> Result<(), TransportError>;
}
