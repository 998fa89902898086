//! Password-authenticated transport based on the [russh] crate.
//!
//! Logs in with [Credentials::user] and [Credentials::password], opens a PTY shell, and hands the
//! channel to a [Shell], which enters privileged exec mode using the same password as the enable
//! secret. All commands of a session share that one shell.

use super::shell::Shell;
use super::{Credentials, ManageSession, Session};
use crate::error::{ConnectError, TransportError};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::ChannelStream;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SSH_PORT: u16 = 22;
const TERMINAL: &str = "vt100";
const TERMINAL_WIDTH: u32 = 511;
const TERMINAL_HEIGHT: u32 = 24;

type Channel = Pin<Box<ChannelStream<Msg>>>;

/// Production implementation of [ManageSession] for password logins.
#[derive(Clone)]
pub struct ConnectionManager {
    config: Arc<client::Config>,
    timeout: Duration,
}

impl ConnectionManager {
    /// `timeout` bounds the TCP connect and handshake as well as every wait for device output.
    pub fn new(timeout: Duration) -> Self {
        ConnectionManager {
            config: Arc::new(client::Config::default()),
            timeout,
        }
    }

    async fn open(
        &self,
        address: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<(Handle<AcceptHostKey>, Shell<Channel>), String> {
        let handler = AcceptHostKey { address };
        let connecting = client::connect(self.config.clone(), (address, SSH_PORT), handler);
        let mut handle = tokio::time::timeout(self.timeout, connecting)
            .await
            .map_err(|_| "timed out".to_owned())?
            .map_err(|error| error.to_string())?;

        let auth = handle
            .authenticate_password(credentials.user.clone(), credentials.password.clone())
            .await
            .map_err(|error| error.to_string())?;
        if !auth.success() {
            return Err(format!("password rejected for user {}", credentials.user));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|error| error.to_string())?;
        channel
            .request_pty(false, TERMINAL, TERMINAL_WIDTH, TERMINAL_HEIGHT, 0, 0, &[])
            .await
            .map_err(|error| error.to_string())?;
        channel
            .request_shell(false)
            .await
            .map_err(|error| error.to_string())?;

        let stream = Box::pin(channel.into_stream());
        let shell = Shell::open(stream, &credentials.password, self.timeout)
            .await
            .map_err(|error| error.0)?;
        Ok((handle, shell))
    }
}

#[async_trait]
impl ManageSession<ShellSession> for ConnectionManager {
    async fn connect(
        &mut self,
        address: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<ShellSession, ConnectError> {
        let (handle, shell) = self
            .open(address, credentials)
            .await
            .map_err(|reason| ConnectError {
                host: address.to_string(),
                reason,
            })?;
        Ok(ShellSession { handle, shell })
    }
}

/// Production implementation of [Session] for password logins.
pub struct ShellSession {
    handle: Handle<AcceptHostKey>,
    shell: Shell<Channel>,
}

#[async_trait]
impl Session for ShellSession {
    async fn run(&mut self, command: &str) -> Result<String, TransportError> {
        debug!(command, "sending to shell");
        self.shell.run(command).await
    }

    async fn configure(&mut self, lines: &[String]) -> Result<String, TransportError> {
        self.shell.configure(lines).await
    }

    async fn close(self) -> Result<(), TransportError> {
        let closed = self.shell.close().await;
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(|error| TransportError(error.to_string()))?;
        closed
    }
}

/// Trusts every host key, like `StrictHostKeyChecking=no`.
#[derive(Debug)]
pub struct AcceptHostKey {
    address: Ipv4Addr,
}

impl client::Handler for AcceptHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _key: &PublicKey) -> Result<bool, Self::Error> {
        debug!(host = %self.address, "accepting host key");
        Ok(true)
    }
}
