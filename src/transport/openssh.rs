//! Key-authenticated transport based on the [openssh] crate.
//!
//! Sessions are multiplexed over the system `ssh` binary, so authentication follows the user's
//! ssh configuration and agent. The crate runs `ssh` in batch mode, which rules out interactive
//! password prompts: only [Credentials::user] is passed on, and the account must land in
//! privileged exec mode on login. Password logins go through [super::russh] instead.
//!
//! Every [Session::run] is its own exec channel, so session state such as `terminal length 0`
//! does not carry over from one command to the next.

use super::{Credentials, ManageSession, Session};
use crate::error::{ConnectError, TransportError};
use async_trait::async_trait;
use openssh::{KnownHosts, SessionBuilder, Stdio};
use std::net::Ipv4Addr;
use std::process::Output;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Implementation of [ManageSession] for key logins.
#[derive(Clone, Debug)]
pub struct ConnectionManager {
    connect_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(connect_timeout: Duration) -> Self {
        ConnectionManager { connect_timeout }
    }
}

#[async_trait]
impl ManageSession<SshSession> for ConnectionManager {
    async fn connect(
        &mut self,
        address: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<SshSession, ConnectError> {
        let mut builder = SessionBuilder::default();
        builder
            .user(credentials.user.clone())
            .known_hosts_check(KnownHosts::Add)
            .connect_timeout(self.connect_timeout);

        let session = builder
            .connect_mux(address.to_string())
            .await
            .map_err(|error| ConnectError {
                host: address.to_string(),
                reason: error.to_string(),
            })?;

        Ok(SshSession { session })
    }
}

/// Implementation of [Session] for key logins.
pub struct SshSession {
    session: openssh::Session,
}

#[async_trait]
impl Session for SshSession {
    async fn run(&mut self, command: &str) -> Result<String, TransportError> {
        debug!(command, "sending exec request");
        let output = self
            .session
            .raw_command(command)
            .output()
            .await
            .map_err(transport_error)?;
        Ok(output_text(output))
    }

    /// Opens `configure terminal` and streams `lines` to it, followed by `end`.
    async fn configure(&mut self, lines: &[String]) -> Result<String, TransportError> {
        let mut child = self
            .session
            .raw_command("configure terminal")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .await
            .map_err(transport_error)?;

        let mut batch = String::new();
        for line in lines {
            batch.push_str(line);
            batch.push('\n');
        }
        batch.push_str("end\n");

        if let Some(mut stdin) = child.stdin().take() {
            stdin
                .write_all(batch.as_bytes())
                .await
                .map_err(|error| TransportError(error.to_string()))?;
            // Dropping stdin sends EOF, which ends the exec channel.
        }

        let output = child.wait_with_output().await.map_err(transport_error)?;
        Ok(output_text(output))
    }

    async fn close(self) -> Result<(), TransportError> {
        self.session.close().await.map_err(transport_error)
    }
}

fn transport_error(error: openssh::Error) -> TransportError {
    TransportError(error.to_string())
}

// IOS reports most problems on stdout, but a non-zero exit with an empty stdout still carries
// its reason on stderr.
fn output_text(output: Output) -> String {
    if output.stdout.is_empty() && !output.status.success() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}
