//! Prompt-driven exchange with an interactive device CLI.
//!
//! A [Shell] wraps one bidirectional byte stream, usually a PTY shell channel. Every command is
//! written to the same stream, so per-session state set by one command (`terminal length 0`,
//! privilege level, configuration mode) carries over to the ones after it. A command's output is
//! everything the device prints until its prompt shows up again.

use crate::error::TransportError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const ENABLE: &str = "enable";
pub const CONFIGURE_TERMINAL: &str = "configure terminal";
pub const END: &str = "end";

const READ_CHUNK: usize = 4096;

/// What [Shell::read_until] waits for at the tail of the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wait {
    /// Any prompt. Used before the device's prompt is known.
    AnyPrompt,
    /// The device's own prompt, in any mode.
    Prompt,
    /// A password request or the device's own prompt.
    SecretOrPrompt,
}

/// An open CLI session in privileged exec mode.
#[derive(Debug)]
pub struct Shell<T> {
    stream: T,
    buffer: Vec<u8>,
    base: String,
    timeout: Duration,
}

impl<T> Shell<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Waits for the first prompt on `stream` and enters privileged exec mode.
    ///
    /// A device that lands in user exec mode (`R1>`) is sent `enable` and, if it asks,
    /// `enable_secret`. `timeout` bounds every wait for device output.
    ///
    /// # Errors
    ///
    /// Fails if the stream closes or stalls before a prompt, or if the device stays in user exec
    /// mode after `enable`.
    pub async fn open(
        stream: T,
        enable_secret: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut shell = Shell {
            stream,
            buffer: Vec::new(),
            base: String::new(),
            timeout,
        };

        let banner = shell.read_until(Wait::AnyPrompt).await?;
        let Some((base, mode)) = prompt_of(last_line(&banner)) else {
            return Err(TransportError("no prompt after login".to_owned()));
        };
        shell.base = base.to_owned();
        debug!(prompt = %shell.base, "shell ready");

        if mode == '>' {
            shell.enable(enable_secret).await?;
        }
        Ok(shell)
    }

    async fn enable(&mut self, secret: &str) -> Result<(), TransportError> {
        self.send(ENABLE).await?;
        let mut reply = self.read_until(Wait::SecretOrPrompt).await?;
        if is_secret_request(last_line(&reply)) {
            self.send(secret).await?;
            reply = self.read_until(Wait::SecretOrPrompt).await?;
        }

        match prompt_of(last_line(&reply)) {
            Some((_, '#')) => Ok(()),
            _ => Err(TransportError(
                "enable was refused, device stayed in user exec mode".to_owned(),
            )),
        }
    }

    /// Runs one command and returns what it printed, without the echoed command or the prompt.
    pub async fn run(&mut self, command: &str) -> Result<String, TransportError> {
        self.send(command).await?;
        let output = self.read_until(Wait::Prompt).await?;
        Ok(command_output(&output, command).to_owned())
    }

    /// Enters configuration mode, sends `lines` one by one, and returns to privileged exec.
    ///
    /// The returned text joins the output of every line, so error markers from any of them
    /// reach the caller.
    pub async fn configure(&mut self, lines: &[String]) -> Result<String, TransportError> {
        let mut transcript = self.run(CONFIGURE_TERMINAL).await?;
        for line in lines.iter().map(String::as_str).chain([END]) {
            transcript.push_str(&self.run(line).await?);
        }
        Ok(transcript)
    }

    /// Shuts down the write side of the stream.
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await.map_err(io_error)
    }

    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(io_error)?;
        self.stream.flush().await.map_err(io_error)
    }

    /// Reads until the output's last line is what `wait` asks for, then returns and clears the
    /// buffered output.
    async fn read_until(&mut self, wait: Wait) -> Result<String, TransportError> {
        let mut chunk = [0; READ_CHUNK];
        loop {
            let read = tokio::time::timeout(self.timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| {
                    TransportError("timed out waiting for the device prompt".to_owned())
                })?
                .map_err(io_error)?;
            if read == 0 {
                return Err(TransportError("shell closed by the device".to_owned()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.tail_matches(wait) {
                let output = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                return Ok(output);
            }
        }
    }

    fn tail_matches(&self, wait: Wait) -> bool {
        let start = self
            .buffer
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |newline| newline + 1);
        let tail = String::from_utf8_lossy(&self.buffer[start..]);

        let own_prompt = || tail.starts_with(&self.base) && prompt_of(&tail).is_some();
        match wait {
            Wait::AnyPrompt => prompt_of(&tail).is_some(),
            Wait::Prompt => own_prompt(),
            Wait::SecretOrPrompt => is_secret_request(&tail) || own_prompt(),
        }
    }
}

/// Splits a prompt such as `R1#` or `R1(config)#` into its hostname part and mode character.
fn prompt_of(line: &str) -> Option<(&str, char)> {
    let line = line.trim();
    let mode = line.chars().last().filter(|&c| matches!(c, '>' | '#'))?;
    let body = &line[..line.len() - 1];
    if body.is_empty() || body.contains(char::is_whitespace) {
        return None;
    }
    let base = body.split('(').next().unwrap_or(body);
    Some((base, mode))
}

fn is_secret_request(line: &str) -> bool {
    line.trim_end().to_ascii_lowercase().ends_with("password:")
}

fn last_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or(text)
}

/// Strips the trailing prompt and the echoed command from a command's raw output.
fn command_output<'a>(output: &'a str, command: &str) -> &'a str {
    let body = match output.rfind('\n') {
        Some(newline) => &output[..=newline],
        None => "",
    };
    match body.split_once('\n') {
        Some((echo, rest)) if echo.trim_end().ends_with(command.trim()) => rest,
        _ => body,
    }
}

fn io_error(error: std::io::Error) -> TransportError {
    TransportError(error.to_string())
}
