//! Error types shared across the audit pipeline.
//!
//! Every per-host error is contained at the host boundary by [crate::fleet]; only
//! [ValidationError] aborts a run, and it can only occur before the first host is contacted.

use std::io;
use std::net::AddrParseError;
use thiserror::Error;

/// The transport could not open a session to a host, e.g. because it is unreachable or rejected
/// the credentials.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("could not connect to {host}: {reason}")]
pub struct ConnectError {
    pub host: String,
    pub reason: String,
}

/// An open session failed mid-exchange, e.g. due to an I/O or protocol fault.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Reasons a host leaves the pipeline early.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("`{command}` failed: {source}")]
    Transport {
        command: String,
        source: TransportError,
    },

    #[error("device rejected `{command}` ({marker})")]
    Command { command: String, marker: String },

    #[error("`{command}` returned no output")]
    EmptyOutput { command: String },

    /// Identification found some facts but not all of the required ones.
    #[error("could not identify device: no {missing} in `show version` output")]
    ExtractionIncomplete { missing: &'static str },
}

/// A configuration snapshot could not be persisted. Never fatal for a host.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("refusing to store backup under unsafe key {0:?}")]
    InvalidKey(String),

    #[error("could not write backup {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("backup task for {key} did not complete: {reason}")]
    Interrupted { key: String, reason: String },
}

/// Malformed command-line input. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid IPv4 network {input:?}: {reason}")]
    Network { input: String, reason: String },

    #[error("invalid IPv4 network {input:?}: host bits are set (did you mean {network}?)")]
    HostBitsSet { input: String, network: String },

    #[error("invalid IPv4 address {input:?}: {source}")]
    Address {
        input: String,
        #[source]
        source: AddrParseError,
    },

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}
