//! Turns unstructured command output into structured facts.
//!
//! Extraction is driven by [PatternSet]s: plain data mapping a field name to a regular
//! expression whose capture group of the same name holds the field's value. Pattern sets know
//! nothing about sessions, so every one of them can be tested against captured output alone.
//!
//! This module also interprets the extracted fields into the typed readings the rest of the
//! pipeline works with: [DeviceFacts], [CdpStatus], and [NtpStatus].

use crate::error::HostError;
use crate::executor::CommandResult;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

/// The command whose output identifies a device.
pub const SHOW_VERSION: &str = "show version";

/// The command whose output lists CDP neighbors.
pub const SHOW_CDP_NEIGHBORS: &str = "show cdp neighbors detail";

/// The command whose output reports NTP synchronization.
pub const SHOW_NTP_STATUS: &str = "show ntp status";

/// Separates neighbor records in `show cdp neighbors detail` output.
pub const CDP_NEIGHBOR_DELIMITER: &str = "Device ID:";

/// Extracted fields, in pattern set order.
pub type Facts = IndexMap<&'static str, String>;

/// An ordered mapping of field names to capture patterns.
///
/// Patterns are case-insensitive and multi-line: `^` and `$` anchor to individual lines, but the
/// search covers the whole text.
#[derive(Clone, Debug)]
pub struct PatternSet {
    patterns: IndexMap<&'static str, Regex>,
}

impl PatternSet {
    /// Compiles a pattern set.
    ///
    /// Each pattern must contain a named capture group matching its field name.
    pub fn new(fields: &[(&'static str, &str)]) -> Result<Self, regex::Error> {
        let mut patterns = IndexMap::with_capacity(fields.len());
        for &(field, pattern) in fields {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .multi_line(true)
                .build()?;
            if regex.capture_names().flatten().all(|name| name != field) {
                return Err(regex::Error::Syntax(format!(
                    "pattern for {field} has no capture group named {field}"
                )));
            }
            patterns.insert(field, regex);
        }
        Ok(PatternSet { patterns })
    }

    /// Returns the field names of this set, in order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patterns.keys().copied()
    }

    /// Applies every pattern to `text`, keeping the first match for each field.
    ///
    /// Fields without a match are absent from the result; callers decide whether a partial
    /// result is acceptable.
    pub fn extract(&self, text: &str) -> Facts {
        let text = normalize_line_endings(text);
        let mut facts = Facts::with_capacity(self.patterns.len());
        for (&field, regex) in &self.patterns {
            if let Some(value) = regex.captures(&text).and_then(|c| c.name(field)) {
                facts.insert(field, value.as_str().to_owned());
            }
        }
        facts
    }
}

// `$` does not match before '\r', and devices answering over SSH usually end lines with "\r\n".
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Identity fields parsed from `show version`.
pub fn version_patterns() -> &'static PatternSet {
    static COMPUTED: OnceLock<PatternSet> = OnceLock::new();
    COMPUTED.get_or_init(|| {
        compile(&[
            (
                SOFTWARE,
                r"^Cisco\s+IOS.+Software\s+\((?P<Software>\S+)\),\s+Version\s+\S+,\s+RELEASE\s+SOFTWARE\s+\(fc\d+\)$",
            ),
            (HOSTNAME, r"^(?P<Hostname>\S+)\s+uptime\s+is.+$"),
            (MODEL_NUMBER, r"^Cisco\s+(?P<ModelNumber>\S+).+\(revision.+$"),
        ])
    })
}

/// Fields parsed from `show cdp neighbors detail`.
pub fn cdp_patterns() -> &'static PatternSet {
    static COMPUTED: OnceLock<PatternSet> = OnceLock::new();
    COMPUTED.get_or_init(|| compile(&[(CDP_DISABLED, r"^\W*(?P<Disabled>CDP\s+is\s+not\s+enabled)")]))
}

/// Fields parsed from `show ntp status`.
pub fn ntp_patterns() -> &'static PatternSet {
    static COMPUTED: OnceLock<PatternSet> = OnceLock::new();
    COMPUTED
        .get_or_init(|| compile(&[(NTP_STATUS, r"^\W*Clock\s+is\s+(?P<Status>(?:un)?synchronized)")]))
}

// The built-in patterns are constants, so failing to compile one is a bug caught by the tests.
fn compile(fields: &[(&'static str, &str)]) -> PatternSet {
    match PatternSet::new(fields) {
        Ok(set) => set,
        Err(error) => panic!("BUG: built-in pattern set does not compile: {error}"),
    }
}

const SOFTWARE: &str = "Software";
const HOSTNAME: &str = "Hostname";
const MODEL_NUMBER: &str = "ModelNumber";
const CDP_DISABLED: &str = "Disabled";
const NTP_STATUS: &str = "Status";

/// Identity of a device. Only exists when every field was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceFacts {
    pub software: String,
    pub hostname: String,
    pub model_number: String,
}

impl DeviceFacts {
    /// Builds [DeviceFacts] from `show version` output.
    ///
    /// # Errors
    ///
    /// Returns [HostError::ExtractionIncomplete] naming the first missing field.
    pub fn from_show_version(text: &str) -> Result<Self, HostError> {
        let mut facts = version_patterns().extract(text);
        let mut take = |field: &'static str| {
            facts
                .swap_remove(field)
                .ok_or(HostError::ExtractionIncomplete { missing: field })
        };
        Ok(DeviceFacts {
            software: take(SOFTWARE)?,
            hostname: take(HOSTNAME)?,
            model_number: take(MODEL_NUMBER)?,
        })
    }
}

/// CDP reading for one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CdpStatus {
    On { peers: usize },
    Off,
    /// The probe could not be run.
    Unknown,
}

impl CdpStatus {
    /// Interprets the result of running [SHOW_CDP_NEIGHBORS].
    pub fn from_probe(result: &CommandResult) -> Self {
        match result {
            CommandResult::Success(text) => {
                if cdp_patterns().extract(text).contains_key(CDP_DISABLED) {
                    CdpStatus::Off
                } else {
                    CdpStatus::On {
                        peers: text.matches(CDP_NEIGHBOR_DELIMITER).count(),
                    }
                }
            }
            // IOS prints nothing at all when CDP runs without neighbors.
            CommandResult::Empty => CdpStatus::On { peers: 0 },
            CommandResult::CommandError { .. } | CommandResult::TransportError(_) => {
                CdpStatus::Unknown
            }
        }
    }

    /// Number of neighbors seen. Zero unless CDP is on.
    pub fn peers(&self) -> usize {
        match self {
            CdpStatus::On { peers } => *peers,
            CdpStatus::Off | CdpStatus::Unknown => 0,
        }
    }
}

impl fmt::Display for CdpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdpStatus::On { .. } => f.write_str("On"),
            CdpStatus::Off => f.write_str("Off"),
            CdpStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

/// NTP reading for one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NtpStatus {
    Sync,
    NotSync,
    /// The probe could not be run.
    Unknown,
}

impl NtpStatus {
    /// Interprets the result of running [SHOW_NTP_STATUS].
    pub fn from_probe(result: &CommandResult) -> Self {
        match result {
            CommandResult::Success(text) => match ntp_patterns().extract(text).get(NTP_STATUS) {
                Some(status) if status.eq_ignore_ascii_case("synchronized") => NtpStatus::Sync,
                _ => NtpStatus::NotSync,
            },
            CommandResult::Empty => NtpStatus::NotSync,
            CommandResult::CommandError { .. } | CommandResult::TransportError(_) => {
                NtpStatus::Unknown
            }
        }
    }
}

impl fmt::Display for NtpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtpStatus::Sync => f.write_str("Sync"),
            NtpStatus::NotSync => f.write_str("NotSync"),
            NtpStatus::Unknown => f.write_str("Unknown"),
        }
    }
}
