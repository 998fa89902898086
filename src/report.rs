//! Summarizes the fleet, one line per fully processed device.
//!
//! The line layout, `Hostname|ModelNumber|Crypto|CDP is <Status>, <Peers> Peers|Clock in <Ntp>`,
//! is a stable contract for whatever consumes the summary: fields are never reordered and the
//! delimiter never changes.

use crate::extract::{CdpStatus, DeviceFacts, NtpStatus};
use std::fmt;
use std::io::{self, Write};
use std::net::Ipv4Addr;

/// Printed ahead of the report lines.
pub const SUMMARY_HEADER: &str = "----SUMMARY----";

/// Licensing classification of a device's software image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crypto {
    /// Payload encryption.
    Pe,
    /// No payload encryption.
    Npe,
}

impl Crypto {
    /// Classifies a software image name. Images containing "npe" in any case are `NPE`.
    pub fn classify(software: &str) -> Self {
        if software.to_lowercase().contains("npe") {
            Crypto::Npe
        } else {
            Crypto::Pe
        }
    }
}

impl fmt::Display for Crypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crypto::Pe => f.write_str("PE"),
            Crypto::Npe => f.write_str("NPE"),
        }
    }
}

/// Formats the report line for one device.
pub fn format_line(facts: &DeviceFacts, cdp: &CdpStatus, ntp: &NtpStatus) -> String {
    format!(
        "{}|{}|{}|CDP is {cdp}, {} Peers|Clock in {ntp}",
        facts.hostname,
        facts.model_number,
        Crypto::classify(&facts.software),
        cdp.peers(),
    )
}

/// The lines for every device that made it through the pipeline.
///
/// Lines are ordered by host address regardless of the order hosts finished in, so repeated
/// runs against the same fleet print the same summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FleetReport {
    lines: Vec<(Ipv4Addr, String)>,
}

impl FleetReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the line for `host`.
    pub fn push(&mut self, host: Ipv4Addr, line: String) {
        let index = self.lines.partition_point(|(addr, _)| *addr <= host);
        self.lines.insert(index, (host, line));
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|(_, line)| line.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Writes the summary header followed by every line.
    pub fn write_summary(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, "{SUMMARY_HEADER}")?;
        for line in self.lines() {
            writeln!(writer, "{line}")?;
        }
        writer.flush()
    }
}
