//! Decides which time settings a device is missing, and applies them.
//!
//! Planning is idempotent: a setting is only planned when its exact line is absent from the
//! device's configuration, so planning against an already remediated configuration yields an
//! empty plan. The NTP line is additionally gated on the NTP server answering pings from the
//! device, because pointing a device at an unreachable time source is worse than leaving it
//! alone.

use crate::error::HostError;
use crate::executor::{CommandResult, Executor};
use crate::transport::Session;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// The timezone line applied when none is configured.
pub const DEFAULT_TIMEZONE_LINE: &str = "clock timezone GMT 0 0";

/// A desired setting, named by what it configures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Ntp,
    Timezone,
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKey::Ntp => f.write_str("ntp"),
            SettingKey::Timezone => f.write_str("timezone"),
        }
    }
}

/// The configuration lines every device should carry, in the order they are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredSettings {
    ntp_server: Ipv4Addr,
    lines: IndexMap<SettingKey, String>,
}

impl DesiredSettings {
    /// Desired settings pointing devices at `ntp_server` with the default timezone.
    pub fn new(ntp_server: Ipv4Addr) -> Self {
        Self::with_timezone(ntp_server, DEFAULT_TIMEZONE_LINE)
    }

    pub fn with_timezone(ntp_server: Ipv4Addr, timezone_line: impl Into<String>) -> Self {
        let mut lines = IndexMap::with_capacity(2);
        lines.insert(SettingKey::Ntp, format!("ntp server {ntp_server}"));
        lines.insert(SettingKey::Timezone, timezone_line.into());
        DesiredSettings { ntp_server, lines }
    }

    pub fn ntp_server(&self) -> Ipv4Addr {
        self.ntp_server
    }

    /// Returns the literal configuration line for `key`.
    pub fn line(&self, key: SettingKey) -> &str {
        // Both keys are inserted by every constructor.
        self.lines.get(&key).map(String::as_str).unwrap_or_default()
    }

    /// Iterates over `(key, line)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (SettingKey, &str)> {
        self.lines.iter().map(|(&key, line)| (key, line.as_str()))
    }
}

/// The settings a device needs, in application order. Empty means compliant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemediationPlan {
    keys: Vec<SettingKey>,
}

impl RemediationPlan {
    pub fn keys(&self) -> &[SettingKey] {
        &self.keys
    }

    pub fn contains(&self, key: SettingKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolves the plan to literal configuration lines.
    pub fn lines(&self, desired: &DesiredSettings) -> Vec<String> {
        self.keys
            .iter()
            .map(|&key| desired.line(key).to_owned())
            .collect()
    }

    fn withhold(&mut self, key: SettingKey) {
        self.keys.retain(|&k| k != key);
    }
}

/// Returns the settings no line of `config` starts with.
///
/// A setting counts as present when a config line, ignoring indentation, is the setting's line
/// itself or continues it with further options (`ntp server 10.0.0.254 prefer`).
pub fn missing_settings(config: &str, desired: &DesiredSettings) -> RemediationPlan {
    RemediationPlan {
        keys: desired
            .iter()
            .filter(|(_, line)| !config.lines().any(|config_line| sets(config_line, line)))
            .map(|(key, _)| key)
            .collect(),
    }
}

fn sets(config_line: &str, setting: &str) -> bool {
    config_line
        .trim()
        .strip_prefix(setting)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Parses the success rate, in percent, out of IOS `ping` output.
pub fn parse_success_rate(text: &str) -> Option<u8> {
    static COMPUTED: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = COMPUTED
        .get_or_init(|| Regex::new(r"(?mi)^\s*Success\s+rate\s+is\s+(?P<Rate>\d+)\s+percent").ok())
        .as_ref()?;
    regex
        .captures(text)?
        .name("Rate")?
        .as_str()
        .parse::<u8>()
        .ok()
        .filter(|&rate| rate <= 100)
}

/// Computes which of `desired` the device behind `session` needs.
///
/// If the NTP line is missing, the NTP server is pinged from the device first. The NTP setting
/// is withheld when the ping cannot be run, its output cannot be read, or no reply came back;
/// the other missing settings are planned either way.
pub async fn plan<S: Session>(
    executor: &Executor,
    session: &mut S,
    host: &str,
    config: &str,
    desired: &DesiredSettings,
) -> RemediationPlan {
    let mut plan = missing_settings(config, desired);
    for key in plan.keys() {
        debug!(host, setting = %key, line = desired.line(*key), "setting missing from configuration");
    }

    if plan.contains(SettingKey::Ntp) {
        let command = format!("ping {}", desired.ntp_server());
        let reachable = match executor.execute(session, &command).await {
            CommandResult::Success(text) => match parse_success_rate(&text) {
                Some(0) => {
                    warn!(host, server = %desired.ntp_server(), "NTP server is not reachable from device");
                    false
                }
                Some(rate) => {
                    debug!(host, rate, "NTP server reachable");
                    true
                }
                None => {
                    warn!(host, "could not read ping success rate");
                    false
                }
            },
            other => {
                warn!(host, ?other, "could not check NTP server reachability");
                false
            }
        };

        if !reachable {
            plan.withhold(SettingKey::Ntp);
        }
    }

    plan
}

/// Whether [apply] sends configuration to devices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    #[default]
    Apply,
    DryRun,
}

/// Sends the plan's lines to the device.
///
/// A device rejecting some of the lines is logged but not treated as a failure; the device will
/// simply be planned again on the next run.
///
/// # Errors
///
/// Returns an error only if the session failed while sending.
pub async fn apply<S: Session>(
    executor: &Executor,
    session: &mut S,
    host: &str,
    plan: &RemediationPlan,
    desired: &DesiredSettings,
    mode: ApplyMode,
) -> Result<(), HostError> {
    if plan.is_empty() {
        info!(host, "nothing to change in configuration");
        return Ok(());
    }

    let lines = plan.lines(desired);
    if mode == ApplyMode::DryRun {
        info!(host, ?lines, "dry run: would apply configuration");
        return Ok(());
    }

    info!(host, ?lines, "applying configuration");
    match executor.configure(session, &lines).await {
        CommandResult::Success(_) | CommandResult::Empty => Ok(()),
        CommandResult::CommandError { marker } => {
            warn!(host, %marker, "device rejected part of the configuration");
            Ok(())
        }
        CommandResult::TransportError(source) => Err(HostError::Transport {
            command: "configure terminal".to_owned(),
            source,
        }),
    }
}
