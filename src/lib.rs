//! Fleet audit and remediation for network devices.
//!
//! netaudit logs into every host of a management network, identifies the device, backs up its
//! running configuration, reads its CDP and NTP status, brings its time settings in line, and
//! prints one summary line per device.
//!
//! # Program flow
//!
//! This section is meant for developers working on netaudit. If you are using netaudit to audit
//! devices, `netaudit --help` is all you need.
//!
//! 1. The `netaudit` binary validates its arguments, loads [config::Settings], and enumerates the
//!    hosts of the management network with [targets::usable_hosts].
//!
//! 2. [fleet::run_fleet] runs a [fleet::Pipeline] for each host, a bounded number at a time. A
//!    host's pipeline talks to the device only through the [transport] traits, runs every
//!    command through an [executor::Executor], and reads the answers with [extract].
//!
//! 3. Along the way, [snapshot] archives the configuration and [remediate] plans and applies
//!    the missing settings. Any failure skips the rest of that host's pipeline and nothing else.
//!
//! 4. The [report::FleetReport] collects the lines of every host that made it through, and the
//!    binary prints it once all hosts have finished.

pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod fleet;
pub mod logger;
pub mod remediate;
pub mod report;
pub mod snapshot;
pub mod targets;
pub mod transport;

#[doc(inline)]
pub use fleet::run_fleet;
