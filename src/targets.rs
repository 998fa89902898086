//! Validates command-line targets and enumerates the hosts of a management network.

use crate::error::ValidationError;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Networks with a shorter prefix than this are accepted but worth a warning. A /16 already
/// holds 65534 hosts.
pub const WIDE_PREFIX: u8 = 16;

/// Parses an IPv4 network in CIDR notation. A bare address is treated as a /32.
///
/// # Errors
///
/// Returns an error if `input` is not a network or if it has host bits set (e.g. `10.0.0.1/24`).
pub fn parse_network(input: &str) -> Result<Ipv4Network, ValidationError> {
    let network = Ipv4Network::from_str(input.trim()).map_err(|error| ValidationError::Network {
        input: input.to_owned(),
        reason: error.to_string(),
    })?;

    if network.ip() != network.network() {
        return Err(ValidationError::HostBitsSet {
            input: input.to_owned(),
            network: format!("{}/{}", network.network(), network.prefix()),
        });
    }
    Ok(network)
}

/// Whether `network` is wider than [WIDE_PREFIX].
pub fn is_wide(network: Ipv4Network) -> bool {
    network.prefix() < WIDE_PREFIX
}

/// Parses a single IPv4 address.
pub fn parse_address(input: &str) -> Result<Ipv4Addr, ValidationError> {
    Ipv4Addr::from_str(input.trim()).map_err(|source| ValidationError::Address {
        input: input.to_owned(),
        source,
    })
}

/// Returns the usable host addresses of `network` in ascending order.
///
/// The network and broadcast addresses are excluded, except for /31 point-to-point links, where
/// both addresses are usable, and /32, which is the single host itself.
pub fn usable_hosts(network: Ipv4Network) -> Vec<Ipv4Addr> {
    let first = u32::from(network.network());
    let last = u32::from(network.broadcast());

    let (start, end) = match network.prefix() {
        31 | 32 => (first, last),
        _ => (first + 1, last - 1),
    };
    (start..=end).map(Ipv4Addr::from).collect()
}

#[cfg(test)]
mod test;
