// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Text parsing for the addresses, CIDR blocks and endpoint URLs that appear
//! in profiles. Nothing here trims input; callers normalize first.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::Ipv4Network;
use thiserror::Error;
use url::{Host, Url};

/// Schemes the engine accepts for listener and peer endpoints.
pub const ENDPOINT_SCHEMES: &[&str] = &["tcp", "udp", "wg", "ws", "wss", "quic"];

/// Malformed address, CIDR or URL text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid IPv4 address: {0:?}")]
    Ipv4(String),

    #[error("invalid IP address: {0:?}")]
    Ip(String),

    #[error("invalid CIDR: {0:?}")]
    Cidr(String),

    #[error("prefix length {prefix} out of range (0-32)")]
    PrefixOutOfRange { prefix: String },

    #[error("invalid URL {input:?}: {reason}")]
    Url { input: String, reason: String },

    #[error("unsupported scheme {scheme:?} (expected one of tcp, udp, wg, ws, wss, quic)")]
    Scheme { scheme: String },
}

/// Which transport an endpoint binds, used for port conflict checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

/// A parsed `scheme://host:port` listener or peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn transport(&self) -> Transport {
        match self.scheme.as_str() {
            "tcp" | "ws" | "wss" => Transport::Tcp,
            _ => Transport::Udp,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a dotted quad. Leading zeros are tolerated (`010.0.0.1` is
/// `10.0.0.1`); signs, whitespace and anything but four parts are not.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr, FormatError> {
    let err = || FormatError::Ipv4(s.to_string());

    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or_else(err)?;
        if !is_digits(part) {
            return Err(err());
        }
        *octet = part.parse().map_err(|_| err())?;
    }
    if parts.next().is_some() {
        return Err(err());
    }
    Ok(Ipv4Addr::from(octets))
}

pub fn format_ipv4(addr: Ipv4Addr) -> String {
    addr.to_string()
}

/// IPv4 via [`parse_ipv4`], otherwise standard IPv6 text.
pub fn parse_ip(s: &str) -> Result<IpAddr, FormatError> {
    if let Ok(v4) = parse_ipv4(s) {
        return Ok(IpAddr::V4(v4));
    }
    s.parse::<Ipv6Addr>()
        .map(IpAddr::V6)
        .map_err(|_| FormatError::Ip(s.to_string()))
}

/// Parse `a.b.c.d/len`. Host bits are kept as written.
pub fn parse_cidr(s: &str) -> Result<Ipv4Network, FormatError> {
    let (addr, prefix) = s
        .split_once('/')
        .ok_or_else(|| FormatError::Cidr(s.to_string()))?;

    let addr = parse_ipv4(addr).map_err(|_| FormatError::Cidr(s.to_string()))?;

    if !is_digits(prefix) {
        return Err(FormatError::Cidr(s.to_string()));
    }
    let out_of_range = || FormatError::PrefixOutOfRange {
        prefix: prefix.to_string(),
    };
    let prefix: u8 = prefix.parse().map_err(|_| out_of_range())?;
    if prefix > 32 {
        return Err(out_of_range());
    }

    Ipv4Network::new(addr, prefix).map_err(|_| FormatError::Cidr(s.to_string()))
}

fn parse_url(s: &str) -> Result<Url, FormatError> {
    Url::parse(s).map_err(|e| FormatError::Url {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a listener or peer endpoint such as `udp://0.0.0.0:11010`.
pub fn parse_endpoint_url(s: &str) -> Result<Endpoint, FormatError> {
    let url = parse_url(s)?;

    let scheme = url.scheme();
    if !ENDPOINT_SCHEMES.contains(&scheme) {
        return Err(FormatError::Scheme {
            scheme: scheme.to_string(),
        });
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => {
            return Err(FormatError::Url {
                input: s.to_string(),
                reason: "missing host".into(),
            });
        }
    };

    check_host(s, raw_host(s).unwrap_or(&host))?;

    let port = match url.port_or_known_default() {
        Some(p) if p != 0 => p,
        _ => {
            return Err(FormatError::Url {
                input: s.to_string(),
                reason: "missing or zero port".into(),
            });
        }
    };

    Ok(Endpoint {
        scheme: scheme.to_string(),
        host,
        port,
    })
}

/// Host text exactly as written, before the URL parser normalizes it.
fn raw_host(s: &str) -> Option<&str> {
    let (_, rest) = s.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if host_port.starts_with('[') {
        return host_port.find(']').map(|end| &host_port[..=end]);
    }
    Some(host_port.rsplit_once(':').map_or(host_port, |(h, _)| h))
}

// Non-special schemes leave the host opaque, so it is checked here. Numeric
// hosts must be a strict dotted quad; shorthand like `1.2.3` is refused.
fn check_host(input: &str, host: &str) -> Result<(), FormatError> {
    let bad = || FormatError::Url {
        input: input.to_string(),
        reason: format!("invalid host {host:?}"),
    };
    match Host::parse(host) {
        Ok(Host::Domain(_)) | Ok(Host::Ipv6(_)) => Ok(()),
        Ok(Host::Ipv4(_)) => parse_ipv4(host).map(|_| ()).map_err(|_| bad()),
        Err(_) => Err(bad()),
    }
}

/// Loose check for a config/public server address: any scheme, but a host
/// is required.
pub fn parse_server_url(s: &str) -> Result<Url, FormatError> {
    let url = parse_url(s)?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FormatError::Url {
            input: s.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}
