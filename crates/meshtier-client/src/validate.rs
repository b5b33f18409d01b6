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

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use meshtier_types::address::{self, FormatError, Transport};
use meshtier_types::profile::{NetworkProfile, NetworkingMethod, PortForwardProto};
use thiserror::Error;
use tracing::debug;

pub const MTU_MIN: i32 = 400;
pub const MTU_MAX: i32 = 1380;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueKind {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("{value} out of range ({min}-{max})")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("required")]
    Missing,

    #[error("port {port} already used by TCP listener {listener:?}")]
    PortConflict { port: i32, listener: String },

    #[error("duplicates entry {first}")]
    Duplicate { first: usize },

    #[error("cannot be combined with {other}")]
    MutuallyExclusive { other: &'static str },
}

/// A problem with one profile field. `index` points into list fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub index: Option<usize>,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{i}]: {}", self.field, self.kind),
            None => write!(f, "{}: {}", self.field, self.kind),
        }
    }
}

#[derive(Debug, Error)]
#[error("profile has {} validation issue(s)", .0.len())]
pub struct InvalidProfile(pub Vec<ValidationIssue>);

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: &'static str, index: Option<usize>, kind: IssueKind) {
        self.0.push(ValidationIssue { field, index, kind });
    }

    fn range(&mut self, field: &'static str, index: Option<usize>, value: i32, min: i32, max: i32) -> bool {
        if (min..=max).contains(&value) {
            return true;
        }
        self.push(
            field,
            index,
            IssueKind::OutOfRange {
                value: value.into(),
                min: min.into(),
                max: max.into(),
            },
        );
        false
    }

    fn port(&mut self, field: &'static str, index: Option<usize>, value: i32) -> bool {
        self.range(field, index, value, 1, 65535)
    }

    fn each<T>(
        &mut self,
        field: &'static str,
        entries: &[String],
        parse: impl Fn(&str) -> Result<T, FormatError>,
    ) {
        for (i, entry) in entries.iter().enumerate() {
            if let Err(e) = parse(entry) {
                self.push(field, Some(i), e.into());
            }
        }
    }
}

/// Check every cross-field rule and return all problems found. An empty
/// list means the profile can be handed to the engine. The profile itself
/// is never touched.
pub fn validate(profile: &NetworkProfile) -> Vec<ValidationIssue> {
    let mut issues = Issues::default();

    if !profile.dhcp {
        if let Err(e) = address::parse_ipv4(&profile.virtual_ipv4) {
            issues.push("virtual_ipv4", None, e.into());
        }
        issues.range("network_length", None, profile.network_length, 0, 32);
    }

    match profile.networking_method {
        NetworkingMethod::PublicServer => {
            if profile.public_server_url.is_empty() {
                issues.push("public_server_url", None, IssueKind::Missing);
            } else if let Err(e) = address::parse_server_url(&profile.public_server_url) {
                issues.push("public_server_url", None, e.into());
            }
        }
        NetworkingMethod::Manual => {
            // Malformed entries are reported individually, so only an empty
            // list needs its own issue.
            issues.each("peer_urls", &profile.peer_urls, address::parse_endpoint_url);
            if profile.peer_urls.is_empty() {
                issues.push("peer_urls", None, IssueKind::Missing);
            }
        }
        NetworkingMethod::Standalone => {}
    }

    issues.each("listener_urls", &profile.listener_urls, address::parse_endpoint_url);
    issues.each("mapped_listeners", &profile.mapped_listeners, address::parse_endpoint_url);

    if profile.enable_vpn_portal {
        issues.port("vpn_portal_listen_port", None, profile.vpn_portal_listen_port);
        let cidr = format!(
            "{}/{}",
            profile.vpn_portal_client_network_addr, profile.vpn_portal_client_network_len
        );
        if let Err(e) = address::parse_cidr(&cidr) {
            issues.push("vpn_portal_client_network", None, e.into());
        }
    }

    if profile.enable_socks5 && issues.port("socks5_port", None, profile.socks5_port) {
        check_socks5_conflict(profile, &mut issues);
    }

    if let Some(mtu) = profile.mtu {
        issues.range("mtu", None, mtu, MTU_MIN, MTU_MAX);
    }

    check_port_forwards(profile, &mut issues);

    if profile.disable_p2p && profile.p2p_only {
        issues.push(
            "p2p_only",
            None,
            IssueKind::MutuallyExclusive {
                other: "disable_p2p",
            },
        );
    }

    issues.each("proxy_cidrs", &profile.proxy_cidrs, address::parse_cidr);
    if profile.enable_manual_routes {
        issues.each("routes", &profile.routes, address::parse_cidr);
    }
    if profile.enable_relay_network_whitelist {
        issues.each("relay_network_whitelist", &profile.relay_network_whitelist, |s| {
            if s.contains('/') {
                address::parse_cidr(s).map(|_| ())
            } else {
                address::parse_ipv4(s).map(|_| ())
            }
        });
    }
    issues.each("exit_nodes", &profile.exit_nodes, address::parse_ip);

    debug!(
        profile = %profile.id,
        issue_count = issues.0.len(),
        "validated profile"
    );
    issues.0
}

/// [`validate`] for callers that block on any issue.
pub fn ensure_valid(profile: &NetworkProfile) -> Result<(), InvalidProfile> {
    let issues = validate(profile);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(InvalidProfile(issues))
    }
}

// SOCKS5 listens on every interface over TCP, so any TCP-family listener on
// the same port collides regardless of its host.
fn check_socks5_conflict(profile: &NetworkProfile, issues: &mut Issues) {
    for listener in &profile.listener_urls {
        let Ok(endpoint) = address::parse_endpoint_url(listener) else {
            continue;
        };
        if endpoint.transport() == Transport::Tcp && i32::from(endpoint.port) == profile.socks5_port {
            issues.push(
                "socks5_port",
                None,
                IssueKind::PortConflict {
                    port: profile.socks5_port,
                    listener: listener.clone(),
                },
            );
        }
    }
}

fn check_port_forwards(profile: &NetworkProfile, issues: &mut Issues) {
    // Parsed addresses compare by value so `000.0.0.0` matches `0.0.0.0`.
    // Unparsable ones fall back to their text.
    type BindKey<'a> = (Result<IpAddr, &'a str>, i32, PortForwardProto);
    let mut seen: HashMap<BindKey<'_>, usize> = HashMap::new();

    for (i, forward) in profile.port_forwards.iter().enumerate() {
        let at = Some(i);
        issues.port("port_forwards.bind_port", at, forward.bind_port);
        issues.port("port_forwards.dst_port", at, forward.dst_port);
        let bind_ip = address::parse_ip(&forward.bind_ip);
        if let Err(e) = &bind_ip {
            issues.push("port_forwards.bind_ip", at, e.clone().into());
        }
        if let Err(e) = address::parse_ip(&forward.dst_ip) {
            issues.push("port_forwards.dst_ip", at, e.into());
        }

        let key = (
            bind_ip.map_err(|_| forward.bind_ip.as_str()),
            forward.bind_port,
            forward.proto,
        );
        if let Some(&first) = seen.get(&key) {
            issues.push("port_forwards", at, IssueKind::Duplicate { first });
        } else {
            seen.insert(key, i);
        }
    }
}
