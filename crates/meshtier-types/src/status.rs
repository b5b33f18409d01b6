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

//! Live status of a running node as reported by the engine.
//!
//! Values here are built once per report and never mutated; a new report
//! replaces the whole tree.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use serde::Serialize;

pub type PeerId = u32;

/// A network instance handle, with its report once the engine produced one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInstance {
    pub instance_id: String,
    pub running: bool,
    pub error_msg: String,
    pub detail: Option<NetworkInstanceRunningInfo>,
}

impl NetworkInstance {
    pub fn error(&self) -> Option<&str> {
        Some(self.error_msg.as_str()).filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInstanceRunningInfo {
    pub dev_name: String,
    pub my_node_info: NodeInfo,
    pub events: Vec<Event>,
    pub routes: Vec<Route>,
    pub peers: Vec<PeerInfo>,
    pub peer_route_pairs: Vec<PeerRoutePair>,
    pub running: bool,
    pub error_msg: Option<String>,
}

impl NetworkInstanceRunningInfo {
    /// Events sorted by timestamp. Undated events keep their relative order
    /// and sort after dated ones.
    pub fn events_chronological(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().collect();
        events.sort_by_key(|e| (e.time.is_none(), e.time));
        events
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub virtual_ipv4: Option<Ipv4Network>,
    pub hostname: String,
    pub version: String,
    pub ips: Option<NodeIps>,
    pub stun_info: Option<StunInfo>,
    pub listeners: Vec<String>,
    pub vpn_portal_cfg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeIps {
    pub public_ipv4: Option<Ipv4Addr>,
    pub interface_ipv4s: Vec<Ipv4Addr>,
    pub public_ipv6: Option<Ipv6Addr>,
    pub interface_ipv6s: Vec<Ipv6Addr>,
}

/// NAT classification from STUN probing. Tags match the engine's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NatType {
    Unknown,
    OpenInternet,
    NoPat,
    FullCone,
    Restricted,
    PortRestricted,
    Symmetric,
    SymUdpFirewall,
    SymmetricEasyInc,
    SymmetricEasyDec,
}

impl NatType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::OpenInternet => "Open Internet",
            Self::NoPat => "No PAT",
            Self::FullCone => "Full Cone",
            Self::Restricted => "Restricted",
            Self::PortRestricted => "Port Restricted",
            Self::Symmetric => "Symmetric",
            Self::SymUdpFirewall => "Symmetric UDP Firewall",
            Self::SymmetricEasyInc => "Symmetric Easy Inc",
            Self::SymmetricEasyDec => "Symmetric Easy Dec",
        }
    }
}

impl TryFrom<i64> for NatType {
    type Error = i64;

    fn try_from(tag: i64) -> Result<Self, i64> {
        Ok(match tag {
            0 => Self::Unknown,
            1 => Self::OpenInternet,
            2 => Self::NoPat,
            3 => Self::FullCone,
            4 => Self::Restricted,
            5 => Self::PortRestricted,
            6 => Self::Symmetric,
            7 => Self::SymUdpFirewall,
            8 => Self::SymmetricEasyInc,
            9 => Self::SymmetricEasyDec,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StunInfo {
    pub udp_nat_type: NatType,
    pub tcp_nat_type: NatType,
    /// Seconds since the Unix epoch.
    pub last_update_time: f64,
}

impl StunInfo {
    /// `None` when the stamp is not finite or outside chrono's range.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let t = self.last_update_time;
        if !t.is_finite() {
            return None;
        }
        let secs = t.floor();
        let nanos = (((t - secs) * 1e9) as u32).min(999_999_999);
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// One entry of the route table. `peer_id` joins against the peer table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub peer_id: PeerId,
    pub ipv4_addr: Option<Ipv4Network>,
    pub next_hop_peer_id: PeerId,
    pub cost: i32,
    pub proxy_cidrs: Vec<String>,
    pub hostname: String,
    pub stun_info: Option<StunInfo>,
    pub inst_id: String,
    pub version: String,
}

impl Route {
    /// Cost 0 is the reporting node itself.
    pub fn is_local(&self) -> bool {
        self.cost == 0
    }

    /// Reached without a relay.
    pub fn is_direct(&self) -> bool {
        self.peer_id == self.next_hop_peer_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub conns: Vec<PeerConnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerConnInfo {
    pub conn_id: String,
    pub my_peer_id: PeerId,
    pub is_client: bool,
    pub peer_id: PeerId,
    pub features: Vec<String>,
    pub tunnel: Option<TunnelInfo>,
    pub stats: Option<PeerConnStats>,
    /// In `[0, 1]`.
    pub loss_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelInfo {
    pub tunnel_type: String,
    pub local_addr: String,
    pub remote_addr: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeerConnStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub latency_us: u64,
}

/// A route joined with the peer of the same id, if connected yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRoutePair {
    pub route: Route,
    pub peer: Option<PeerInfo>,
}

impl PeerRoutePair {
    fn stats(&self) -> impl Iterator<Item = &PeerConnStats> {
        self.peer
            .iter()
            .flat_map(|p| p.conns.iter())
            .filter_map(|c| c.stats.as_ref())
    }

    /// Lowest latency across this peer's connections.
    pub fn latency_us(&self) -> Option<u64> {
        self.stats().map(|s| s.latency_us).min()
    }

    /// Mean loss rate across connections.
    pub fn loss_rate(&self) -> Option<f64> {
        let conns = &self.peer.as_ref()?.conns;
        if conns.is_empty() {
            return None;
        }
        Some(conns.iter().map(|c| c.loss_rate).sum::<f64>() / conns.len() as f64)
    }

    pub fn rx_bytes(&self) -> u64 {
        self.stats().map(|s| s.rx_bytes).sum()
    }

    pub fn tx_bytes(&self) -> u64 {
        self.stats().map(|s| s.tx_bytes).sum()
    }

    /// Distinct tunnel types in connection order.
    pub fn tunnel_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        let tunnels = self
            .peer
            .iter()
            .flat_map(|p| p.conns.iter())
            .filter_map(|c| c.tunnel.as_ref());
        for tunnel in tunnels {
            if !types.contains(&tunnel.tunnel_type.as_str()) {
                types.push(&tunnel.tunnel_type);
            }
        }
        types
    }
}

/// One entry of the engine's event log. Only the timestamp and the event
/// tag are interpreted; `raw` is the record exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub time: Option<DateTime<Utc>>,
    pub kind: Option<String>,
    pub raw: String,
}
