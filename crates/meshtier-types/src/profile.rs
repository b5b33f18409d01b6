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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MTU the engine applies when `mtu` is unset and encryption is on.
pub const DEFAULT_MTU_ENCRYPTED: i32 = 1380;
/// MTU the engine applies when `mtu` is unset and encryption is off.
pub const DEFAULT_MTU_UNENCRYPTED: i32 = 1360;

/// How the node discovers the rest of the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkingMethod {
    /// Bootstrap through `public_server_url`.
    #[default]
    PublicServer,
    /// Connect to the endpoints listed in `peer_urls`.
    Manual,
    /// Wait for inbound connections only.
    Standalone,
}

impl NetworkingMethod {
    pub const ALL: [NetworkingMethod; 3] = [Self::PublicServer, Self::Manual, Self::Standalone];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortForwardProto {
    #[default]
    Tcp,
    Udp,
}

/// A single `bind_ip:bind_port -> dst_ip:dst_port` forward.
///
/// `id` is a local handle for edits and removal. It is not part of the
/// persisted form and is regenerated whenever the entry is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForwardConfig {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub bind_ip: String,
    #[serde(default)]
    pub bind_port: i32,
    #[serde(default)]
    pub dst_ip: String,
    #[serde(default)]
    pub dst_port: i32,
    #[serde(default)]
    pub proto: PortForwardProto,
}

impl Default for PortForwardConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            bind_ip: String::new(),
            bind_port: 0,
            dst_ip: String::new(),
            dst_port: 0,
            proto: PortForwardProto::Tcp,
        }
    }
}

/// Full configuration of one node. Every field carries a default so a new
/// profile is complete before any edit, and a stored profile missing newer
/// fields still loads.
///
/// Field names are shared with the engine and must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkProfile {
    pub id: Uuid,

    pub dhcp: bool,
    pub virtual_ipv4: String,
    pub network_length: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub network_name: String,
    pub network_secret: String,

    pub networking_method: NetworkingMethod,
    pub public_server_url: String,
    pub peer_urls: Vec<String>,

    pub proxy_cidrs: Vec<String>,

    pub enable_vpn_portal: bool,
    pub vpn_portal_listen_port: i32,
    pub vpn_portal_client_network_addr: String,
    pub vpn_portal_client_network_len: i32,

    /// Editor hint only; the engine ignores it.
    pub advanced_settings: bool,

    /// Ordered by priority.
    pub listener_urls: Vec<String>,
    pub mapped_listeners: Vec<String>,
    pub dev_name: String,

    pub latency_first: bool,
    pub use_smoltcp: bool,
    pub disable_ipv6: bool,
    pub enable_kcp_proxy: bool,
    pub disable_kcp_input: bool,
    pub enable_quic_proxy: bool,
    pub disable_quic_input: bool,
    pub disable_p2p: bool,
    pub p2p_only: bool,
    pub bind_device: bool,
    pub no_tun: bool,
    pub enable_exit_node: bool,
    pub relay_all_peer_rpc: bool,
    pub multi_thread: bool,
    pub proxy_forward_by_system: bool,
    pub disable_encryption: bool,
    pub disable_udp_hole_punching: bool,
    pub disable_sym_hole_punching: bool,
    pub enable_magic_dns: bool,
    pub enable_private_mode: bool,

    pub enable_relay_network_whitelist: bool,
    pub relay_network_whitelist: Vec<String>,

    pub enable_manual_routes: bool,
    pub routes: Vec<String>,

    pub exit_nodes: Vec<String>,

    pub enable_socks5: bool,
    pub socks5_port: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,

    pub port_forwards: Vec<PortForwardConfig>,
}

impl NetworkProfile {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            dhcp: true,
            virtual_ipv4: "10.144.144.0".into(),
            network_length: 24,
            hostname: None,
            network_name: "default".into(),
            network_secret: String::new(),
            networking_method: NetworkingMethod::PublicServer,
            public_server_url: "https://api.example.com".into(),
            peer_urls: Vec::new(),
            proxy_cidrs: Vec::new(),
            enable_vpn_portal: false,
            vpn_portal_listen_port: 22022,
            vpn_portal_client_network_addr: "10.144.144.0".into(),
            vpn_portal_client_network_len: 24,
            advanced_settings: false,
            listener_urls: vec![
                "tcp://0.0.0.0:11010".into(),
                "udp://0.0.0.0:11010".into(),
                "wg://0.0.0.0:11011".into(),
            ],
            mapped_listeners: Vec::new(),
            dev_name: "utun10".into(),
            latency_first: false,
            use_smoltcp: false,
            disable_ipv6: false,
            enable_kcp_proxy: false,
            disable_kcp_input: false,
            enable_quic_proxy: false,
            disable_quic_input: false,
            disable_p2p: false,
            p2p_only: false,
            bind_device: false,
            no_tun: false,
            enable_exit_node: false,
            relay_all_peer_rpc: false,
            multi_thread: false,
            proxy_forward_by_system: false,
            disable_encryption: false,
            disable_udp_hole_punching: false,
            disable_sym_hole_punching: false,
            enable_magic_dns: false,
            enable_private_mode: false,
            enable_relay_network_whitelist: false,
            relay_network_whitelist: Vec::new(),
            enable_manual_routes: false,
            routes: Vec::new(),
            exit_nodes: Vec::new(),
            enable_socks5: false,
            socks5_port: 1080,
            mtu: None,
            port_forwards: Vec::new(),
        }
    }

    /// MTU the engine will actually use.
    pub fn effective_mtu(&self) -> i32 {
        match self.mtu {
            Some(mtu) => mtu,
            None if self.disable_encryption => DEFAULT_MTU_UNENCRYPTED,
            None => DEFAULT_MTU_ENCRYPTED,
        }
    }

    /// Append a blank forward and return its handle.
    pub fn add_port_forward(&mut self) -> Uuid {
        let forward = PortForwardConfig::default();
        let id = forward.id;
        self.port_forwards.push(forward);
        id
    }

    pub fn port_forward_mut(&mut self, id: Uuid) -> Option<&mut PortForwardConfig> {
        self.port_forwards.iter_mut().find(|f| f.id == id)
    }

    /// Remove the forward with this handle. Returns whether one was removed.
    pub fn remove_port_forward(&mut self, id: Uuid) -> bool {
        let before = self.port_forwards.len();
        self.port_forwards.retain(|f| f.id != id);
        self.port_forwards.len() != before
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// A named profile as listed to the user. The name can change freely; the
/// id is shared with the inner profile and never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub profile: NetworkProfile,
}

impl ProfileSummary {
    pub fn new(name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            profile: NetworkProfile::new(id),
        }
    }
}
