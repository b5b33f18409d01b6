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

//! Descriptor table for the boolean feature flags of a [`NetworkProfile`].
//! Editors iterate [`FeatureFlag::ALL`] instead of naming each field.

use crate::profile::NetworkProfile;

macro_rules! feature_flags {
    ($( $variant:ident => $field:ident, $label:expr, $help:expr; )+) => {
        /// One boolean toggle on a profile.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum FeatureFlag {
            $( $variant, )+
        }

        impl FeatureFlag {
            /// Every flag, in display order.
            pub const ALL: &'static [FeatureFlag] = &[ $( FeatureFlag::$variant, )+ ];

            /// Profile field name, as used by the engine.
            pub fn key(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($field), )+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }

            pub fn help(self) -> &'static str {
                match self {
                    $( Self::$variant => $help, )+
                }
            }

            pub fn get(self, profile: &NetworkProfile) -> bool {
                match self {
                    $( Self::$variant => profile.$field, )+
                }
            }

            pub fn set(self, profile: &mut NetworkProfile, value: bool) {
                match self {
                    $( Self::$variant => profile.$field = value, )+
                }
            }
        }
    };
}

feature_flags! {
    LatencyFirst => latency_first,
        "Latency-First Mode",
        "Ignore hop count and select the path with the lowest total latency.";
    UseSmoltcp => use_smoltcp,
        "Use User-Space Protocol Stack",
        "Use a user-space TCP/IP stack to avoid issues with OS firewalls.";
    DisableIpv6 => disable_ipv6,
        "Disable IPv6",
        "Disable IPv6 functionality for this node.";
    EnableKcpProxy => enable_kcp_proxy,
        "Enable KCP Proxy",
        "Convert TCP traffic to KCP to reduce latency.";
    DisableKcpInput => disable_kcp_input,
        "Disable KCP Input",
        "Disable inbound KCP traffic.";
    EnableQuicProxy => enable_quic_proxy,
        "Enable QUIC Proxy",
        "Convert TCP traffic to QUIC to reduce latency.";
    DisableQuicInput => disable_quic_input,
        "Disable QUIC Input",
        "Disable inbound QUIC traffic.";
    DisableP2p => disable_p2p,
        "Disable P2P",
        "Route all traffic through a manually specified relay server.";
    P2pOnly => p2p_only,
        "P2P Only",
        "Only communicate with peers that have established P2P connections.";
    BindDevice => bind_device,
        "Bind to Physical Device Only",
        "Use only the physical network interface.";
    NoTun => no_tun,
        "No TUN Mode",
        "Do not use a TUN interface. This node will be accessible but cannot initiate connections to others without SOCKS5.";
    EnableExitNode => enable_exit_node,
        "Enable Exit Node",
        "Allow this node to be an exit node.";
    RelayAllPeerRpc => relay_all_peer_rpc,
        "Relay All Peer RPC",
        "Relay all peer RPC packets, even for peers not in the whitelist.";
    MultiThread => multi_thread,
        "Multi-Threaded Runtime",
        "Use a multi-thread runtime for performance.";
    ProxyForwardBySystem => proxy_forward_by_system,
        "System Forwarding for Proxy",
        "Forward packets to proxy networks via the system kernel.";
    DisableEncryption => disable_encryption,
        "Disable Encryption",
        "Disable encryption for peer communication. Must be the same on all peers.";
    DisableUdpHolePunching => disable_udp_hole_punching,
        "Disable UDP Hole Punching",
        "Disable the UDP hole punching mechanism.";
    DisableSymHolePunching => disable_sym_hole_punching,
        "Disable Symmetric NAT Hole Punching",
        "Disable special handling for symmetric NATs.";
    EnableMagicDns => enable_magic_dns,
        "Enable Magic DNS",
        "Access nodes in the network by their hostname via a special DNS.";
    EnablePrivateMode => enable_private_mode,
        "Enable Private Mode",
        "Do not allow handshake or relay for nodes with a different network name or secret.";
}

impl FeatureFlag {
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test]
    fn table_covers_twenty_unique_fields() {
        let keys: HashSet<_> = FeatureFlag::ALL.iter().map(|f| f.key()).collect();
        assert_eq!(FeatureFlag::ALL.len(), 20);
        assert_eq!(keys.len(), 20);
    }

    #[test_case("p2p_only", FeatureFlag::P2pOnly ; "p2p only")]
    #[test_case("disable_encryption", FeatureFlag::DisableEncryption ; "encryption")]
    #[test_case("enable_magic_dns", FeatureFlag::EnableMagicDns ; "magic dns")]
    fn from_key_resolves(key: &str, flag: FeatureFlag) {
        assert_eq!(FeatureFlag::from_key(key), Some(flag));
    }

    #[test]
    fn from_key_unknown() {
        assert_eq!(FeatureFlag::from_key("dhcp"), None);
    }

    #[test]
    fn accessors_touch_only_their_field() {
        for &flag in FeatureFlag::ALL {
            let mut profile = NetworkProfile::default();
            flag.set(&mut profile, true);
            assert!(flag.get(&profile));
            let others_set = FeatureFlag::ALL
                .iter()
                .filter(|f| **f != flag)
                .any(|f| f.get(&profile));
            assert!(!others_set, "{} leaked into another flag", flag.key());
        }
    }
}
