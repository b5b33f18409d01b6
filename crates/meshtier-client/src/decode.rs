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

//! Decoding of the engine's JSON runtime report.
//!
//! Unknown fields are ignored so a newer engine can add to the report.
//! Optional fields decode to `None` rather than a zero value. Any other
//! mismatch fails the whole decode with a [`DecodeError`] naming the field.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use meshtier_types::address;
use meshtier_types::status::{
    Event, NatType, NetworkInstance, NetworkInstanceRunningInfo, NodeInfo, NodeIps, PeerConnInfo,
    PeerConnStats, PeerId, PeerInfo, Route, StunInfo, TunnelInfo,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status report field {field}: {reason}")]
pub struct DecodeError {
    pub field: String,
    pub reason: String,
}

impl DecodeError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn within(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireIpv4Addr {
    addr: u32,
}

impl From<WireIpv4Addr> for Ipv4Addr {
    fn from(w: WireIpv4Addr) -> Self {
        Ipv4Addr::from(w.addr)
    }
}

#[derive(Debug, Deserialize)]
struct WireIpv6Addr {
    part1: u32,
    part2: u32,
    part3: u32,
    part4: u32,
}

impl From<WireIpv6Addr> for Ipv6Addr {
    fn from(w: WireIpv6Addr) -> Self {
        let bits = (u128::from(w.part1) << 96)
            | (u128::from(w.part2) << 64)
            | (u128::from(w.part3) << 32)
            | u128::from(w.part4);
        Ipv6Addr::from(bits)
    }
}

#[derive(Debug, Deserialize)]
struct WireIpv4InetRaw {
    address: WireIpv4Addr,
    network_length: u8,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "WireIpv4InetRaw")]
struct WireIpv4Inet(Ipv4Network);

impl TryFrom<WireIpv4InetRaw> for WireIpv4Inet {
    type Error = String;

    fn try_from(raw: WireIpv4InetRaw) -> Result<Self, String> {
        let len = raw.network_length;
        Ipv4Network::new(raw.address.into(), len)
            .map(Self)
            .map_err(|_| format!("network length {len} out of range"))
    }
}

/// Route addresses arrive either as text or as a structured inet.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRouteAddrRaw {
    Text(String),
    Inet(WireIpv4Inet),
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "WireRouteAddrRaw")]
struct WireRouteAddr(Ipv4Network);

impl TryFrom<WireRouteAddrRaw> for WireRouteAddr {
    type Error = String;

    fn try_from(raw: WireRouteAddrRaw) -> Result<Self, String> {
        match raw {
            WireRouteAddrRaw::Inet(inet) => Ok(Self(inet.0)),
            WireRouteAddrRaw::Text(text) if text.contains('/') => {
                address::parse_cidr(&text).map(Self).map_err(|e| e.to_string())
            }
            WireRouteAddrRaw::Text(text) => address::parse_ipv4(&text)
                .map_err(|e| e.to_string())
                .and_then(|a| Ipv4Network::new(a, 32).map_err(|e| e.to_string()))
                .map(Self),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireUrl {
    Text(String),
    Wrapped { url: String },
}

impl From<WireUrl> for String {
    fn from(w: WireUrl) -> Self {
        match w {
            WireUrl::Text(url) | WireUrl::Wrapped { url } => url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "i64")]
struct WireNatType(NatType);

impl TryFrom<i64> for WireNatType {
    type Error = String;

    fn try_from(tag: i64) -> Result<Self, String> {
        NatType::try_from(tag)
            .map(Self)
            .map_err(|t| format!("nat type tag {t} out of range"))
    }
}

#[derive(Debug, Deserialize)]
struct WireStunInfo {
    udp_nat_type: WireNatType,
    tcp_nat_type: WireNatType,
    last_update_time: f64,
}

impl From<WireStunInfo> for StunInfo {
    fn from(w: WireStunInfo) -> Self {
        Self {
            udp_nat_type: w.udp_nat_type.0,
            tcp_nat_type: w.tcp_nat_type.0,
            last_update_time: w.last_update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireIps {
    public_ipv4: Option<WireIpv4Addr>,
    #[serde(default)]
    interface_ipv4s: Vec<WireIpv4Addr>,
    public_ipv6: Option<WireIpv6Addr>,
    #[serde(default)]
    interface_ipv6s: Vec<WireIpv6Addr>,
}

impl From<WireIps> for NodeIps {
    fn from(w: WireIps) -> Self {
        Self {
            public_ipv4: w.public_ipv4.map(Into::into),
            interface_ipv4s: w.interface_ipv4s.into_iter().map(Into::into).collect(),
            public_ipv6: w.public_ipv6.map(Into::into),
            interface_ipv6s: w.interface_ipv6s.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireNodeInfo {
    virtual_ipv4: Option<WireIpv4Inet>,
    hostname: String,
    version: String,
    ips: Option<WireIps>,
    stun_info: Option<WireStunInfo>,
    #[serde(default)]
    listeners: Vec<WireUrl>,
    vpn_portal_cfg: Option<String>,
}

impl From<WireNodeInfo> for NodeInfo {
    fn from(w: WireNodeInfo) -> Self {
        Self {
            virtual_ipv4: w.virtual_ipv4.map(|v| v.0),
            hostname: w.hostname,
            version: w.version,
            ips: w.ips.map(Into::into),
            stun_info: w.stun_info.map(Into::into),
            listeners: w.listeners.into_iter().map(Into::into).collect(),
            vpn_portal_cfg: w.vpn_portal_cfg,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    peer_id: PeerId,
    ipv4_addr: Option<WireRouteAddr>,
    next_hop_peer_id: PeerId,
    cost: i32,
    #[serde(default)]
    proxy_cidrs: Vec<String>,
    hostname: String,
    stun_info: Option<WireStunInfo>,
    inst_id: String,
    version: String,
}

impl From<WireRoute> for Route {
    fn from(w: WireRoute) -> Self {
        Self {
            peer_id: w.peer_id,
            ipv4_addr: w.ipv4_addr.map(|a| a.0),
            next_hop_peer_id: w.next_hop_peer_id,
            cost: w.cost,
            proxy_cidrs: w.proxy_cidrs,
            hostname: w.hostname,
            stun_info: w.stun_info.map(Into::into),
            inst_id: w.inst_id,
            version: w.version,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTunnelInfo {
    tunnel_type: String,
    local_addr: WireUrl,
    remote_addr: WireUrl,
}

#[derive(Debug, Deserialize)]
struct WirePeerConnStats {
    rx_bytes: u64,
    tx_bytes: u64,
    rx_packets: u64,
    tx_packets: u64,
    latency_us: u64,
}

#[derive(Debug, Deserialize)]
struct WirePeerConnInfo {
    conn_id: String,
    my_peer_id: PeerId,
    is_client: bool,
    peer_id: PeerId,
    #[serde(default)]
    features: Vec<String>,
    tunnel: Option<WireTunnelInfo>,
    stats: Option<WirePeerConnStats>,
    loss_rate: f64,
}

impl From<WirePeerConnInfo> for PeerConnInfo {
    fn from(w: WirePeerConnInfo) -> Self {
        let mut loss_rate = w.loss_rate;
        if !(0.0..=1.0).contains(&loss_rate) {
            warn!(conn_id = %w.conn_id, loss_rate, "loss rate outside [0, 1], clamping");
            loss_rate = if loss_rate.is_nan() {
                0.0
            } else {
                loss_rate.clamp(0.0, 1.0)
            };
        }
        Self {
            conn_id: w.conn_id,
            my_peer_id: w.my_peer_id,
            is_client: w.is_client,
            peer_id: w.peer_id,
            features: w.features,
            tunnel: w.tunnel.map(|t| TunnelInfo {
                tunnel_type: t.tunnel_type,
                local_addr: t.local_addr.into(),
                remote_addr: t.remote_addr.into(),
            }),
            stats: w.stats.map(|s| PeerConnStats {
                rx_bytes: s.rx_bytes,
                tx_bytes: s.tx_bytes,
                rx_packets: s.rx_packets,
                tx_packets: s.tx_packets,
                latency_us: s.latency_us,
            }),
            loss_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePeerInfo {
    peer_id: PeerId,
    #[serde(default)]
    conns: Vec<WirePeerConnInfo>,
}

impl From<WirePeerInfo> for PeerInfo {
    fn from(w: WirePeerInfo) -> Self {
        Self {
            peer_id: w.peer_id,
            conns: w.conns.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| DecodeError::new(field, "expected an object"))
}

/// Deserialize `value`, extending `field` with the path inside it where
/// decoding failed. A missing struct field is named as the last segment.
fn from_value<T: DeserializeOwned>(value: &Value, field: &str) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let mut path = field.to_string();
        let inner = e.path().to_string();
        if inner != "." {
            if !inner.starts_with('[') {
                path.push('.');
            }
            path.push_str(&inner);
        }
        let reason = e.into_inner().to_string();
        if let Some(missing) = missing_field(&reason) {
            path.push('.');
            path.push_str(missing);
        }
        DecodeError::new(path, reason)
    })
}

fn missing_field(reason: &str) -> Option<&str> {
    reason.strip_prefix("missing field `")?.split('`').next()
}

fn required<T: DeserializeOwned>(obj: &Map<String, Value>, field: &str) -> Result<T, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(DecodeError::new(field, "missing")),
        Some(v) => from_value(v, field),
    }
}

fn optional<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<T>, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => from_value(v, field).map(Some),
    }
}

/// Decode a required array element by element so errors point at the index.
fn list<W, T>(obj: &Map<String, Value>, field: &str) -> Result<Vec<T>, DecodeError>
where
    W: DeserializeOwned + Into<T>,
{
    let items = match obj.get(field) {
        None | Some(Value::Null) => return Err(DecodeError::new(field, "missing")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(DecodeError::new(field, "expected an array")),
    };
    items
        .iter()
        .enumerate()
        .map(|(i, v)| from_value::<W>(v, &format!("{field}[{i}]")).map(Into::into))
        .collect()
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

fn event_time(record: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let text = record.get("time")?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// `{"PeerAdded": 123}` carries its tag as the only key; unit events are a
// bare string.
fn event_kind(record: &Map<String, Value>) -> Option<String> {
    match record.get("event")? {
        Value::String(tag) => Some(tag.clone()),
        Value::Object(body) if body.len() == 1 => body.keys().next().cloned(),
        _ => None,
    }
}

fn decode_event(value: &Value, field: &str) -> Result<Event, DecodeError> {
    let (raw, parsed) = match value {
        Value::String(text) => (text.clone(), serde_json::from_str::<Value>(text).ok()),
        Value::Object(_) => (value.to_string(), Some(value.clone())),
        _ => return Err(DecodeError::new(field, "expected a string or an object")),
    };

    let record = parsed.as_ref().and_then(Value::as_object);
    let event = Event {
        time: record.and_then(event_time),
        kind: record.and_then(event_kind),
        raw,
    };
    if event.time.is_none() {
        warn!(field, "event without a readable timestamp");
    }
    Ok(event)
}

fn decode_events(obj: &Map<String, Value>) -> Result<Vec<Event>, DecodeError> {
    match obj.get("events") {
        None | Some(Value::Null) => Err(DecodeError::new("events", "missing")),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| decode_event(v, &format!("events[{i}]")))
            .collect(),
        Some(_) => Err(DecodeError::new("events", "expected an array")),
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode an already parsed report. Route/peer pairs are always rebuilt from
/// the decoded tables; any pairs the engine sent are ignored.
pub fn decode_running_info_value(value: &Value) -> Result<NetworkInstanceRunningInfo, DecodeError> {
    let obj = as_object(value, "$")?;

    let my_node_info: NodeInfo = required::<WireNodeInfo>(obj, "my_node_info")?.into();
    let routes: Vec<Route> = list::<WireRoute, _>(obj, "routes")?;
    let peers: Vec<PeerInfo> = list::<WirePeerInfo, _>(obj, "peers")?;
    let peer_route_pairs = aggregate::pair(&routes, &peers);

    let info = NetworkInstanceRunningInfo {
        dev_name: required(obj, "dev_name")?,
        my_node_info,
        events: decode_events(obj)?,
        routes,
        peers,
        peer_route_pairs,
        running: required(obj, "running")?,
        error_msg: optional(obj, "error_msg")?,
    };

    debug!(
        dev_name = %info.dev_name,
        route_count = info.routes.len(),
        peer_count = info.peers.len(),
        event_count = info.events.len(),
        "decoded running info"
    );
    Ok(info)
}

pub fn decode_running_info(input: &str) -> Result<NetworkInstanceRunningInfo, DecodeError> {
    let value: Value = serde_json::from_str(input).map_err(|e| DecodeError::new("$", e.to_string()))?;
    decode_running_info_value(&value)
}

/// Decode an instance handle. `detail` is `None` until the engine has
/// produced its first report.
pub fn decode_instance(input: &str) -> Result<NetworkInstance, DecodeError> {
    let value: Value = serde_json::from_str(input).map_err(|e| DecodeError::new("$", e.to_string()))?;
    let obj = as_object(&value, "$")?;

    let detail = match obj.get("detail") {
        None | Some(Value::Null) => None,
        Some(v) => Some(decode_running_info_value(v).map_err(|e| e.within("detail"))?),
    };

    Ok(NetworkInstance {
        instance_id: required(obj, "instance_id")?,
        running: required(obj, "running")?,
        error_msg: optional(obj, "error_msg")?.unwrap_or_default(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn sample_report() -> Value {
        json!({
            "dev_name": "utun10",
            "my_node_info": {
                "virtual_ipv4": { "address": { "addr": 177_246_218u32 }, "network_length": 24 },
                "hostname": "my-macbook-pro",
                "version": "0.10.1",
                "ips": {
                    "public_ipv4": { "addr": 134_744_072u32 },
                    "interface_ipv4s": [{ "addr": 3_232_235_876u32 }],
                    "interface_ipv6s": []
                },
                "stun_info": { "udp_nat_type": 3, "tcp_nat_type": 0, "last_update_time": 1_735_560_000.0 },
                "listeners": [{ "url": "tcp://0.0.0.0:11010" }, { "url": "udp://0.0.0.0:11010" }],
                "vpn_portal_cfg": "[Interface]\nAddress = 10.144.144.1/24"
            },
            "events": [
                "{\"time\":\"2025-12-30T12:00:05Z\",\"event\":{\"PeerAdded\":123}}",
                "{\"time\":\"2025-12-30T12:00:00Z\",\"event\":{\"TunDeviceReady\":\"utun10\"}}"
            ],
            "routes": [
                {
                    "peer_id": 123, "ipv4_addr": "10.144.144.11", "next_hop_peer_id": 123, "cost": 1,
                    "proxy_cidrs": [], "hostname": "peer-1-ubuntu",
                    "stun_info": { "udp_nat_type": 1, "tcp_nat_type": 0, "last_update_time": 1_735_559_990.0 },
                    "inst_id": "uuid-1", "version": "0.10.0"
                },
                {
                    "peer_id": 456, "ipv4_addr": "10.144.144.12", "next_hop_peer_id": 789, "cost": 2,
                    "proxy_cidrs": ["192.168.10.0/24"], "hostname": "peer-2-relayed-windows",
                    "inst_id": "uuid-1", "version": "0.9.8"
                }
            ],
            "peers": [{
                "peer_id": 123,
                "conns": [{
                    "conn_id": "conn-1", "my_peer_id": 0, "is_client": true, "peer_id": 123,
                    "features": [],
                    "tunnel": {
                        "tunnel_type": "tcp",
                        "local_addr": { "url": "192.168.1.100:55555" },
                        "remote_addr": { "url": "1.2.3.4:11010" }
                    },
                    "stats": { "rx_bytes": 102400, "tx_bytes": 204800, "rx_packets": 100, "tx_packets": 200, "latency_us": 50000 },
                    "loss_rate": 0.01
                }]
            }],
            "peer_route_pairs": [],
            "running": true
        })
    }

    fn without(mut report: Value, field: &str) -> Value {
        report.as_object_mut().unwrap().remove(field);
        report
    }

    #[test]
    fn decodes_full_report() {
        let info = decode_running_info_value(&sample_report()).unwrap();
        assert_eq!(info.dev_name, "utun10");
        assert!(info.running);
        assert_eq!(info.error_msg, None);

        let node = &info.my_node_info;
        assert_eq!(node.virtual_ipv4.unwrap().to_string(), "10.144.144.10/24");
        let ips = node.ips.as_ref().unwrap();
        assert_eq!(ips.public_ipv4, Some(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(ips.interface_ipv4s, vec![Ipv4Addr::new(192, 168, 1, 100)]);
        assert_eq!(ips.public_ipv6, None);
        assert_eq!(node.stun_info.as_ref().unwrap().udp_nat_type, NatType::FullCone);
        assert_eq!(node.listeners, vec!["tcp://0.0.0.0:11010", "udp://0.0.0.0:11010"]);

        assert_eq!(info.routes.len(), 2);
        assert_eq!(info.routes[0].ipv4_addr.unwrap().to_string(), "10.144.144.11/32");
        assert!(info.routes[1].stun_info.is_none());

        let conn = &info.peers[0].conns[0];
        assert_eq!(conn.tunnel.as_ref().unwrap().remote_addr, "1.2.3.4:11010");
        assert_eq!(conn.stats.unwrap().latency_us, 50_000);

        assert_eq!(info.peer_route_pairs.len(), 2);
        assert!(info.peer_route_pairs[0].peer.is_some());
        assert!(info.peer_route_pairs[1].peer.is_none());
    }

    #[test]
    fn events_keep_raw_body_and_order() {
        let info = decode_running_info_value(&sample_report()).unwrap();
        assert_eq!(info.events[0].kind.as_deref(), Some("PeerAdded"));
        assert_eq!(
            info.events[0].raw,
            "{\"time\":\"2025-12-30T12:00:05Z\",\"event\":{\"PeerAdded\":123}}"
        );
        let sorted: Vec<_> = info
            .events_chronological()
            .iter()
            .map(|e| e.kind.clone().unwrap())
            .collect();
        assert_eq!(sorted, vec!["TunDeviceReady", "PeerAdded"]);
    }

    #[test]
    fn events_as_objects_and_untimed() {
        let mut report = sample_report();
        report["events"] = json!([
            { "time": "2025-12-30T12:00:00+08:00", "event": "Connected" },
            "not json at all"
        ]);
        let info = decode_running_info_value(&report).unwrap();
        assert_eq!(info.events[0].kind.as_deref(), Some("Connected"));
        assert_eq!(info.events[0].time.unwrap().to_rfc3339(), "2025-12-30T04:00:00+00:00");
        assert_eq!(info.events[1].time, None);
        assert_eq!(info.events[1].raw, "not json at all");
    }

    #[test]
    fn event_of_wrong_type_fails() {
        let mut report = sample_report();
        report["events"] = json!([42]);
        let err = decode_running_info_value(&report).unwrap_err();
        assert_eq!(err.field, "events[0]");
    }

    #[test_case("my_node_info" ; "node info")]
    #[test_case("routes" ; "routes")]
    #[test_case("peers" ; "peers")]
    #[test_case("events" ; "events")]
    #[test_case("dev_name" ; "dev name")]
    #[test_case("running" ; "running")]
    fn missing_required_field(field: &str) {
        let err = decode_running_info_value(&without(sample_report(), field)).unwrap_err();
        assert_eq!(err, DecodeError::new(field, "missing"));
    }

    #[test]
    fn missing_node_info_from_text() {
        let text = without(sample_report(), "my_node_info").to_string();
        let err = decode_running_info(&text).unwrap_err();
        assert_eq!(err.field, "my_node_info");
    }

    #[test]
    fn wrong_scalar_type() {
        let mut report = sample_report();
        report["running"] = json!("yes");
        assert_eq!(decode_running_info_value(&report).unwrap_err().field, "running");
    }

    #[test]
    fn error_points_at_route_index() {
        let mut report = sample_report();
        report["routes"][1].as_object_mut().unwrap().remove("cost");
        let err = decode_running_info_value(&report).unwrap_err();
        assert_eq!(err.field, "routes[1].cost");
        assert!(err.reason.contains("cost"), "{}", err.reason);
    }

    #[test]
    fn error_names_missing_nested_field() {
        let mut report = sample_report();
        report["my_node_info"].as_object_mut().unwrap().remove("hostname");
        let err = decode_running_info_value(&report).unwrap_err();
        assert_eq!(err.field, "my_node_info.hostname");
    }

    #[test_case(&["routes", "1", "cost"], json!("two"), "routes[1].cost" ; "route scalar")]
    #[test_case(&["peers", "0", "conns", "0", "loss_rate"], json!("high"), "peers[0].conns[0].loss_rate" ; "nested list")]
    #[test_case(&["my_node_info", "stun_info", "last_update_time"], json!(null), "my_node_info.stun_info.last_update_time" ; "nested object")]
    fn error_names_nested_path(at: &[&str], bad: Value, expected: &str) {
        let mut report = sample_report();
        let mut target = &mut report;
        for key in at {
            target = match key.parse::<usize>() {
                Ok(i) => &mut target[i],
                Err(_) => &mut target[*key],
            };
        }
        *target = bad;
        let err = decode_running_info_value(&report).unwrap_err();
        assert_eq!(err.field, expected);
    }

    #[test]
    fn nat_tag_out_of_range() {
        let mut report = sample_report();
        report["routes"][0]["stun_info"]["udp_nat_type"] = json!(42);
        let err = decode_running_info_value(&report).unwrap_err();
        assert!(err.field.starts_with("routes[0].stun_info"), "{}", err.field);
        assert!(err.reason.contains("nat type tag 42"), "{}", err.reason);
    }

    #[test]
    fn unknown_fields_ignored() {
        let mut report = sample_report();
        report["feature_from_the_future"] = json!({ "x": 1 });
        report["routes"][0]["path_latency"] = json!(12);
        assert!(decode_running_info_value(&report).is_ok());
    }

    #[test]
    fn optional_fields_absent_not_zero() {
        let mut report = sample_report();
        let node = report["my_node_info"].as_object_mut().unwrap();
        node.remove("ips");
        node.remove("stun_info");
        node.remove("vpn_portal_cfg");
        node.insert("virtual_ipv4".into(), Value::Null);
        let info = decode_running_info_value(&report).unwrap();
        assert_eq!(info.my_node_info.ips, None);
        assert_eq!(info.my_node_info.stun_info, None);
        assert_eq!(info.my_node_info.vpn_portal_cfg, None);
        assert_eq!(info.my_node_info.virtual_ipv4, None);
    }

    #[test]
    fn zero_ipv6_is_data() {
        let mut report = sample_report();
        report["my_node_info"]["ips"]["public_ipv6"] =
            json!({ "part1": 0, "part2": 0, "part3": 0, "part4": 0 });
        report["my_node_info"]["ips"]["interface_ipv6s"] =
            json!([{ "part1": 0xfd00_0000u32, "part2": 0, "part3": 0, "part4": 1 }]);
        let info = decode_running_info_value(&report).unwrap();
        let ips = info.my_node_info.ips.unwrap();
        assert_eq!(ips.public_ipv6, Some(Ipv6Addr::UNSPECIFIED));
        assert_eq!(ips.interface_ipv6s[0].to_string(), "fd00::1");
    }

    #[test]
    fn structured_route_address() {
        let mut report = sample_report();
        report["routes"][0]["ipv4_addr"] =
            json!({ "address": { "addr": 177_246_219u32 }, "network_length": 24 });
        let info = decode_running_info_value(&report).unwrap();
        assert_eq!(info.routes[0].ipv4_addr.unwrap().to_string(), "10.144.144.11/24");
    }

    #[test]
    fn loss_rate_clamped() {
        let mut report = sample_report();
        report["peers"][0]["conns"][0]["loss_rate"] = json!(1.7);
        let info = decode_running_info_value(&report).unwrap();
        assert_eq!(info.peers[0].conns[0].loss_rate, 1.0);
    }

    #[test]
    fn engine_pairs_are_rebuilt() {
        let mut report = sample_report();
        report["peer_route_pairs"] = json!("garbage from an old engine");
        let info = decode_running_info_value(&report).unwrap();
        assert_eq!(info.peer_route_pairs.len(), 2);
    }

    #[test]
    fn syntax_error() {
        let err = decode_running_info("{ not json").unwrap_err();
        assert_eq!(err.field, "$");
    }

    #[test]
    fn instance_without_detail() {
        let inst =
            decode_instance(r#"{"instance_id":"uuid-1","running":false,"error_msg":""}"#).unwrap();
        assert_eq!(inst.instance_id, "uuid-1");
        assert!(inst.detail.is_none());
        assert_eq!(inst.error(), None);
    }

    #[test]
    fn instance_with_detail() {
        let text = json!({
            "instance_id": "uuid-1",
            "running": true,
            "error_msg": "",
            "detail": sample_report()
        })
        .to_string();
        let inst = decode_instance(&text).unwrap();
        assert_eq!(inst.detail.unwrap().routes.len(), 2);
    }

    #[test]
    fn instance_detail_error_is_prefixed() {
        let text = json!({
            "instance_id": "uuid-1",
            "running": true,
            "detail": without(sample_report(), "my_node_info")
        })
        .to_string();
        assert_eq!(decode_instance(&text).unwrap_err().field, "detail.my_node_info");
    }
}
