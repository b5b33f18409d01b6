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

use std::collections::{HashMap, HashSet};

use meshtier_types::status::{PeerId, PeerInfo, PeerRoutePair, Route};
use tracing::{debug, warn};

fn index_peers(peers: &[PeerInfo]) -> HashMap<PeerId, &PeerInfo> {
    let mut index = HashMap::with_capacity(peers.len());
    for peer in peers {
        // Last write wins. The engine is expected to report each peer once.
        if index.insert(peer.peer_id, peer).is_some() {
            warn!(peer_id = peer.peer_id, "duplicate peer id in report");
        }
    }
    index
}

/// Join each route with the peer that has the same `peer_id`.
///
/// Produces exactly one pair per route, in route order. Routes whose peer
/// has no connection yet get `peer: None`. Peers without a route do not
/// appear here; see [`unpaired_peers`].
pub fn pair(routes: &[Route], peers: &[PeerInfo]) -> Vec<PeerRoutePair> {
    let index = index_peers(peers);

    let pairs: Vec<PeerRoutePair> = routes
        .iter()
        .map(|route| PeerRoutePair {
            route: route.clone(),
            peer: index.get(&route.peer_id).map(|p| (*p).clone()),
        })
        .collect();

    debug!(
        route_count = routes.len(),
        peer_count = peers.len(),
        paired = pairs.iter().filter(|p| p.peer.is_some()).count(),
        "paired routes with peers"
    );
    pairs
}

/// Peers that no route refers to, in peer table order.
pub fn unpaired_peers<'a>(routes: &[Route], peers: &'a [PeerInfo]) -> Vec<&'a PeerInfo> {
    let routed: HashSet<PeerId> = routes.iter().map(|r| r.peer_id).collect();
    peers.iter().filter(|p| !routed.contains(&p.peer_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshtier_types::status::PeerConnInfo;

    fn route(peer_id: PeerId) -> Route {
        Route {
            peer_id,
            ipv4_addr: None,
            next_hop_peer_id: peer_id,
            cost: 1,
            proxy_cidrs: vec![],
            hostname: format!("peer-{peer_id}"),
            stun_info: None,
            inst_id: "inst".into(),
            version: "0.10.0".into(),
        }
    }

    fn peer(peer_id: PeerId, conn_ids: &[&str]) -> PeerInfo {
        PeerInfo {
            peer_id,
            conns: conn_ids
                .iter()
                .map(|id| PeerConnInfo {
                    conn_id: id.to_string(),
                    my_peer_id: 100,
                    is_client: true,
                    peer_id,
                    features: vec![],
                    tunnel: None,
                    stats: None,
                    loss_rate: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn keeps_unmatched_routes() {
        let pairs = pair(&[route(1), route(2)], &[peer(1, &["a"])]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].route.peer_id, 1);
        assert_eq!(pairs[0].peer.as_ref().unwrap().peer_id, 1);
        assert_eq!(pairs[1].route.peer_id, 2);
        assert!(pairs[1].peer.is_none());
    }

    #[test]
    fn preserves_route_order() {
        let routes = [route(5), route(3), route(9)];
        let peers = [peer(9, &["x"]), peer(3, &["y"]), peer(5, &["z"])];
        let ids: Vec<_> = pair(&routes, &peers).iter().map(|p| p.route.peer_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn duplicate_peer_ids_last_wins() {
        let pairs = pair(&[route(1)], &[peer(1, &["first"]), peer(1, &["second"])]);
        assert_eq!(pairs[0].peer.as_ref().unwrap().conns[0].conn_id, "second");
    }

    #[test]
    fn empty_inputs() {
        assert!(pair(&[], &[peer(1, &[])]).is_empty());
        let pairs = pair(&[route(1)], &[]);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].peer.is_none());
    }

    #[test]
    fn unpaired_peers_are_reported() {
        let peers = [peer(1, &[]), peer(7, &[]), peer(8, &[])];
        let routes = [route(1), route(2)];
        let unpaired: Vec<_> = unpaired_peers(&routes, &peers).iter().map(|p| p.peer_id).collect();
        assert_eq!(unpaired, vec![7, 8]);
    }
}
