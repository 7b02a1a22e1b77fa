//! Wire-format topology to the internal model
//!
//! The collector reports nodes by address with a packet counter and edges as
//! (source address, target address, weight). Edges naming an address that is
//! not in the node list are dropped: node and edge enumeration are not taken
//! atomically upstream, and a transient mismatch must never break a frame.

use super::{NetworkLink, NetworkNode, NodeStatus, Role, TopologyData};
use crate::geo::synth::coords_for_address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub ip: String,
    #[serde(default)]
    pub packets: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: f64,
}

/// Body of `GET /api/topology`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyResponse {
    #[serde(default)]
    pub nodes: Vec<WireNode>,
    #[serde(default)]
    pub edges: Vec<WireEdge>,
    #[serde(default)]
    pub timestamp: f64,
}

/// Stable internal id for an address. Distinct addresses get distinct ids.
pub fn node_id(address: &str) -> String {
    format!("ip:{address}")
}

/// Classify by the last dotted component: `1` is a router, `0` or anything
/// above 200 a server, everything else (including unparsable) a client.
pub fn infer_role(address: &str) -> Role {
    let last = address
        .rsplit('.')
        .next()
        .and_then(|part| part.trim().parse::<u32>().ok());
    match last {
        Some(1) => Role::Router,
        Some(0) => Role::Server,
        Some(n) if n > 200 => Role::Server,
        _ => Role::Client,
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Build internal topology. Node order follows first appearance; resolved
/// edges keep their input order.
pub fn adapt(response: &TopologyResponse) -> TopologyData {
    let mut seen = HashSet::new();
    let nodes: Vec<NetworkNode> = response
        .nodes
        .iter()
        .filter(|wire| seen.insert(wire.ip.as_str()))
        .map(|wire| NetworkNode {
            id: node_id(&wire.ip),
            name: wire.ip.clone(),
            address: wire.ip.clone(),
            role: infer_role(&wire.ip),
            position: coords_for_address(&wire.ip),
            status: if sanitize(wire.packets) > 0.0 {
                NodeStatus::Active
            } else {
                NodeStatus::Idle
            },
        })
        .collect();

    let ids: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.address.as_str(), n.id.as_str()))
        .collect();

    let links = response
        .edges
        .iter()
        .filter_map(|edge| {
            let source = ids.get(edge.source.as_str())?;
            let target = ids.get(edge.target.as_str())?;
            Some(NetworkLink {
                source: (*source).to_string(),
                target: (*target).to_string(),
                traffic: sanitize(edge.weight),
            })
        })
        .collect();

    TopologyData { nodes, links }
}
