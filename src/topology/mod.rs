//! Network topology model
//!
//! Nodes carry a role, a status and a geographic position; links reference
//! nodes by id and carry a traffic intensity. A `TopologyData` value is
//! always replaced wholesale, never patched.

pub mod adapter;
pub mod capture;
pub mod source;

use crate::geo::GeoPoint;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Router,
    Server,
    Client,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Router => "Router",
            Role::Server => "Server",
            Role::Client => "Client",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeStatus {
    Active,
    Idle,
    Warning,
}

impl NodeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Idle => "idle",
            NodeStatus::Warning => "warning",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    pub address: String,
    pub role: Role,
    pub position: GeoPoint,
    pub status: NodeStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    /// Zero means idle: no packets flow.
    pub traffic: f64,
}

impl NetworkLink {
    pub fn is_active(&self) -> bool {
        self.traffic > 0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TopologyData {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

/// Headline numbers for the status bar and the `stats` command
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TopologyStats {
    pub total_nodes: usize,
    pub active_connections: usize,
    pub total_packets: f64,
}

impl TopologyData {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            total_nodes: self.nodes.len(),
            active_connections: self.links.iter().filter(|l| l.is_active()).count(),
            total_packets: self.links.iter().map(|l| l.traffic).sum(),
        }
    }
}

// ============================================================================
// Demo data
// ============================================================================

/// (id, name, address, role, lat, lon, status)
const DEMO_NODES: [(&str, &str, &str, Role, f64, f64, NodeStatus); 12] = [
    ("n1", "Stanford Server", "10.144.1.0", Role::Server, 37.4275, -122.1697, NodeStatus::Active),
    ("n2", "Boston Router", "10.144.2.1", Role::Router, 42.3601, -71.0942, NodeStatus::Active),
    ("n3", "London Router", "10.144.3.1", Role::Router, 51.5074, -0.1278, NodeStatus::Active),
    ("n4", "Frankfurt Client", "10.144.3.17", Role::Client, 50.1109, 8.6821, NodeStatus::Idle),
    ("n5", "Tokyo Server", "10.144.5.250", Role::Server, 35.6762, 139.6503, NodeStatus::Active),
    ("n6", "Singapore Router", "10.144.6.1", Role::Router, 1.3521, 103.8198, NodeStatus::Active),
    ("n7", "Sydney Client", "10.144.6.42", Role::Client, -33.8688, 151.2093, NodeStatus::Active),
    ("n8", "Sao Paulo Client", "10.144.8.23", Role::Client, -23.5505, -46.6333, NodeStatus::Idle),
    ("n9", "Mumbai Server", "10.144.9.0", Role::Server, 19.0760, 72.8777, NodeStatus::Active),
    ("n10", "Cape Town Client", "10.144.3.88", Role::Client, -33.9249, 18.4241, NodeStatus::Warning),
    ("n11", "Toronto Client", "10.144.2.54", Role::Client, 43.6532, -79.3832, NodeStatus::Active),
    ("n12", "Seoul Router", "10.144.12.1", Role::Router, 37.5665, 126.9780, NodeStatus::Active),
];

const DEMO_LINKS: [(&str, &str, f64); 13] = [
    ("n1", "n2", 120.0),
    ("n2", "n3", 85.0),
    ("n3", "n4", 0.0),
    ("n3", "n9", 60.0),
    ("n5", "n6", 150.0),
    ("n6", "n7", 45.0),
    ("n1", "n5", 200.0),
    ("n9", "n6", 30.0),
    ("n2", "n11", 20.0),
    ("n8", "n1", 0.0),
    ("n10", "n3", 10.0),
    ("n12", "n5", 95.0),
    ("n8", "n2", 40.0),
];

/// Seed topology shown until the first successful refresh.
pub fn demo_topology() -> TopologyData {
    let nodes = DEMO_NODES
        .iter()
        .map(|&(id, name, address, role, lat, lon, status)| NetworkNode {
            id: id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            role,
            position: GeoPoint::new(lon, lat),
            status,
        })
        .collect();
    let links = DEMO_LINKS
        .iter()
        .map(|&(source, target, traffic)| NetworkLink {
            source: source.to_string(),
            target: target.to_string(),
            traffic,
        })
        .collect();
    TopologyData { nodes, links }
}
