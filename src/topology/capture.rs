//! Packet-capture aggregation
//!
//! Turns a stream of capture lines (tcpdump output or router debug traces)
//! into the same `{nodes, edges, timestamp}` document the topology service
//! serves, so piped captures reuse the regular adapt path.

use super::adapter::{TopologyResponse, WireEdge, WireNode};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Arc, LazyLock, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds without traffic before a node or edge drops out of snapshots.
pub const STALE_SECS: f64 = 30.0;

static TCPDUMP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"IP (\d+\.\d+\.\d+\.\d+)\.\d+ > (\d+\.\d+\.\d+\.\d+)\.\d+:").ok()
});

static ROUTER_DEBUG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"IPv4: (\d+\.\d+\.\d+\.\d+) -> (\d+\.\d+\.\d+\.\d+)").ok());

pub type SharedAggregator = Arc<Mutex<TrafficAggregator>>;

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Source and destination address of one observed packet.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let pattern = if line.starts_with("DEBUG:") {
        ROUTER_DEBUG.as_ref()?
    } else {
        TCPDUMP.as_ref()?
    };
    let caps = pattern.captures(line)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

#[derive(Clone, Debug)]
struct HostStats {
    first_seen: f64,
    last_seen: f64,
    packets: u64,
}

#[derive(Clone, Debug)]
struct EdgeStats {
    count: u64,
    last_active: f64,
}

/// Running counters, kept in first-seen order.
#[derive(Debug, Default)]
pub struct TrafficAggregator {
    hosts: Vec<(String, HostStats)>,
    host_index: HashMap<String, usize>,
    edges: Vec<((String, String), EdgeStats)>,
    edge_index: HashMap<(String, String), usize>,
}

impl TrafficAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedAggregator {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record(&mut self, src: &str, dst: &str, now: f64) {
        for addr in [src, dst] {
            let idx = match self.host_index.get(addr) {
                Some(&idx) => idx,
                None => {
                    self.hosts.push((
                        addr.to_string(),
                        HostStats { first_seen: now, last_seen: now, packets: 0 },
                    ));
                    self.host_index.insert(addr.to_string(), self.hosts.len() - 1);
                    self.hosts.len() - 1
                }
            };
            let host = &mut self.hosts[idx].1;
            host.last_seen = now;
            host.packets += 1;
        }

        let key = (src.to_string(), dst.to_string());
        let idx = match self.edge_index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.edges.push((key.clone(), EdgeStats { count: 0, last_active: now }));
                self.edge_index.insert(key, self.edges.len() - 1);
                self.edges.len() - 1
            }
        };
        let edge = &mut self.edges[idx].1;
        edge.count += 1;
        edge.last_active = now;
    }

    /// Parse and record one capture line; returns whether it matched.
    pub fn ingest(&mut self, line: &str, now: f64) -> bool {
        match parse_line(line) {
            Some((src, dst)) => {
                self.record(&src, &dst, now);
                true
            }
            None => false,
        }
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Hosts and edges seen within the stale window.
    pub fn snapshot(&self, now: f64) -> TopologyResponse {
        let mut live: Vec<&(String, HostStats)> = self
            .hosts
            .iter()
            .filter(|(_, h)| now - h.last_seen < STALE_SECS)
            .collect();
        live.sort_by(|a, b| a.1.first_seen.total_cmp(&b.1.first_seen));
        let nodes = live
            .into_iter()
            .map(|(ip, h)| WireNode { ip: ip.clone(), packets: h.packets as f64 })
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(_, e)| now - e.last_active < STALE_SECS)
            .map(|((source, target), e)| WireEdge {
                source: source.clone(),
                target: target.clone(),
                weight: e.count as f64,
            })
            .collect();
        TopologyResponse { nodes, edges, timestamp: now }
    }
}

/// Feed `reader` line by line into `aggregator` on a background thread.
pub fn spawn_reader<R>(reader: R, aggregator: SharedAggregator) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut matched = 0u64;
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("capture input error: {e}");
                    break;
                }
            };
            let Ok(mut guard) = aggregator.lock() else {
                warn!("capture aggregator poisoned, reader stopping");
                break;
            };
            if guard.ingest(&line, unix_now()) {
                matched += 1;
            } else {
                debug!("ignored capture line: {line}");
            }
        }
        let hosts = aggregator.lock().map(|guard| guard.host_count()).unwrap_or(0);
        info!("capture input closed after {matched} packets from {hosts} hosts");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn parses_tcpdump() {
        let line = "12:00:01.123456 IP 10.144.1.2.51234 > 10.144.1.1.443: Flags [S], seq 1";
        assert_eq!(
            parse_line(line),
            Some(("10.144.1.2".to_string(), "10.144.1.1".to_string()))
        );
    }

    #[test]
    fn parses_router_debug() {
        let line = "DEBUG: dst=aa src=bb type=IPv4 IPv4: 80.6.5.4 -> 50.9.8.7";
        assert_eq!(
            parse_line(line),
            Some(("80.6.5.4".to_string(), "50.9.8.7".to_string()))
        );
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("listening on tun0, link-type RAW"), None);
        assert_eq!(parse_line("DEBUG: type=ARP"), None);
    }

    #[test]
    fn record_counts_both_endpoints() {
        let mut agg = TrafficAggregator::new();
        agg.record("10.0.0.1", "10.0.0.2", 100.0);
        agg.record("10.0.0.1", "10.0.0.2", 101.0);
        agg.record("10.0.0.2", "10.0.0.3", 102.0);

        let snap = agg.snapshot(103.0);
        let ips: Vec<&str> = snap.nodes.iter().map(|n| n.ip.as_str()).collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(snap.nodes[1].packets, 3.0);
        assert_eq!(snap.edges.len(), 2);
        assert_eq!(snap.edges[0].weight, 2.0);
        assert_eq!(snap.timestamp, 103.0);
        let second = agg.host_index["10.0.0.2"];
        assert_eq!(agg.hosts[second].1.first_seen, 100.0);
    }

    #[test]
    fn stale_entries_drop_out() {
        let mut agg = TrafficAggregator::new();
        agg.record("10.0.0.1", "10.0.0.2", 0.0);
        agg.record("10.0.0.3", "10.0.0.4", 20.0);

        let snap = agg.snapshot(35.0);
        assert_eq!(snap.nodes.len(), 2);
        assert_eq!(snap.edges.len(), 1);
        assert_eq!(snap.edges[0].source, "10.0.0.3");
        assert_eq!(agg.host_count(), 4);
    }

    #[test]
    fn reader_thread_aggregates_input() {
        let input = "IP 10.0.0.1.1 > 10.0.0.2.2: x\nnoise\nDEBUG: IPv4: 10.0.0.2 -> 10.0.0.1\n";
        let agg = TrafficAggregator::shared();
        let handle = spawn_reader(Cursor::new(input.to_string()), Arc::clone(&agg));
        let start = Instant::now();
        while !handle.is_finished() {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(5));
        }
        let snap = agg.lock().unwrap().snapshot(unix_now());
        assert_eq!(snap.nodes.len(), 2);
        assert_eq!(snap.edges.len(), 2);
    }
}
