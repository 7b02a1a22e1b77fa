//! Topology sources and the non-blocking refresh feed
//!
//! A source performs one blocking fetch. The feed runs that fetch on a
//! worker thread and hands the result back over a channel, so the frame
//! loop only ever polls. Failures never reach the renderer: the feed keeps
//! the last good topology and flips to demo mode.

use super::adapter::{adapt, TopologyResponse};
use super::capture::SharedAggregator;
use super::{demo_topology, TopologyData};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("could not decode response: {0}")]
    Decode(#[from] io::Error),
    #[error("topology contained no nodes")]
    Empty,
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
        }
    }
}

/// Something that can produce one topology snapshot.
pub trait TopologySource: Send + Sync {
    fn fetch(&self) -> Result<TopologyResponse, FetchError>;

    fn describe(&self) -> String;
}

/// `GET <endpoint>/api/topology`
pub struct HttpSource {
    agent: ureq::Agent,
    url: String,
}

impl HttpSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            url: format!("{}/api/topology", endpoint.trim_end_matches('/')),
        }
    }
}

impl TopologySource for HttpSource {
    fn fetch(&self) -> Result<TopologyResponse, FetchError> {
        let response = self.agent.get(&self.url).call()?;
        if response.status() != 200 {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.into_json::<TopologyResponse>()?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Snapshots of the in-process capture aggregator.
pub struct CaptureSource {
    aggregator: SharedAggregator,
}

impl CaptureSource {
    pub fn new(aggregator: SharedAggregator) -> Self {
        Self { aggregator }
    }
}

impl TopologySource for CaptureSource {
    fn fetch(&self) -> Result<TopologyResponse, FetchError> {
        let now = super::capture::unix_now();
        let guard = self
            .aggregator
            .lock()
            .map_err(|_| FetchError::Transport("capture aggregator poisoned".into()))?;
        Ok(guard.snapshot(now))
    }

    fn describe(&self) -> String {
        "stdin capture".to_string()
    }
}

/// A source that never answers; used for offline runs.
pub struct OfflineSource;

impl TopologySource for OfflineSource {
    fn fetch(&self) -> Result<TopologyResponse, FetchError> {
        Err(FetchError::Transport("offline".into()))
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}

// ============================================================================
// Background fetch
// ============================================================================

/// One value being produced on a worker thread.
pub struct Pending<T> {
    receiver: Receiver<T>,
}

impl<T: Send + 'static> Pending<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx): (Sender<T>, Receiver<T>) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(work());
        });
        Self { receiver: rx }
    }

    /// `Some` once the worker has finished or died; never blocks.
    pub fn poll(&self) -> Option<Result<T, FetchError>> {
        match self.receiver.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(FetchError::Transport("worker exited without a result".into())))
            }
        }
    }
}

// ============================================================================
// Connectivity + topology state
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Connecting,
    Live,
    Demo,
}

impl Connectivity {
    pub fn label(&self) -> &'static str {
        match self {
            Connectivity::Connecting => "CONNECTING",
            Connectivity::Live => "LIVE",
            Connectivity::Demo => "DEMO (disconnected)",
        }
    }
}

/// Last committed topology plus where it came from.
pub struct TopologyState {
    data: TopologyData,
    connectivity: Connectivity,
    updated: Option<DateTime<Local>>,
}

impl TopologyState {
    pub fn demo() -> Self {
        Self {
            data: demo_topology(),
            connectivity: Connectivity::Connecting,
            updated: None,
        }
    }

    pub fn data(&self) -> &TopologyData {
        &self.data
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn updated(&self) -> Option<DateTime<Local>> {
        self.updated
    }

    /// Commit a fetch result. Returns true if the topology was replaced.
    pub fn apply(&mut self, result: Result<TopologyResponse, FetchError>) -> bool {
        let outcome = result.and_then(|response| {
            if response.nodes.is_empty() {
                Err(FetchError::Empty)
            } else {
                Ok(adapt(&response))
            }
        });

        match outcome {
            Ok(data) if !data.is_empty() => {
                if self.connectivity != Connectivity::Live {
                    info!("topology source connected ({} nodes)", data.nodes.len());
                }
                debug!("topology refreshed: {} nodes, {} links", data.nodes.len(), data.links.len());
                self.data = data;
                self.connectivity = Connectivity::Live;
                self.updated = Some(Local::now());
                true
            }
            Ok(_) => self.degrade(&FetchError::Empty),
            Err(err) => self.degrade(&err),
        }
    }

    fn degrade(&mut self, err: &FetchError) -> bool {
        if self.connectivity != Connectivity::Demo {
            warn!("topology fetch failed, keeping previous data: {err}");
        } else {
            debug!("topology fetch failed again: {err}");
        }
        self.connectivity = Connectivity::Demo;
        false
    }
}

/// Issues fetches on request, at most one in flight.
pub struct TopologyFeed {
    source: Arc<dyn TopologySource>,
    in_flight: Option<Pending<Result<TopologyResponse, FetchError>>>,
}

impl TopologyFeed {
    pub fn new(source: Arc<dyn TopologySource>) -> Self {
        info!("topology source: {}", source.describe());
        Self { source, in_flight: None }
    }

    /// Start a fetch unless one is already running.
    pub fn request(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let source = Arc::clone(&self.source);
        self.in_flight = Some(Pending::spawn(move || source.fetch()));
    }

    /// Completed fetch, if any. A worker that died counts as a failed fetch.
    pub fn poll(&mut self) -> Option<Result<TopologyResponse, FetchError>> {
        let result = self.in_flight.as_ref()?.poll()?;
        self.in_flight = None;
        Some(result.and_then(|fetched| fetched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::adapter::{WireEdge, WireNode};
    use std::time::Instant;

    fn response() -> TopologyResponse {
        TopologyResponse {
            nodes: vec![
                WireNode { ip: "10.144.1.1".into(), packets: 4.0 },
                WireNode { ip: "10.144.1.2".into(), packets: 0.0 },
            ],
            edges: vec![WireEdge {
                source: "10.144.1.1".into(),
                target: "10.144.1.2".into(),
                weight: 80.0,
            }],
            timestamp: 1.0,
        }
    }

    struct Fixed(Result<TopologyResponse, u16>);

    impl TopologySource for Fixed {
        fn fetch(&self) -> Result<TopologyResponse, FetchError> {
            self.0.clone().map_err(FetchError::Status)
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    fn wait(feed: &mut TopologyFeed) -> Result<TopologyResponse, FetchError> {
        let start = Instant::now();
        loop {
            if let Some(result) = feed.poll() {
                return result;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "fetch never completed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn failed_fetch_keeps_previous_data() {
        let mut state = TopologyState::demo();
        let before = state.data().clone();
        assert!(!state.apply(Err(FetchError::Transport("refused".into()))));
        assert_eq!(state.data(), &before);
        assert_eq!(state.connectivity(), Connectivity::Demo);
        assert_eq!(state.connectivity().label(), "DEMO (disconnected)");
    }

    #[test]
    fn empty_response_is_degraded() {
        let mut state = TopologyState::demo();
        assert!(!state.apply(Ok(TopologyResponse::default())));
        assert_eq!(state.connectivity(), Connectivity::Demo);
        assert_eq!(state.data().nodes.len(), 12);
    }

    #[test]
    fn good_response_replaces_data() {
        let mut state = TopologyState::demo();
        assert!(state.apply(Ok(response())));
        assert_eq!(state.connectivity(), Connectivity::Live);
        assert_eq!(state.data().nodes.len(), 2);
        assert!(state.updated().is_some());

        assert!(!state.apply(Err(FetchError::Status(503))));
        assert_eq!(state.data().nodes.len(), 2);
        assert_eq!(state.connectivity(), Connectivity::Demo);
    }

    #[test]
    fn feed_delivers_without_blocking() {
        let mut feed = TopologyFeed::new(Arc::new(Fixed(Ok(response()))));
        feed.request();
        assert!(feed.in_flight.is_some());
        feed.request();
        let result = wait(&mut feed);
        assert_eq!(result.unwrap().nodes.len(), 2);
        assert!(feed.in_flight.is_none());
        assert!(feed.poll().is_none());
    }

    struct Crashing;

    impl TopologySource for Crashing {
        fn fetch(&self) -> Result<TopologyResponse, FetchError> {
            panic!("fetch worker crashed");
        }

        fn describe(&self) -> String {
            "crashing".into()
        }
    }

    #[test]
    fn crashed_worker_fails_fetch_and_frees_feed() {
        let mut feed = TopologyFeed::new(Arc::new(Crashing));
        feed.request();
        assert!(matches!(wait(&mut feed), Err(FetchError::Transport(_))));
        assert!(feed.in_flight.is_none());

        feed.request();
        assert!(feed.in_flight.is_some());
        assert!(matches!(wait(&mut feed), Err(FetchError::Transport(_))));
    }

    #[test]
    fn feed_reports_failure() {
        let mut feed = TopologyFeed::new(Arc::new(Fixed(Err(500))));
        feed.request();
        assert!(matches!(wait(&mut feed), Err(FetchError::Status(500))));
    }

    #[test]
    fn offline_source_always_fails() {
        assert!(OfflineSource.fetch().is_err());
    }

    #[test]
    fn http_source_builds_topology_url() {
        let source = HttpSource::new("http://localhost:5000/", Duration::from_secs(1));
        assert_eq!(source.describe(), "http://localhost:5000/api/topology");
    }
}
