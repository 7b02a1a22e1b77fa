//! World boundary geometry
//!
//! Loads a world-atlas TopoJSON document (over http or from disk) and turns
//! the first geometry collection into country features. Any failure leaves
//! the caller with a single whole-sphere placeholder so there is always
//! something to draw.

use crate::geo::{Feature, GeoPoint, Geometry, Ring};
use crate::topology::source::{FetchError, Pending};
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

pub const DEFAULT_WORLD_URL: &str = "https://cdn.jsdelivr.net/npm/world-atlas@2/countries-110m.json";

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<Transform>,
    objects: BTreeMap<String, TopoGeometry>,
    arcs: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        properties: Option<Properties>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        properties: Option<Properties>,
    },
    #[serde(other)]
    Other,
}

/// Arcs decoded to absolute lon/lat once, shared by every ring.
struct ArcTable {
    arcs: Vec<Vec<GeoPoint>>,
}

impl ArcTable {
    fn decode(topology: &Topology) -> Self {
        let arcs = topology
            .arcs
            .iter()
            .map(|arc| {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| match &topology.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            GeoPoint::new(x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1])
                        }
                        None => GeoPoint::new(position[0], position[1]),
                    })
                    .collect()
            })
            .collect();
        Self { arcs }
    }

    /// Stitch arc references into one ring; `~i` walks arc `i` backwards.
    fn ring(&self, refs: &[i64]) -> Option<Ring> {
        let mut ring: Ring = Vec::new();
        for &index in refs {
            let (idx, reversed) = if index < 0 { ((!index) as usize, true) } else { (index as usize, false) };
            let arc = self.arcs.get(idx)?;
            let points: Box<dyn Iterator<Item = &GeoPoint>> = if reversed {
                Box::new(arc.iter().rev())
            } else {
                Box::new(arc.iter())
            };
            // consecutive arcs share their joining point
            let skip = usize::from(!ring.is_empty());
            ring.extend(points.skip(skip).copied());
        }
        (ring.len() >= 4).then_some(ring)
    }

    fn polygon(&self, rings: &[Vec<i64>]) -> Vec<Ring> {
        rings.iter().filter_map(|refs| self.ring(refs)).collect()
    }
}

fn collect_features(table: &ArcTable, geometry: &TopoGeometry, out: &mut Vec<Feature>) {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_features(table, child, out);
            }
        }
        TopoGeometry::Polygon { arcs, properties } => {
            let rings = table.polygon(arcs);
            if !rings.is_empty() {
                out.push(Feature {
                    name: properties.as_ref().and_then(|p| p.name.clone()),
                    geometry: Geometry::Polygon(rings),
                });
            }
        }
        TopoGeometry::MultiPolygon { arcs, properties } => {
            let polygons: Vec<Vec<Ring>> = arcs
                .iter()
                .map(|polygon| table.polygon(polygon))
                .filter(|rings| !rings.is_empty())
                .collect();
            if !polygons.is_empty() {
                out.push(Feature {
                    name: properties.as_ref().and_then(|p| p.name.clone()),
                    geometry: Geometry::MultiPolygon(polygons),
                });
            }
        }
        TopoGeometry::Other => {}
    }
}

/// Decode a TopoJSON document. Prefers an object named `countries`.
pub fn parse_topojson(json: &str) -> Result<Vec<Feature>, FetchError> {
    let topology: Topology = serde_json::from_str(json).map_err(io::Error::from)?;
    let table = ArcTable::decode(&topology);
    let object = topology
        .objects
        .get("countries")
        .or_else(|| topology.objects.values().next())
        .ok_or(FetchError::Empty)?;

    let mut features = Vec::new();
    collect_features(&table, object, &mut features);
    if features.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(features)
}

/// Fetch or read a world document; `source` is a URL or a file path.
pub fn load_world(source: &str, timeout: Duration) -> Result<Vec<Feature>, FetchError> {
    let body = if source.starts_with("http://") || source.starts_with("https://") {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        agent.get(source).call()?.into_string()?
    } else {
        std::fs::read_to_string(source).map_err(|e| FetchError::Transport(format!("{source}: {e}")))?
    };
    parse_topojson(&body)
}

/// One feature covering the whole sphere as a lon/lat rectangle.
pub fn placeholder_world() -> Vec<Feature> {
    const STEP: f64 = 10.0;
    let mut ring: Ring = Vec::new();
    let mut lon = -180.0;
    while lon < 180.0 {
        ring.push(GeoPoint::new(lon, -90.0));
        lon += STEP;
    }
    let mut lat = -90.0;
    while lat < 90.0 {
        ring.push(GeoPoint::new(180.0, lat));
        lat += STEP;
    }
    let mut lon = 180.0;
    while lon > -180.0 {
        ring.push(GeoPoint::new(lon, 90.0));
        lon -= STEP;
    }
    let mut lat = 90.0;
    while lat > -90.0 {
        ring.push(GeoPoint::new(-180.0, lat));
        lat -= STEP;
    }
    ring.push(GeoPoint::new(-180.0, -90.0));

    vec![Feature {
        name: Some("World".to_string()),
        geometry: Geometry::Polygon(vec![ring]),
    }]
}

/// Load or fall back; never fails.
pub fn world_or_placeholder(source: &str, timeout: Duration) -> Vec<Feature> {
    match load_world(source, timeout) {
        Ok(features) => {
            info!("loaded {} world features from {source}", features.len());
            features
        }
        Err(e) => {
            warn!("world geometry unavailable ({e}), using placeholder");
            placeholder_world()
        }
    }
}

/// World load running on a worker thread.
pub struct WorldLoader {
    pending: Option<Pending<Vec<Feature>>>,
}

impl WorldLoader {
    pub fn spawn(source: String, timeout: Duration) -> Self {
        Self {
            pending: Some(Pending::spawn(move || world_or_placeholder(&source, timeout))),
        }
    }

    /// Features once, when the worker finishes.
    pub fn poll(&mut self) -> Option<Vec<Feature>> {
        let result = self.pending.as_ref()?.poll()?;
        self.pending = None;
        Some(result.unwrap_or_else(|e| {
            warn!("world loader failed ({e}), using placeholder");
            placeholder_world()
        }))
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const QUANTIZED: &str = r#"{
        "type": "Topology",
        "transform": {"scale": [0.5, 0.25], "translate": [-10, -5]},
        "objects": {
            "countries": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "arcs": [[0, 1]], "properties": {"name": "Square"}},
                    {"type": "MultiPolygon", "arcs": [[[~1, ~0]]], "properties": {"name": "Again"}},
                    {"type": "Point", "coordinates": [0, 0]}
                ]
            }
        },
        "arcs": [
            [[0, 0], [20, 0], [0, 40]],
            [[20, 40], [-20, 0], [0, -40]]
        ]
    }"#;

    fn quantized() -> String {
        // `~i` is not JSON; write the reversed references as ones' complement
        QUANTIZED.replace("~1", "-2").replace("~0", "-1")
    }

    #[test]
    fn decodes_quantized_polygon() {
        let features = parse_topojson(&quantized()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name.as_deref(), Some("Square"));
        let ring = features[0].geometry.rings().next().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], GeoPoint::new(-10.0, -5.0));
        assert_eq!(ring[1], GeoPoint::new(0.0, -5.0));
        assert_eq!(ring[2], GeoPoint::new(0.0, 5.0));
        assert_eq!(ring[3], GeoPoint::new(-10.0, 5.0));
        assert_eq!(ring[4], ring[0]);
    }

    #[test]
    fn reversed_references_walk_backwards() {
        let features = parse_topojson(&quantized()).unwrap();
        let ring = features[1].geometry.rings().next().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], GeoPoint::new(-10.0, -5.0));
        assert_eq!(ring[1], GeoPoint::new(-10.0, 5.0));
        assert_eq!(ring[4], GeoPoint::new(-10.0, -5.0));
    }

    #[test]
    fn unquantized_arcs_are_absolute() {
        let json = r#"{"type":"Topology","objects":{"land":{"type":"Polygon",
            "arcs":[[0]]}},"arcs":[[[0,0],[10,0],[10,10],[0,0]]]}"#;
        let features = parse_topojson(json).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0].name.is_none());
        let ring = features[0].geometry.rings().next().unwrap();
        assert_eq!(ring[2], GeoPoint::new(10.0, 10.0));
    }

    #[test]
    fn bad_documents_fail() {
        assert!(parse_topojson("not json").is_err());
        assert!(matches!(
            parse_topojson(r#"{"type":"Topology","objects":{},"arcs":[]}"#),
            Err(FetchError::Empty)
        ));
        let dangling = r#"{"type":"Topology","objects":{"c":{"type":"Polygon","arcs":[[7]]}},"arcs":[]}"#;
        assert!(matches!(parse_topojson(dangling), Err(FetchError::Empty)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(quantized().as_bytes()).unwrap();
        let path = file.path().to_string_lossy().to_string();
        let features = load_world(&path, Duration::from_secs(1)).unwrap();
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn missing_file_falls_back_to_placeholder() {
        let features = world_or_placeholder("/nonexistent/netglobe/world.json", Duration::from_secs(1));
        assert_eq!(features, placeholder_world());
    }

    #[test]
    fn placeholder_covers_sphere() {
        let world = placeholder_world();
        assert_eq!(world.len(), 1);
        let ring = world[0].geometry.rings().next().unwrap();
        assert_eq!(ring.first(), ring.last());
        let min_lon = ring.iter().map(|p| p.lon).fold(f64::INFINITY, f64::min);
        let max_lat = ring.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min_lon, -180.0);
        assert_eq!(max_lat, 90.0);
    }

    #[test]
    fn background_loader_finishes_once() {
        let mut loader = WorldLoader::spawn("/nonexistent/netglobe/world.json".into(), Duration::from_secs(1));
        let start = std::time::Instant::now();
        let features = loop {
            if let Some(features) = loader.poll() {
                break features;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "loader never finished");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(features, placeholder_world());
        assert!(!loader.is_loading());
        assert!(loader.poll().is_none());
    }
}
