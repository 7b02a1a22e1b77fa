use crate::projection::Rotation;
use crate::settings::Settings;
use crate::world::DEFAULT_WORLD_URL;
use std::time::Duration;

/// Where topology snapshots come from
#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    Http(String),
    /// Capture lines piped on stdin
    Stdin,
    Offline,
}

/// Interactive run configuration, CLI merged over settings
#[derive(Clone, Debug, PartialEq)]
pub struct GlobeConfig {
    pub source: SourceKind,
    pub world: Option<String>,
    pub refresh: Duration,
    pub timeout: Duration,
    pub time_step: f32,
}

impl GlobeConfig {
    pub fn merge(
        settings: &Settings,
        endpoint: Option<String>,
        world: Option<String>,
        offline: bool,
        stdin: bool,
        time_step: Option<f32>,
    ) -> Self {
        let source = if offline {
            SourceKind::Offline
        } else if stdin {
            SourceKind::Stdin
        } else {
            SourceKind::Http(endpoint.unwrap_or_else(|| settings.source.endpoint.clone()))
        };
        let world = if offline {
            None
        } else {
            Some(
                world
                    .or_else(|| settings.world.url.clone())
                    .unwrap_or_else(|| DEFAULT_WORLD_URL.to_string()),
            )
        };
        Self {
            source,
            world,
            refresh: Duration::from_millis(settings.source.refresh_ms.max(100)),
            timeout: Duration::from_millis(settings.source.timeout_ms.max(100)),
            time_step: time_step.unwrap_or(settings.view.frame_time).clamp(0.005, 1.0),
        }
    }
}

/// One-frame render configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotConfig {
    pub progress: f64,
    pub rotation: Rotation,
    pub phase: f64,
    pub cols: u16,
    pub rows: u16,
    pub svg: Option<std::path::PathBuf>,
    pub offline: bool,
}

/// Parse `lambda,phi` rotation angles in degrees.
pub fn parse_rotation(text: &str) -> Result<Rotation, String> {
    let (lambda, phi) = text
        .split_once(',')
        .ok_or_else(|| format!("expected lambda,phi but got '{text}'"))?;
    let lambda: f64 = lambda.trim().parse().map_err(|_| format!("bad lambda '{lambda}'"))?;
    let phi: f64 = phi.trim().parse().map_err(|_| format!("bad phi '{phi}'"))?;
    if !(-90.0..=90.0).contains(&phi) {
        return Err(format!("phi {phi} out of range"));
    }
    Ok(Rotation::new(lambda, phi))
}
