use std::path::{Path, PathBuf};

use engine::{resolve_app_paths, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::OfficeScene;
use super::office_map::{load_office_map, OfficeMapError};
use super::persistence::{NullSink, PersistenceSink, SessionFileSink};

const MAP_ENV_VAR: &str = "OFFICE_MAP";
const SESSION_ENV_VAR: &str = "OFFICE_SESSION";
const MAX_FPS_ENV_VAR: &str = "OFFICE_MAX_FPS";
const DEFAULT_MAP_PATH: &str = "maps/office.tmx";
const DEFAULT_SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load office map: {0}")]
    Map(#[from] OfficeMapError),
}

/// Where the session is kept. A blank `OFFICE_SESSION` turns persistence off.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionTarget {
    File(PathBuf),
    Disabled,
}

impl SessionTarget {
    fn sink(self, map_fingerprint: &str) -> Box<dyn PersistenceSink> {
        match self {
            SessionTarget::File(path) => {
                Box::new(SessionFileSink::new(path, map_fingerprint.to_string()))
            }
            SessionTarget::Disabled => Box::new(NullSink),
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Pixel Office Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "app_paths_resolved");

    let map_path = path_from_env(MAP_ENV_VAR, &paths.root)
        .unwrap_or_else(|| paths.assets_dir.join(DEFAULT_MAP_PATH));
    let session = session_target(
        std::env::var(SESSION_ENV_VAR).ok().as_deref(),
        paths.saves_dir.join(DEFAULT_SESSION_FILE),
        &paths.root,
    );

    let map = load_office_map(&map_path)?;
    match &session {
        SessionTarget::File(path) => info!(
            map = %map_path.display(),
            session = %path.display(),
            items = map.items.len(),
            "office_configured"
        ),
        SessionTarget::Disabled => info!(
            map = %map_path.display(),
            items = map.items.len(),
            "office_configured_without_session"
        ),
    }
    let sink = session.sink(&map.fingerprint);

    let config = LoopConfig {
        max_render_fps: parse_max_fps(std::env::var(MAX_FPS_ENV_VAR).ok().as_deref()),
        assets_dir: paths.assets_dir,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        scene: Box::new(OfficeScene::new(map, sink)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Relative values resolve against the project root.
fn path_from_env(var: &str, root: &Path) -> Option<PathBuf> {
    let raw = std::env::var(var).ok()?;
    resolve_env_path(var, &raw, root)
}

fn resolve_env_path(var: &str, raw: &str, root: &Path) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!(var, "env_path_empty_using_default");
        return None;
    }
    let path = Path::new(trimmed);
    Some(if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    })
}

fn session_target(raw: Option<&str>, default_path: PathBuf, root: &Path) -> SessionTarget {
    match raw {
        None => SessionTarget::File(default_path),
        Some(raw) if raw.trim().is_empty() => SessionTarget::Disabled,
        Some(raw) => resolve_env_path(SESSION_ENV_VAR, raw, root)
            .map_or(SessionTarget::Disabled, SessionTarget::File),
    }
}

/// `0` or unset means uncapped.
fn parse_max_fps(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    match raw.parse::<u32>() {
        Ok(0) => None,
        Ok(cap) => Some(cap),
        Err(_) => {
            warn!(var = MAX_FPS_ENV_VAR, value = raw, "invalid_max_fps_ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::persistence::SessionError;
    use crate::app::store::AgentStore;

    #[test]
    fn max_fps_parses_or_falls_back() {
        assert_eq!(parse_max_fps(None), None);
        assert_eq!(parse_max_fps(Some(" 144 ")), Some(144));
        assert_eq!(parse_max_fps(Some("0")), None);
        assert_eq!(parse_max_fps(Some("fast")), None);
        assert_eq!(parse_max_fps(Some("-30")), None);
    }

    #[test]
    fn env_paths_resolve_against_root() {
        let root = Path::new("/srv/office");
        assert_eq!(
            resolve_env_path(MAP_ENV_VAR, "assets/alt.tmx", root),
            Some(PathBuf::from("/srv/office/assets/alt.tmx"))
        );
        assert_eq!(
            resolve_env_path(MAP_ENV_VAR, "/tmp/alt.tmx", root),
            Some(PathBuf::from("/tmp/alt.tmx"))
        );
        assert_eq!(resolve_env_path(MAP_ENV_VAR, "   ", root), None);
    }

    #[test]
    fn blank_session_var_disables_persistence() {
        let root = Path::new("/srv/office");
        let default_path = PathBuf::from("/srv/office/saves/session.json");

        assert_eq!(
            session_target(None, default_path.clone(), root),
            SessionTarget::File(default_path.clone())
        );
        assert_eq!(
            session_target(Some("alt.json"), default_path.clone(), root),
            SessionTarget::File(PathBuf::from("/srv/office/alt.json"))
        );
        assert_eq!(
            session_target(Some("  "), default_path, root),
            SessionTarget::Disabled
        );

        let mut sink = SessionTarget::Disabled.sink("fp");
        let store = AgentStore::default();
        assert!(matches!(sink.save_now(&store), Err(SessionError::Disabled)));
        assert!(sink.load().expect("load").is_none());
    }
}
