//! Hosting for the Hangar detection engine.
//!
//! Loads [`ServerConfig`] from a TOML file layered with `HANGAR_*`
//! environment variables, and wraps the JSON API in a traced [`Router`].

use std::path::{Path, PathBuf};

use axum::Router;
use hangar_engine::{Engine, EngineConfig};
use hangar_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// The concrete engine the binary runs: SQLite for both the detection state
/// and the collaborator tables.
pub type SqliteEngine = Engine<SqliteStore, SqliteStore>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub detection:  EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/hangar/hangar.db"),
      detection:  EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (missing is fine) and overlay the environment, e.g.
  /// `HANGAR_PORT=9000` or `HANGAR_DETECTION__MAX_CONCURRENCY=2`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("HANGAR")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  /// `host:port`, ready for binding.
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full HTTP surface: the JSON API under `/api`, with request tracing.
pub fn router(engine: SqliteEngine) -> Router {
  Router::new()
    .nest("/api", hangar_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use pretty_assertions::assert_eq;
  use tower::ServiceExt as _;

  use super::*;

  async fn make_engine() -> SqliteEngine {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    Engine::new(Arc::clone(&store), store, EngineConfig::default())
  }

  async fn oneshot_get(uri: &str) -> (StatusCode, Vec<u8>) {
    let resp = router(make_engine().await)
      .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
  }

  #[test]
  fn missing_config_file_falls_back_to_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/hangar.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.detection.max_concurrency, 8);
    assert_eq!(cfg.detection.triggered_by, "system");
  }

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let path = std::env::temp_dir().join(format!("hangar-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
      &path,
      "port = 9001\n\n[detection]\nmax_concurrency = 2\n",
    )
    .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.address(), "127.0.0.1:9001");
    assert_eq!(cfg.detection.max_concurrency, 2);
    assert_eq!(cfg.detection.triggered_by, "system");
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/hangar.db")),
      PathBuf::from(home).join("hangar.db")
    );
    assert_eq!(expand_tilde(Path::new("/var/hangar.db")), PathBuf::from("/var/hangar.db"));
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let (status, body) = oneshot_get("/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"version":null}"#.to_vec());

    let (status, _) = oneshot_get("/version").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
