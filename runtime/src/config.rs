use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model::NodeType;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub graph: GraphConfig,
    pub labels: LabelMap,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeouts_ms: TimeoutsConfig,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeouts_ms: TimeoutsConfig::default(),
            retry_count: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub general: u64,
    pub health: u64,
    pub minimal_graph: u64,
    pub full_graph: u64,
    pub fallback_graph: u64,
    pub chat: u64,
    pub statistics: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            general: 30_000,
            health: 30_000,
            minimal_graph: 15_000,
            full_graph: 60_000,
            fallback_graph: 20_000,
            chat: 30_000,
            statistics: 30_000,
        }
    }
}

impl TimeoutsConfig {
    pub fn general(&self) -> Duration {
        Duration::from_millis(self.general)
    }

    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health)
    }

    pub fn minimal_graph(&self) -> Duration {
        Duration::from_millis(self.minimal_graph)
    }

    pub fn full_graph(&self) -> Duration {
        Duration::from_millis(self.full_graph)
    }

    pub fn fallback_graph(&self) -> Duration {
        Duration::from_millis(self.fallback_graph)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_millis(self.chat)
    }

    pub fn statistics(&self) -> Duration {
        Duration::from_millis(self.statistics)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub initial_edge_limit: u32,
    pub initial_node_cap: u32,
    pub minimal_edge_limit: u32,
    pub minimal_node_cap: u32,
    pub default_relationship_types: Vec<String>,
    pub default_search_properties: Vec<String>,
    pub search_limit: u32,
    pub ego_depth: u32,
    pub ego_limit: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            initial_edge_limit: 50,
            initial_node_cap: 50,
            minimal_edge_limit: 20,
            minimal_node_cap: 20,
            default_relationship_types: vec!["HOLDS_SHARES".into(), "HAS_COMPENSATION".into()],
            default_search_properties: [
                "companyName",
                "companyNameNormalized",
                "stockName",
                "stockNameNormalized",
                "bizno",
                "personId",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            search_limit: 50,
            ego_depth: 1,
            ego_limit: 100,
        }
    }
}

/// Bidirectional mapping between server labels and dashboard node types,
/// plus the id property the server expects per label.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelMap {
    pub label_to_type: HashMap<String, NodeType>,
    pub type_to_label: HashMap<NodeType, String>,
    pub id_properties: HashMap<String, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        let label_to_type = [
            ("Company", NodeType::Company),
            ("LegalEntity", NodeType::Company),
            ("Person", NodeType::Person),
            ("Stockholder", NodeType::Major),
            ("MajorShareholder", NodeType::Major),
            ("Institution", NodeType::Institution),
        ]
        .into_iter()
        .map(|(label, ty)| (label.to_string(), ty))
        .collect();

        let type_to_label = [
            (NodeType::Company, "Company"),
            (NodeType::Person, "Person"),
            (NodeType::Major, "Stockholder"),
            (NodeType::Institution, "Stockholder"),
        ]
        .into_iter()
        .map(|(ty, label)| (ty, label.to_string()))
        .collect();

        let id_properties = [
            ("Company", "bizno"),
            ("LegalEntity", "bizno"),
            ("Stockholder", "bizno"),
            ("Person", "personId"),
        ]
        .into_iter()
        .map(|(label, prop)| (label.to_string(), prop.to_string()))
        .collect();

        Self {
            label_to_type,
            type_to_label,
            id_properties,
        }
    }
}

impl LabelMap {
    pub fn type_for(&self, label: &str) -> Option<NodeType> {
        self.label_to_type.get(label).copied()
    }

    pub fn label_for(&self, node_type: NodeType) -> Option<&str> {
        self.type_to_label.get(&node_type).map(String::as_str)
    }

    pub fn id_property_for(&self, label: &str) -> Option<&str> {
        self.id_properties.get(label).map(String::as_str)
    }
}

impl AppConfig {
    /// Applies `API_BASE_URL`, `API_TIMEOUT_MS` and `GRAPH_REQUEST_TIMEOUT_MS`.
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("API_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            self.api.base_url = url;
        }

        if let Some(ms) = parse_millis(&lookup, "API_TIMEOUT_MS") {
            self.api.timeouts_ms.general = ms;
        }

        if let Some(ms) = parse_millis(&lookup, "GRAPH_REQUEST_TIMEOUT_MS") {
            self.api.timeouts_ms.full_graph = ms;
        }

        self
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid timeout override");
            None
        }
    }
}

pub fn config_path() -> PathBuf {
    env::var("APP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub async fn load_config() -> Result<AppConfig> {
    let config = load_config_from(&config_path()).await?;
    Ok(config.apply_env_overrides(|key| env::var(key).ok()))
}

/// Reads and parses the YAML file at `path`. A missing file yields defaults.
pub async fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: AppConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    info!(path = %path.display(), base_url = %config.api.base_url, "Configuration loaded from disk");
    Ok(config)
}
