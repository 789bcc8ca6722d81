use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use ts_rs::TS;

use crate::store::{Store, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LoadStage {
    Idle,
    CheckHealth,
    MinimalFetch,
    FullFetch,
    FallbackFetch,
    Normalize,
    Publish,
    Statistics,
    Ready,
    Failed,
}

impl LoadStage {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStage::Idle => "idle",
            LoadStage::CheckHealth => "check_health",
            LoadStage::MinimalFetch => "minimal_fetch",
            LoadStage::FullFetch => "full_fetch",
            LoadStage::FallbackFetch => "fallback_fetch",
            LoadStage::Normalize => "normalize",
            LoadStage::Publish => "publish",
            LoadStage::Statistics => "statistics",
            LoadStage::Ready => "ready",
            LoadStage::Failed => "failed",
        }
    }
}

/// Mirrors load progress into `graph.loading`, `ui.loadStage` and
/// `ui.loadError`.
#[derive(Clone)]
pub struct LoadStatusService {
    store: Store,
}

impl LoadStatusService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn begin(&self) {
        self.store.set_many([
            (paths::GRAPH_LOADING, Value::Bool(true)),
            (paths::UI_LOAD_ERROR, Value::Null),
            (paths::UI_LOAD_STAGE, json!(LoadStage::CheckHealth.as_str())),
        ]);
    }

    pub fn advance(&self, stage: LoadStage) {
        debug!(stage = stage.as_str(), "Load stage");
        self.store
            .set(paths::UI_LOAD_STAGE, json!(stage.as_str()));
    }

    pub fn finish(&self, stage: LoadStage) {
        self.store.set_many([
            (paths::UI_LOAD_STAGE, json!(stage.as_str())),
            (paths::GRAPH_LOADING, Value::Bool(false)),
        ]);
    }

    /// Ends any load in progress as ready with no error. Used when a graph is
    /// published outside a load and the running load became stale.
    pub fn settle(&self) {
        self.store.set_many([
            (paths::UI_LOAD_STAGE, json!(LoadStage::Ready.as_str())),
            (paths::UI_LOAD_ERROR, Value::Null),
            (paths::GRAPH_LOADING, Value::Bool(false)),
        ]);
    }

    pub fn current(&self) -> Option<LoadStage> {
        self.store.get_as(paths::UI_LOAD_STAGE)
    }
}
