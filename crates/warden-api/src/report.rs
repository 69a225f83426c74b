//! Serializable views of an evaluation, for logging and `wardend --once`

use serde::{Deserialize, Serialize};
use warden_util::CategoryId;

use crate::{BlockingLevel, BlockingReason, API_VERSION};

/// How a foreground app was classified, without the category chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlingKind {
    Idle,
    PauseLogic,
    Whitelist,
    TemporarilyAllowed,
    BlockDueToNoCategory,
    UseCategories,
}

/// Outcome for one foreground app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDecisionView {
    pub package: Option<String>,
    pub activity: Option<String>,
    pub handling: HandlingKind,
    /// Leaf to root; empty unless `handling` is `use_categories`
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    pub reason: BlockingReason,
    /// Reason to suppress notifications of the app; `none` if they may be shown
    #[serde(default = "no_reason")]
    pub notification_reason: BlockingReason,
    pub blocking_category: Option<CategoryId>,
    pub level: Option<BlockingLevel>,
}

fn no_reason() -> BlockingReason {
    BlockingReason::None
}

/// Outcome of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReportView {
    pub api_version: u32,
    /// Epoch milliseconds the evaluation was done for
    pub evaluated_at: i64,
    /// Epoch milliseconds after which the result may change
    pub reevaluate_at: Option<i64>,
    pub categories_to_count: Vec<CategoryId>,
    /// Milliseconds that may be added to usage before re-evaluating; `None` if unlimited
    pub max_time_to_add: Option<i64>,
    pub apps: Vec<AppDecisionView>,
}

impl EvaluationReportView {
    pub fn new(evaluated_at: i64) -> Self {
        Self {
            api_version: API_VERSION,
            evaluated_at,
            reevaluate_at: None,
            categories_to_count: Vec::new(),
            max_time_to_add: None,
            apps: Vec::new(),
        }
    }

    /// Whether any app in the report must be blocked
    pub fn any_blocked(&self) -> bool {
        self.apps.iter().any(|app| app.reason.is_blocking())
    }
}
