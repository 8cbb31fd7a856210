use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Exploring,
    Designing,
    PlanReview,
    Implementing,
    Verifying,
    FinalReview,
    Passed,
    Failed,
    Abandoned,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Exploring => "exploring",
            Self::Designing => "designing",
            Self::PlanReview => "plan_review",
            Self::Implementing => "implementing",
            Self::Verifying => "verifying",
            Self::FinalReview => "final_review",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "exploring" => Some(Self::Exploring),
            "designing" => Some(Self::Designing),
            "plan_review" => Some(Self::PlanReview),
            "implementing" => Some(Self::Implementing),
            "verifying" => Some(Self::Verifying),
            "final_review" => Some(Self::FinalReview),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Abandoned)
    }

    /// Statuses at which the engine has yielded and waits for a human.
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::PlanReview | Self::FinalReview)
    }
}

/// One workflow execution for a single URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub url: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            status: RunStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}
