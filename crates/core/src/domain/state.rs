use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Explore,
    Design,
    Implement,
    Verify,
    HumanApproval,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explore => "explore",
            Self::Design => "design",
            Self::Implement => "implement",
            Self::Verify => "verify",
            Self::HumanApproval => "human_approval",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "explore" => Some(Self::Explore),
            "design" => Some(Self::Design),
            "implement" => Some(Self::Implement),
            "verify" => Some(Self::Verify),
            "human_approval" => Some(Self::HumanApproval),
            _ => None,
        }
    }
}

/// Boundaries where the engine yields to a human before continuing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuspendPoint {
    /// Before Implement: the test plan awaits review.
    PlanReview,
    /// Before HumanApproval: a passing run awaits sign-off.
    FinalReview,
}

impl SuspendPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanReview => "plan_review",
            Self::FinalReview => "final_review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plan_review" => Some(Self::PlanReview),
            "final_review" => Some(Self::FinalReview),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    #[default]
    Pending,
    Passed,
    Failed,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Shared memory threaded through every phase of a run.
///
/// The state is checkpointed after each phase, so it must round-trip
/// through serde without loss. Side-channel handles (metrics, event bus)
/// live in the run context, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowState {
    /// Target URL. Immutable after creation.
    pub url: String,
    /// Raw page markup as returned by the browser.
    pub raw_markup: String,
    /// Simplified markup produced by the DOM cleaner.
    pub cleaned_markup: String,
    /// Path to the exploration screenshot, if one was captured.
    pub screenshot_path: Option<String>,
    /// LLM analysis of the page.
    pub page_summary: String,
    /// Current test plan. Revised in place when feedback arrives.
    pub test_plan: String,
    /// Generated test script, fence-stripped and directly executable.
    pub generated_code: String,
    /// Combined stdout/stderr of the last sandbox execution.
    pub execution_log: String,
    pub verification: VerificationResult,
    /// Number of Verify executions in the current design cycle.
    pub attempt_count: u32,
    /// Failure detail from the last Verify, consumed by Implement.
    pub system_feedback: String,
    /// Last human critique, consumed and cleared by Design.
    pub user_feedback: String,
    /// Set only by explicit human approval at the final checkpoint.
    pub approved: bool,
}

impl WorkflowState {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            raw_markup: String::new(),
            cleaned_markup: String::new(),
            screenshot_path: None,
            page_summary: String::new(),
            test_plan: String::new(),
            generated_code: String::new(),
            execution_log: String::new(),
            verification: VerificationResult::Pending,
            attempt_count: 0,
            system_feedback: String::new(),
            user_feedback: String::new(),
            approved: false,
        }
    }
}

/// Sparse update returned by a phase, applied atomically by the engine.
///
/// Merge semantics are explicit per field: `Some` overwrites, `None`
/// leaves the field untouched, and the `clear_*` flags implement the
/// consume-then-clear contract that a generic merge would lose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub raw_markup: Option<String>,
    pub cleaned_markup: Option<String>,
    pub screenshot_path: Option<Option<String>>,
    pub page_summary: Option<String>,
    pub test_plan: Option<String>,
    pub generated_code: Option<String>,
    pub execution_log: Option<String>,
    pub verification: Option<VerificationResult>,
    pub attempt_count: Option<u32>,
    pub system_feedback: Option<String>,
    pub user_feedback: Option<String>,
    pub approved: Option<bool>,
    /// Design consumed `user_feedback`; reset it to empty.
    pub clear_user_feedback: bool,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, state: &mut WorkflowState) {
        if let Some(v) = &self.raw_markup {
            state.raw_markup = v.clone();
        }
        if let Some(v) = &self.cleaned_markup {
            state.cleaned_markup = v.clone();
        }
        if let Some(v) = &self.screenshot_path {
            state.screenshot_path = v.clone();
        }
        if let Some(v) = &self.page_summary {
            state.page_summary = v.clone();
        }
        if let Some(v) = &self.test_plan {
            state.test_plan = v.clone();
        }
        if let Some(v) = &self.generated_code {
            state.generated_code = v.clone();
        }
        if let Some(v) = &self.execution_log {
            state.execution_log = v.clone();
        }
        if let Some(v) = self.verification {
            state.verification = v;
        }
        if let Some(v) = self.attempt_count {
            state.attempt_count = v;
        }
        if let Some(v) = &self.system_feedback {
            state.system_feedback = v.clone();
        }
        if let Some(v) = &self.user_feedback {
            state.user_feedback = v.clone();
        }
        if let Some(v) = self.approved {
            state.approved = v;
        }
        if self.clear_user_feedback {
            state.user_feedback.clear();
        }
    }
}
