use std::sync::Arc;

use db::RunRepository;
use events::{Event, EventBus, EventEnvelope};
use testpilot_core::{CheckpointStore, MemoryCheckpointStore, Metrics, Run, RunStatus};
use tracing::info;

use crate::collaborators::{Generator, Navigator, Sandbox, Summarizer};
use crate::error::Result;
use crate::router::{RunStateMachine, MAX_ATTEMPTS};

/// Engine tunables. Defaults mirror production behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Suspend before Implement so a human can review the plan.
    pub require_plan_approval: bool,
    /// Suspend after a passing Verify for final sign-off.
    pub require_final_approval: bool,
    /// Verify executions allowed per design cycle.
    pub max_attempts: u32,
    /// Token budget handed to the DOM cleaner.
    pub dom_token_budget: usize,
    /// How much of a failing execution log is fed back into prompts.
    pub log_tail_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            require_plan_approval: true,
            require_final_approval: true,
            max_attempts: MAX_ATTEMPTS,
            dom_token_budget: 8_000,
            log_tail_chars: 2_000,
        }
    }
}

impl EngineConfig {
    /// Fully automatic mode: no human checkpoints.
    pub fn autonomous() -> Self {
        Self {
            require_plan_approval: false,
            require_final_approval: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_plan_approval(mut self, required: bool) -> Self {
        self.require_plan_approval = required;
        self
    }

    pub fn with_final_approval(mut self, required: bool) -> Self {
        self.require_final_approval = required;
        self
    }
}

/// Everything a phase needs: collaborators, persistence, observability.
#[derive(Clone)]
pub struct RunContext {
    pub config: EngineConfig,
    pub navigator: Arc<dyn Navigator>,
    pub summarizer: Arc<dyn Summarizer>,
    pub generator: Arc<dyn Generator>,
    pub sandbox: Arc<dyn Sandbox>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Optional run persistence; in-memory runs skip it.
    pub run_repository: Option<Arc<RunRepository>>,
    pub event_bus: Option<EventBus>,
    pub metrics: Metrics,
}

impl RunContext {
    pub fn new(
        navigator: Arc<dyn Navigator>,
        summarizer: Arc<dyn Summarizer>,
        generator: Arc<dyn Generator>,
        sandbox: Arc<dyn Sandbox>,
    ) -> Self {
        Self {
            config: EngineConfig::default(),
            navigator,
            summarizer,
            generator,
            sandbox,
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            run_repository: None,
            event_bus: None,
            metrics: Metrics::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn with_run_repository(mut self, repository: Arc<RunRepository>) -> Self {
        self.run_repository = Some(repository);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.publish(EventEnvelope::new(event));
        }
    }

    /// Validated status transition, persisted and announced.
    pub async fn transition(&self, run: &mut Run, to: RunStatus) -> Result<()> {
        let from = run.status;
        if from == to {
            return Ok(());
        }
        RunStateMachine::validate(from, to)?;

        run.status = to;
        run.updated_at = chrono::Utc::now();

        if let Some(repository) = &self.run_repository {
            repository.update_status(run.id, to).await?;
        }

        info!(
            run_id = %run.id,
            from = from.as_str(),
            to = to.as_str(),
            "run status changed"
        );
        self.emit(Event::RunStatusChanged {
            run_id: run.id,
            from_status: from.as_str().to_string(),
            to_status: to.as_str().to_string(),
        });
        Ok(())
    }
}
