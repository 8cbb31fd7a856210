use std::time::Duration;

use events::Event;
use testpilot_core::{
    Checkpoint, Run, RunStatus, StepSample, SuspendPoint, VerificationResult, WorkflowPhase,
    WorkflowState,
};
use tracing::{error, info};

use crate::context::RunContext;
use crate::error::{OrchestratorError, Result};
use crate::phases::phase_impl;
use crate::router::{route, terminal_status, Decision, RouterEntry};

/// What a human supplies when resuming a suspended run.
///
/// An empty patch means "continue as planned". `approved` is only
/// honored at the final-review checkpoint; consent at plan review is
/// expressed by resuming without a critique.
#[derive(Debug, Clone, Default)]
pub struct HumanPatch {
    pub user_feedback: Option<String>,
    pub approved: Option<bool>,
    /// Grant a fresh attempt budget for the next design cycle.
    pub reset_attempts: bool,
}

impl HumanPatch {
    pub fn is_empty(&self) -> bool {
        self.user_feedback.is_none() && self.approved.is_none() && !self.reset_attempts
    }

    pub fn feedback(text: impl Into<String>) -> Self {
        Self {
            user_feedback: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn approve() -> Self {
        Self {
            approved: Some(true),
            ..Default::default()
        }
    }
}

/// Final accounting for a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: uuid::Uuid,
    pub url: String,
    pub status: RunStatus,
    pub verification: VerificationResult,
    pub attempt_count: u32,
    pub test_plan: String,
    pub generated_code: String,
    pub execution_log: String,
    pub screenshot_path: Option<String>,
    pub total_tokens: u64,
    pub duration: Duration,
    pub steps: Vec<StepSample>,
}

/// Outcome of driving the workflow as far as it can go on its own.
#[derive(Debug)]
pub enum EngineStatus {
    Completed(RunReport),
    /// Parked at a human checkpoint; resume with [`WorkflowEngine::resume`].
    Suspended { run: Run, point: SuspendPoint },
}

/// Drives a run through explore, design, implement and verify, applying
/// each phase's update atomically and checkpointing at every boundary.
pub struct WorkflowEngine {
    ctx: RunContext,
}

impl WorkflowEngine {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Create a run for `url` and drive it until it completes or
    /// suspends at a human checkpoint.
    pub async fn start(&self, url: &str) -> Result<EngineStatus> {
        validate_url(url)?;

        let mut run = Run::new(url);
        if let Some(repository) = &self.ctx.run_repository {
            repository.create(&run).await?;
        }
        self.ctx.emit(Event::RunCreated {
            run_id: run.id,
            url: url.to_string(),
        });
        info!(run_id = %run.id, url, "run created");

        let mut state = WorkflowState::new(url);
        self.drive(&mut run, &mut state, WorkflowPhase::Explore).await
    }

    /// Resume a suspended run, applying the human patch to the
    /// checkpointed state before routing.
    pub async fn resume(&self, mut run: Run, patch: HumanPatch) -> Result<EngineStatus> {
        let checkpoint = self
            .ctx
            .checkpoints
            .load(run.id)
            .await?
            .ok_or(OrchestratorError::CheckpointNotFound(run.id))?;
        let point = checkpoint
            .suspended
            .ok_or(OrchestratorError::RunNotSuspended(run.id))?;
        let mut state = checkpoint.state;

        let with_patch = !patch.is_empty();
        if let Some(feedback) = patch.user_feedback {
            state.user_feedback = feedback;
        }
        // Approval is only meaningful where there is a result to approve.
        if point == SuspendPoint::FinalReview {
            if let Some(approved) = patch.approved {
                state.approved = approved;
            }
        }
        if patch.reset_attempts {
            state.attempt_count = 0;
        }

        self.ctx.emit(Event::RunResumed {
            run_id: run.id,
            point: point.as_str().to_string(),
            with_patch,
        });
        info!(run_id = %run.id, point = point.as_str(), with_patch, "run resumed");

        match point {
            SuspendPoint::PlanReview => {
                match route(RouterEntry::PlanReview, &state, self.ctx.config.max_attempts) {
                    Decision::Continue(phase) => {
                        if phase == WorkflowPhase::Implement {
                            // Consent by keyword is not a critique.
                            state.user_feedback.clear();
                        }
                        self.drive(&mut run, &mut state, phase).await
                    }
                    Decision::Terminate => self.finish(&mut run, &state).await,
                }
            }
            SuspendPoint::FinalReview => {
                self.drive(&mut run, &mut state, WorkflowPhase::HumanApproval)
                    .await
            }
        }
    }

    /// Abandon a run: mark it terminal and drop its checkpoints.
    pub async fn abandon(&self, run: &mut Run) -> Result<()> {
        self.ctx.transition(run, RunStatus::Abandoned).await?;
        self.ctx.checkpoints.clear(run.id).await?;
        self.ctx.emit(Event::RunCompleted {
            run_id: run.id,
            status: RunStatus::Abandoned.as_str().to_string(),
        });
        info!(run_id = %run.id, "run abandoned");
        Ok(())
    }

    /// Execute phases until the router terminates the run or a suspend
    /// gate yields to a human.
    async fn drive(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        entry: WorkflowPhase,
    ) -> Result<EngineStatus> {
        let mut current = entry;
        let mut previous: Option<WorkflowPhase> = None;

        loop {
            if let Some((completed, point)) = self.gate(current, previous) {
                return self.suspend(run, state, completed, point).await;
            }

            self.execute(run, state, current).await?;

            let decision = match current {
                WorkflowPhase::Explore => Decision::Continue(WorkflowPhase::Design),
                WorkflowPhase::Design => Decision::Continue(WorkflowPhase::Implement),
                WorkflowPhase::Implement => Decision::Continue(WorkflowPhase::Verify),
                WorkflowPhase::Verify => {
                    route(RouterEntry::Verify, state, self.ctx.config.max_attempts)
                }
                WorkflowPhase::HumanApproval => route(
                    RouterEntry::HumanApproval,
                    state,
                    self.ctx.config.max_attempts,
                ),
            };

            match decision {
                Decision::Continue(next) => {
                    previous = Some(current);
                    current = next;
                }
                Decision::Terminate => {
                    let needs_sign_off = current == WorkflowPhase::Verify
                        && state.verification == VerificationResult::Passed
                        && !state.approved
                        && self.ctx.config.require_final_approval;
                    if needs_sign_off {
                        previous = Some(current);
                        current = WorkflowPhase::HumanApproval;
                    } else {
                        return self.finish(run, state).await;
                    }
                }
            }
        }
    }

    /// Suspend gates sit on the edges Design -> Implement and
    /// Verify -> HumanApproval. Retries entering Implement from Verify
    /// pass through without suspending.
    fn gate(
        &self,
        next: WorkflowPhase,
        previous: Option<WorkflowPhase>,
    ) -> Option<(WorkflowPhase, SuspendPoint)> {
        match (previous, next) {
            (Some(WorkflowPhase::Design), WorkflowPhase::Implement)
                if self.ctx.config.require_plan_approval =>
            {
                Some((WorkflowPhase::Design, SuspendPoint::PlanReview))
            }
            (Some(WorkflowPhase::Verify), WorkflowPhase::HumanApproval)
                if self.ctx.config.require_final_approval =>
            {
                Some((WorkflowPhase::Verify, SuspendPoint::FinalReview))
            }
            _ => None,
        }
    }

    async fn execute(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        phase: WorkflowPhase,
    ) -> Result<()> {
        if let Some(status) = active_status(phase) {
            self.ctx.transition(run, status).await?;
        }
        self.ctx.emit(Event::PhaseStarted {
            run_id: run.id,
            phase: phase.as_str().to_string(),
        });

        let update = match phase_impl(phase).run(&self.ctx, run, state).await {
            Ok(update) => update,
            Err(e) => {
                error!(run_id = %run.id, phase = phase.as_str(), error = %e, "phase failed");
                self.ctx.emit(Event::PhaseCompleted {
                    run_id: run.id,
                    phase: phase.as_str().to_string(),
                    success: false,
                });
                self.ctx.emit(Event::Error {
                    message: e.to_string(),
                    context: Some(phase.as_str().to_string()),
                });
                return Err(e);
            }
        };

        update.apply_to(state);
        self.ctx
            .checkpoints
            .save(&Checkpoint::new(run.id, phase, state.clone()))
            .await?;
        self.ctx.emit(Event::PhaseCompleted {
            run_id: run.id,
            phase: phase.as_str().to_string(),
            success: true,
        });
        Ok(())
    }

    async fn suspend(
        &self,
        run: &mut Run,
        state: &WorkflowState,
        completed: WorkflowPhase,
        point: SuspendPoint,
    ) -> Result<EngineStatus> {
        let status = match point {
            SuspendPoint::PlanReview => RunStatus::PlanReview,
            SuspendPoint::FinalReview => RunStatus::FinalReview,
        };
        self.ctx.transition(run, status).await?;

        let checkpoint =
            Checkpoint::new(run.id, completed, state.clone()).suspended_at(point);
        self.ctx.checkpoints.save(&checkpoint).await?;

        self.ctx.emit(Event::RunSuspended {
            run_id: run.id,
            point: point.as_str().to_string(),
        });
        info!(run_id = %run.id, point = point.as_str(), "run suspended for review");

        Ok(EngineStatus::Suspended {
            run: run.clone(),
            point,
        })
    }

    async fn finish(&self, run: &mut Run, state: &WorkflowState) -> Result<EngineStatus> {
        let status = terminal_status(state);
        self.ctx.transition(run, status).await?;
        self.ctx.emit(Event::RunCompleted {
            run_id: run.id,
            status: status.as_str().to_string(),
        });

        let snapshot = self.ctx.metrics.snapshot();
        info!(
            run_id = %run.id,
            status = status.as_str(),
            attempts = state.attempt_count,
            tokens = snapshot.total_tokens,
            "run finished"
        );

        Ok(EngineStatus::Completed(RunReport {
            run_id: run.id,
            url: state.url.clone(),
            status,
            verification: state.verification,
            attempt_count: state.attempt_count,
            test_plan: state.test_plan.clone(),
            generated_code: state.generated_code.clone(),
            execution_log: state.execution_log.clone(),
            screenshot_path: state.screenshot_path.clone(),
            total_tokens: snapshot.total_tokens,
            duration: snapshot.duration,
            steps: snapshot.steps,
        }))
    }
}

fn active_status(phase: WorkflowPhase) -> Option<RunStatus> {
    match phase {
        WorkflowPhase::Explore => Some(RunStatus::Exploring),
        WorkflowPhase::Design => Some(RunStatus::Designing),
        WorkflowPhase::Implement => Some(RunStatus::Implementing),
        WorkflowPhase::Verify => Some(RunStatus::Verifying),
        // The run is already parked at final_review.
        WorkflowPhase::HumanApproval => None,
    }
}

fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(OrchestratorError::InvalidUrl("URL is empty".to_string()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(OrchestratorError::InvalidUrl(format!(
            "'{url}' must start with http:// or https://"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://example.test").is_ok());
        assert!(validate_url("http://localhost:8080/login").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("ftp://example.test").is_err());
        assert!(validate_url("example.test").is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(HumanPatch::default().is_empty());
        assert!(!HumanPatch::feedback("add a check").is_empty());
        assert!(!HumanPatch::approve().is_empty());
    }
}
