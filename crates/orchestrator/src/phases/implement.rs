use async_trait::async_trait;
use testpilot_core::{Run, StateUpdate, WorkflowPhase, WorkflowState};
use tracing::info;

use crate::code_parser::strip_code_fences;
use crate::context::RunContext;
use crate::error::Result;
use crate::phases::Phase;
use crate::prompts::PhasePrompts;

/// Turns the test plan into a runnable script.
///
/// On a retry, the failure detail from the previous Verify is included
/// in the prompt so the model fixes the script instead of regenerating
/// it blind.
pub struct ImplementPhase;

#[async_trait]
impl Phase for ImplementPhase {
    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Implement
    }

    async fn run(
        &self,
        ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate> {
        info!(
            run_id = %run.id,
            attempt = state.attempt_count,
            retrying = !state.system_feedback.is_empty(),
            "implementing test script"
        );

        let feedback = combined_feedback(state);
        let prompt = PhasePrompts::implement(
            &state.url,
            &state.test_plan,
            &state.cleaned_markup,
            &feedback,
        );

        let generated = ctx.generator.generate(&prompt).await?;
        ctx.metrics.add_tokens(generated.tokens);

        let code = strip_code_fences(&generated.text);
        ctx.metrics.log_step("Implementation");

        Ok(StateUpdate {
            generated_code: Some(code),
            ..Default::default()
        })
    }
}

/// Union of automated and human critique for the generation prompt.
fn combined_feedback(state: &WorkflowState) -> String {
    let mut feedback = String::new();
    if !state.system_feedback.is_empty() {
        feedback.push_str("Previous execution errors:\n");
        feedback.push_str(&state.system_feedback);
    }
    let user = state.user_feedback.trim();
    if !user.is_empty() {
        if !feedback.is_empty() {
            feedback.push('\n');
        }
        feedback.push_str("Reviewer notes:\n");
        feedback.push_str(user);
    }
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_feedback_union() {
        let mut state = WorkflowState::new("https://example.test");
        assert!(combined_feedback(&state).is_empty());

        state.system_feedback = "TimeoutError on #submit".to_string();
        state.user_feedback = "use the data-test locator".to_string();
        let combined = combined_feedback(&state);

        assert!(combined.contains("TimeoutError on #submit"));
        assert!(combined.contains("use the data-test locator"));
    }
}
