use async_trait::async_trait;
use testpilot_core::{Run, StateUpdate, WorkflowPhase, WorkflowState};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::Result;
use crate::phases::Phase;
use crate::prompts::PhasePrompts;

/// Opens the target page, captures and simplifies its markup, and asks
/// the model what the page is about.
///
/// Exploration degrades rather than aborts: a navigation failure or an
/// empty page yields a placeholder summary, and later phases work with
/// whatever survived.
pub struct ExplorePhase;

#[async_trait]
impl Phase for ExplorePhase {
    fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::Explore
    }

    async fn run(
        &self,
        ctx: &RunContext,
        run: &Run,
        state: &WorkflowState,
    ) -> Result<StateUpdate> {
        info!(run_id = %run.id, url = %state.url, "exploring page");

        let (raw_markup, nav_diagnostic) = match ctx.navigator.navigate(&state.url).await {
            Ok(()) => (ctx.navigator.content().await?, None),
            Err(diagnostic) => {
                warn!(run_id = %run.id, error = %diagnostic, "navigation failed");
                (String::new(), Some(diagnostic))
            }
        };

        let cleaned_markup = if raw_markup.is_empty() {
            String::new()
        } else {
            ctx.summarizer
                .clean(&raw_markup, ctx.config.dom_token_budget)
        };

        let screenshot_path = ctx.navigator.screenshot(&format!("{}.png", run.id)).await;
        if screenshot_path.is_none() {
            warn!(run_id = %run.id, "screenshot capture failed, continuing without it");
        }

        let page_summary = if cleaned_markup.is_empty() {
            match nav_diagnostic {
                Some(diagnostic) => format!("Page summary unavailable: {diagnostic}"),
                None => "Page summary unavailable: the page returned no markup".to_string(),
            }
        } else {
            let generated = ctx
                .generator
                .generate(&PhasePrompts::page_analysis(&cleaned_markup))
                .await?;
            ctx.metrics.add_tokens(generated.tokens);
            generated.text
        };

        ctx.metrics.log_step("Exploration");
        info!(
            run_id = %run.id,
            markup_bytes = raw_markup.len(),
            cleaned_bytes = cleaned_markup.len(),
            "exploration complete"
        );

        Ok(StateUpdate {
            raw_markup: Some(raw_markup),
            cleaned_markup: Some(cleaned_markup),
            screenshot_path: Some(screenshot_path),
            page_summary: Some(page_summary),
            // a fresh exploration starts a fresh attempt budget
            attempt_count: Some(0),
            ..Default::default()
        })
    }
}
