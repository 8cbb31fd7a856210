//! End-to-end engine tests with scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orchestrator::{
    DomCleaner, EngineConfig, EngineStatus, Generated, Generator, HumanPatch, Navigator,
    OrchestratorError, RunContext, Sandbox, WorkflowEngine,
};
use testpilot_core::{
    CheckpointStore, MemoryCheckpointStore, Run, RunStatus, SuspendPoint, VerificationResult,
};

const PAGE_HTML: &str = r#"<html><head><script>window.x=1</script></head>
<body><form id="login"><input name="user"><input name="pass" type="password">
<button id="submit">Sign in</button></form></body></html>"#;

const PASS_LOG: &str = "step 1 ok\nstep 2 ok\nTEST PASSED\n";
const FAIL_LOG: &str =
    "Traceback (most recent call last):\nTimeoutError: waiting for selector \"#submit\"\n";

struct FakeNavigator {
    fail_navigation: bool,
}

impl FakeNavigator {
    fn working() -> Self {
        Self {
            fail_navigation: false,
        }
    }

    fn broken() -> Self {
        Self {
            fail_navigation: true,
        }
    }
}

#[async_trait]
impl Navigator for FakeNavigator {
    async fn navigate(&self, _url: &str) -> Result<(), String> {
        if self.fail_navigation {
            Err("net::ERR_NAME_NOT_RESOLVED".to_string())
        } else {
            Ok(())
        }
    }

    async fn content(&self) -> orchestrator::Result<String> {
        Ok(PAGE_HTML.to_string())
    }

    async fn screenshot(&self, file_name: &str) -> Option<String> {
        if self.fail_navigation {
            None
        } else {
            Some(format!("shots/{file_name}"))
        }
    }
}

/// Answers each prompt kind with canned text and records every prompt.
#[derive(Default)]
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> orchestrator::Result<Generated> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let text = if prompt.contains("analyzing a web page") {
            "A login form with username, password and a submit button.".to_string()
        } else if prompt.contains("revising a test plan") {
            "1. Open the page\n2. Log in\n3. Verify logout works".to_string()
        } else if prompt.contains("designing an automated test") {
            "1. Open the page\n2. Log in".to_string()
        } else {
            "```python\nprint('running')\n```".to_string()
        };
        Ok(Generated { text, tokens: 100 })
    }
}

/// Returns scripted outputs in order, repeating the last one.
struct ScriptedSandbox {
    outputs: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: AtomicU32,
}

impl ScriptedSandbox {
    fn sequence(outputs: &[&str]) -> Self {
        Self {
            outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
            last: Mutex::new(outputs.last().map(|s| s.to_string()).unwrap_or_default()),
            calls: AtomicU32::new(0),
        }
    }

    fn always(output: &str) -> Self {
        Self::sequence(&[output])
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn run(&self, _code: &str) -> orchestrator::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.outputs.lock().unwrap().pop_front();
        match next {
            Some(output) => {
                *self.last.lock().unwrap() = output.clone();
                Ok(output)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

struct Harness {
    engine: WorkflowEngine,
    generator: Arc<ScriptedGenerator>,
    sandbox: Arc<ScriptedSandbox>,
    checkpoints: Arc<MemoryCheckpointStore>,
}

fn harness(navigator: FakeNavigator, sandbox: ScriptedSandbox, config: EngineConfig) -> Harness {
    let generator = Arc::new(ScriptedGenerator::default());
    let sandbox = Arc::new(sandbox);
    let checkpoints = Arc::new(MemoryCheckpointStore::new());

    let ctx = RunContext::new(
        Arc::new(navigator),
        Arc::new(DomCleaner),
        generator.clone(),
        sandbox.clone(),
    )
    .with_config(config)
    .with_checkpoint_store(checkpoints.clone());

    Harness {
        engine: WorkflowEngine::new(ctx),
        generator,
        sandbox,
        checkpoints,
    }
}

fn expect_suspended(status: EngineStatus, expected: SuspendPoint) -> Run {
    match status {
        EngineStatus::Suspended { run, point } => {
            assert_eq!(point, expected);
            run
        }
        EngineStatus::Completed(report) => {
            panic!("expected suspension at {expected:?}, run completed as {:?}", report.status)
        }
    }
}

fn expect_completed(status: EngineStatus) -> orchestrator::RunReport {
    match status {
        EngineStatus::Completed(report) => report,
        EngineStatus::Suspended { point, .. } => panic!("unexpected suspension at {point:?}"),
    }
}

#[tokio::test]
async fn autonomous_run_passes_first_attempt() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::autonomous(),
    );

    let report = expect_completed(h.engine.start("https://example.test/login").await.unwrap());

    assert_eq!(report.status, RunStatus::Passed);
    assert_eq!(report.verification, VerificationResult::Passed);
    assert_eq!(report.attempt_count, 1);
    assert_eq!(h.sandbox.call_count(), 1);
    // fences are stripped before execution
    assert_eq!(report.generated_code, "print('running')");
    assert!(report.execution_log.contains("TEST PASSED"));
    assert!(report.screenshot_path.is_some());
    // explore + design + implement prompts, 100 tokens each
    assert_eq!(report.total_tokens, 300);
}

#[tokio::test]
async fn retries_until_marker_appears() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::sequence(&[FAIL_LOG, FAIL_LOG, PASS_LOG]),
        EngineConfig::autonomous(),
    );

    let report = expect_completed(h.engine.start("https://example.test").await.unwrap());

    assert_eq!(report.status, RunStatus::Passed);
    assert_eq!(report.attempt_count, 3);
    assert_eq!(h.sandbox.call_count(), 3);

    // the second and third implement prompts carried the failure detail
    let retry_prompts = h.generator.prompts_containing("TimeoutError");
    assert_eq!(retry_prompts.len(), 2);
}

#[tokio::test]
async fn exhausted_attempts_fail_the_run() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(FAIL_LOG),
        EngineConfig::autonomous(),
    );

    let report = expect_completed(h.engine.start("https://example.test").await.unwrap());

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.verification, VerificationResult::Failed);
    assert_eq!(report.attempt_count, 3);
    // exactly the attempt budget, never a fourth execution
    assert_eq!(h.sandbox.call_count(), 3);
    assert!(report.execution_log.contains("TimeoutError"));
}

#[tokio::test]
async fn plan_review_feedback_revises_the_plan() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default().with_final_approval(false),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::PlanReview,
    );
    assert_eq!(run.status, RunStatus::PlanReview);
    assert_eq!(
        h.checkpoints.pending_suspend(run.id).await.unwrap(),
        Some(SuspendPoint::PlanReview)
    );

    // critique routes back to Design, which suspends again for review
    let run = expect_suspended(
        h.engine
            .resume(run, HumanPatch::feedback("add a logout check"))
            .await
            .unwrap(),
        SuspendPoint::PlanReview,
    );

    let revisions = h.generator.prompts_containing("revising a test plan");
    assert_eq!(revisions.len(), 1);
    assert!(revisions[0].contains("add a logout check"));
    assert!(revisions[0].contains("1. Open the page\n2. Log in"));

    // feedback was consumed and cleared
    let checkpoint = h.checkpoints.load(run.id).await.unwrap().unwrap();
    assert!(checkpoint.state.user_feedback.is_empty());
    assert!(checkpoint.state.test_plan.contains("logout"));

    let report = expect_completed(h.engine.resume(run, HumanPatch::default()).await.unwrap());
    assert_eq!(report.status, RunStatus::Passed);
    assert!(report.test_plan.contains("logout"));
}

#[tokio::test]
async fn approval_keyword_proceeds_to_implement() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default().with_final_approval(false),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::PlanReview,
    );

    let report = expect_completed(
        h.engine
            .resume(run, HumanPatch::feedback("Approve, looks good"))
            .await
            .unwrap(),
    );

    assert_eq!(report.status, RunStatus::Passed);
    // the keyword never triggered a redesign
    assert!(h.generator.prompts_containing("revising a test plan").is_empty());
}

#[tokio::test]
async fn empty_patch_resume_is_plain_continue() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default().with_final_approval(false),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::PlanReview,
    );
    let report = expect_completed(h.engine.resume(run, HumanPatch::default()).await.unwrap());

    assert_eq!(report.status, RunStatus::Passed);
    // design ran exactly once, before the suspension
    assert_eq!(
        h.generator
            .prompts_containing("designing an automated test")
            .len(),
        1
    );
}

#[tokio::test]
async fn final_review_approval_completes_the_run() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default().with_plan_approval(false),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::FinalReview,
    );
    assert_eq!(run.status, RunStatus::FinalReview);

    let report = expect_completed(h.engine.resume(run, HumanPatch::approve()).await.unwrap());
    assert_eq!(report.status, RunStatus::Passed);
    assert_eq!(report.attempt_count, 1);
}

#[tokio::test]
async fn final_review_critique_starts_a_new_design_cycle() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default().with_plan_approval(false),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::FinalReview,
    );

    // the critique loops back through Design and the run passes again
    let run = expect_suspended(
        h.engine
            .resume(run, HumanPatch::feedback("also cover the error banner"))
            .await
            .unwrap(),
        SuspendPoint::FinalReview,
    );
    assert_eq!(h.sandbox.call_count(), 2);

    let revisions = h.generator.prompts_containing("revising a test plan");
    assert_eq!(revisions.len(), 1);
    assert!(revisions[0].contains("also cover the error banner"));

    let report = expect_completed(h.engine.resume(run, HumanPatch::approve()).await.unwrap());
    assert_eq!(report.status, RunStatus::Passed);
}

#[tokio::test]
async fn attempts_survive_review_unless_reset() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::sequence(&[FAIL_LOG, PASS_LOG]),
        EngineConfig::default(),
    );

    let run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::PlanReview,
    );
    // fail once, pass on the second attempt, park at final review
    let run = expect_suspended(
        h.engine.resume(run, HumanPatch::default()).await.unwrap(),
        SuspendPoint::FinalReview,
    );
    let checkpoint = h.checkpoints.load(run.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.state.attempt_count, 2);

    // a critique alone preserves the counter; reset_attempts clears it
    let run = expect_suspended(
        h.engine
            .resume(
                run,
                HumanPatch {
                    user_feedback: Some("tighten the assertions".to_string()),
                    approved: None,
                    reset_attempts: true,
                },
            )
            .await
            .unwrap(),
        SuspendPoint::PlanReview,
    );

    let checkpoint = h.checkpoints.load(run.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.state.attempt_count, 0);
}

#[tokio::test]
async fn degraded_exploration_still_produces_a_run() {
    let h = harness(
        FakeNavigator::broken(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::autonomous(),
    );

    let report = expect_completed(h.engine.start("https://unreachable.test").await.unwrap());

    assert_eq!(report.status, RunStatus::Passed);
    assert!(report.screenshot_path.is_none());

    // the placeholder summary carried the navigation diagnostic into Design
    let designs = h.generator.prompts_containing("designing an automated test");
    assert_eq!(designs.len(), 1);
    assert!(designs[0].contains("Page summary unavailable"));
    assert!(designs[0].contains("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test]
async fn resume_rejects_runs_that_are_not_suspended() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::autonomous(),
    );

    let report = expect_completed(h.engine.start("https://example.test").await.unwrap());
    let finished = Run::new("https://example.test").with_id(report.run_id);

    let result = h.engine.resume(finished, HumanPatch::default()).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::RunNotSuspended(_))
    ));

    let unknown = Run::new("https://example.test");
    let result = h.engine.resume(unknown, HumanPatch::default()).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::CheckpointNotFound(_))
    ));
}

#[tokio::test]
async fn abandon_clears_checkpoints() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::default(),
    );

    let mut run = expect_suspended(
        h.engine.start("https://example.test").await.unwrap(),
        SuspendPoint::PlanReview,
    );

    h.engine.abandon(&mut run).await.unwrap();

    assert_eq!(run.status, RunStatus::Abandoned);
    assert!(h.checkpoints.load(run.id).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_url_is_rejected_before_any_phase() {
    let h = harness(
        FakeNavigator::working(),
        ScriptedSandbox::always(PASS_LOG),
        EngineConfig::autonomous(),
    );

    let result = h.engine.start("not-a-url").await;
    assert!(matches!(result, Err(OrchestratorError::InvalidUrl(_))));
    assert_eq!(h.sandbox.call_count(), 0);
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn event_stream_reflects_the_workflow() {
    let generator = Arc::new(ScriptedGenerator::default());
    let sandbox = Arc::new(ScriptedSandbox::always(PASS_LOG));
    let bus = events::EventBus::new();
    let mut rx = bus.subscribe();

    let ctx = RunContext::new(
        Arc::new(FakeNavigator::working()),
        Arc::new(DomCleaner),
        generator,
        sandbox,
    )
    .with_config(EngineConfig::autonomous())
    .with_event_bus(bus);

    let engine = WorkflowEngine::new(ctx);
    let report = expect_completed(engine.start("https://example.test").await.unwrap());

    let mut kinds = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        kinds.push(serde_json::to_value(&envelope.event).unwrap()["type"]
            .as_str()
            .unwrap()
            .to_string());
    }

    assert_eq!(kinds.first().map(String::as_str), Some("run.created"));
    assert!(kinds.iter().any(|k| k == "phase.started"));
    assert!(kinds.iter().any(|k| k == "verification.completed"));
    assert_eq!(kinds.last().map(String::as_str), Some("run.completed"));
    assert_eq!(report.status, RunStatus::Passed);
}
