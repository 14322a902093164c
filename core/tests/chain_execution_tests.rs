// tests/chain_execution_tests.rs
mod common;

use common::*;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stepchain::{
  blocking_generator_fn, generator_fn, no_inputs, Chain, ChainOutcome, GenerationFailureKind, Step, StepConfig,
  StepError,
};

#[tokio::test]
#[serial]
async fn test_single_step_documentation_scenario() {
  setup_tracing();
  let chain = Chain::from_steps(vec![Step::new("documentation", "Doc for: {code}")]).unwrap();
  let gen = ScriptedGenerator::new(&[("Doc for: def f(): pass", "OK")]);

  let ctx = chain.execute(&gen, [("code", "def f(): pass")]).await;

  assert_eq!(ctx.success_count(), 1);
  assert_eq!(ctx.failure_count(), 0);
  assert_eq!(ctx.get_output("documentation"), Some("OK"));
  assert!(ctx.is_complete());
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Completed));
  assert_eq!(ctx.chain_error(), None);
}

#[tokio::test]
#[serial]
async fn test_dependency_output_is_substituted_verbatim() {
  setup_tracing();
  let chain = Chain::new(
    "two_steps",
    vec![
      Step::new("S1", "describe {code}"),
      Step::new("S2", "first: {S1} / again: {S1}").depends_on(["S1"]),
    ],
  )
  .unwrap();
  let gen = ScriptedGenerator::new(&[
    ("describe x", "a tidy function"),
    ("first: a tidy function / again: a tidy function", "final"),
  ]);

  let ctx = chain.execute(&gen, [("code", "x")]).await;

  assert_eq!(ctx.success_count(), 2);
  assert_eq!(ctx.get_output("S2"), Some("final"));
  let prompts = gen.received();
  assert_eq!(prompts.len(), 2);
  assert_eq!(prompts[1].matches("a tidy function").count(), 2);
  assert_eq!(ctx.execution_order(), vec!["S1", "S2"]);
  assert_eq!(ctx.chain_name(), Some("two_steps"));
}

#[tokio::test]
#[serial]
async fn test_steps_run_in_dependency_order_not_insertion_order() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("report", "R[{summary}|{review}]", &["summary", "review"]),
    quick_step("review", "V[{summary_output}]", &["summary"]),
    quick_step("summary", "S[{code}]", &[]),
  ])
  .unwrap();
  let gen = EchoGenerator::new();

  let ctx = chain.execute(&gen, [("code", "c")]).await;

  let order: Vec<&str> = ctx.results().iter().map(|r| r.step_name.as_str()).collect();
  assert_eq!(order, vec!["summary", "review", "report"]);
  assert_eq!(
    ctx.get_output("report"),
    Some("out(R[out(S[c])|out(V[out(S[c])])])")
  );
  assert_eq!(chain.step_names(), vec!["report", "review", "summary"]);
}

#[tokio::test]
#[serial]
async fn test_fail_fast_stops_after_first_failure() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("first", "BROKEN {code}", &[]),
    quick_step("second", "fine", &[]),
  ])
  .unwrap();
  let gen = EchoGenerator::failing_on("BROKEN");

  let ctx = chain.execute(&gen, [("code", "c")]).await;

  assert_eq!(ctx.results().len(), 1);
  assert_eq!(ctx.get_failed_steps(), vec!["first"]);
  assert!(!ctx.has_result("second"));
  assert_eq!(gen.calls(), 1);
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Stopped));
  assert!(ctx.is_complete());
  assert_eq!(ctx.current_step(), None);
  match &ctx.get_result("first").unwrap().error {
    Some(StepError::GenerationFailure { kind, message, attempts, .. }) => {
      assert_eq!(*kind, GenerationFailureKind::Generator);
      assert_eq!(*attempts, 1);
      assert!(message.contains("BROKEN"));
    }
    other => panic!("Expected GenerationFailure, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_continue_policy_reports_missing_dependency() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("first", "BROKEN", &[]),
    quick_step("second", "uses {first}", &["first"]),
  ])
  .unwrap()
  .with_fail_fast(false);
  let gen = EchoGenerator::failing_on("BROKEN");

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert_eq!(ctx.results().len(), 2);
  assert_eq!(ctx.failure_count(), 2);
  assert_eq!(gen.calls(), 1);
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Completed));
  assert!(matches!(
    ctx.get_result("first").unwrap().error,
    Some(StepError::GenerationFailure { .. })
  ));
  match &ctx.get_result("second").unwrap().error {
    Some(StepError::MissingDependencyResult { missing, .. }) => assert_eq!(missing, &vec!["first".to_string()]),
    other => panic!("Expected MissingDependencyResult, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_continue_policy_runs_independent_steps_after_failure() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("a", "BROKEN", &[]),
    quick_step("b", "independent", &[]),
  ])
  .unwrap()
  .with_fail_fast(false);
  let gen = EchoGenerator::failing_on("BROKEN");

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert_eq!(ctx.success_count(), 1);
  assert_eq!(ctx.get_output("b"), Some("out(independent)"));
  assert_eq!(ctx.success_count() + ctx.failure_count(), ctx.results().len());
}

#[tokio::test]
#[serial]
async fn test_panicking_generator_is_recorded_as_step_failure() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    Step::new("crash", "x").with_config(StepConfig::default().with_retries(1, 0.0)),
    quick_step("after", "y", &[]),
  ])
  .unwrap()
  .with_fail_fast(false);
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&calls);
  let gen = generator_fn(move |prompt: String| {
    let counter = Arc::clone(&counter);
    async move {
      counter.fetch_add(1, Ordering::SeqCst);
      if prompt == "x" {
        panic!("model crashed");
      }
      Ok::<_, anyhow::Error>(format!("ok({prompt})"))
    }
  });

  let joined = tokio::spawn(async move { chain.execute(&gen, no_inputs()).await }).await;
  let ctx = joined.expect("panic must not escape Chain::execute");

  assert!(ctx.is_complete());
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Completed));
  assert_eq!(ctx.chain_error(), None);
  assert_eq!(ctx.get_output("after"), Some("ok(y)"));
  assert_eq!(calls.load(Ordering::SeqCst), 3);
  match &ctx.get_result("crash").unwrap().error {
    Some(StepError::GenerationFailure { attempts, kind, message, .. }) => {
      assert_eq!(*attempts, 2);
      assert_eq!(*kind, GenerationFailureKind::Generator);
      assert!(message.contains("model crashed"), "message was {message}");
    }
    other => panic!("Expected GenerationFailure, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_retry_succeeds_on_third_attempt() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    Step::new("flaky", "go").with_config(StepConfig::default().with_retries(2, 0.01))
  ])
  .unwrap();
  let gen = FlakyGenerator::new(2, "finally");

  let ctx = chain.execute(&gen, no_inputs()).await;

  let result = ctx.get_result("flaky").unwrap();
  assert!(result.is_success());
  assert_eq!(result.output, "finally");
  assert_eq!(result.attempt(), Some(3));
  assert_eq!(gen.calls(), 3);
  // Elapsed time covers the retry delays too.
  assert!(result.execution_time_seconds >= 0.015);
}

#[tokio::test]
#[serial]
async fn test_retries_exhausted_embed_last_error() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    Step::new("flaky", "go").with_config(StepConfig::default().with_retries(1, 0.0))
  ])
  .unwrap();
  let gen = FlakyGenerator::new(5, "never");

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert_eq!(gen.calls(), 2);
  match &ctx.get_result("flaky").unwrap().error {
    Some(StepError::GenerationFailure { attempts, message, .. }) => {
      assert_eq!(*attempts, 2);
      assert!(message.contains("transient failure #2"), "message was {message}");
    }
    other => panic!("Expected GenerationFailure, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_timeout_is_enforced_and_retried() {
  setup_tracing();
  let chain = Chain::from_steps(vec![Step::new("slow", "zzz").with_config(
    StepConfig::default().with_timeout_seconds(0.05).with_retries(1, 0.0),
  )])
  .unwrap();
  let gen = SlowGenerator::new(Duration::from_secs(5));

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert_eq!(gen.calls(), 2);
  match &ctx.get_result("slow").unwrap().error {
    Some(StepError::GenerationFailure { kind, attempts, .. }) => {
      assert_eq!(*kind, GenerationFailureKind::Timeout);
      assert_eq!(*attempts, 2);
    }
    other => panic!("Expected a timeout failure, got {:?}", other),
  }
  assert!(ctx.execution_time_seconds() < 5.0);
}

#[tokio::test]
#[serial]
async fn test_optional_step_failure_does_not_stop_fail_fast_chain() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("extra", "BROKEN", &[]).with_config(StepConfig::default().with_retries(0, 0.0).optional()),
    quick_step("main", "{code}", &[]),
  ])
  .unwrap();
  let gen = EchoGenerator::failing_on("BROKEN");

  let ctx = chain.execute(&gen, [("code", "c")]).await;

  assert_eq!(ctx.get_failed_steps(), vec!["extra"]);
  assert_eq!(ctx.get_output("main"), Some("out(c)"));
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Completed));
}

#[tokio::test]
#[serial]
async fn test_skip_on_failure_marks_result_skipped() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("extra", "BROKEN", &[]).with_config(StepConfig::default().with_retries(0, 0.0).skip_on_failure()),
    quick_step("main", "ok", &[]),
  ])
  .unwrap();
  let gen = EchoGenerator::failing_on("BROKEN");

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert!(ctx.get_result("extra").unwrap().is_skipped());
  assert!(ctx.get_result("main").unwrap().is_success());
}

#[tokio::test]
#[serial]
async fn test_missing_template_variable_lists_available_variables() {
  setup_tracing();
  let chain = Chain::from_steps(vec![
    quick_step("a", "{code}", &[]),
    quick_step("b", "{a} in {language}", &["a"]),
  ])
  .unwrap();
  let gen = EchoGenerator::new();

  let ctx = chain.execute(&gen, [("code", "c")]).await;

  assert_eq!(gen.calls(), 1);
  match &ctx.get_result("b").unwrap().error {
    Some(StepError::MissingTemplateVariable { variable, available, .. }) => {
      assert_eq!(variable, "language");
      assert_eq!(available, &vec!["a", "a_output", "code", "step_a"]);
    }
    other => panic!("Expected MissingTemplateVariable, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_step_metadata_is_merged_into_result() {
  setup_tracing();
  let chain = Chain::from_steps(vec![quick_step("a", "{code}", &[]).with_metadata("stage", "analysis")]).unwrap();
  let gen = EchoGenerator::new();

  let ctx = chain.execute(&gen, [("code", "abc")]).await;

  let meta = &ctx.get_result("a").unwrap().metadata;
  assert_eq!(meta["stage"], "analysis");
  assert_eq!(meta["attempt"], 1);
  assert_eq!(meta["prompt_length"], 3);
  assert_eq!(meta["output_length"], 8);
}

#[tokio::test]
#[serial]
async fn test_closure_generators_are_supported() {
  setup_tracing();
  let chain = Chain::from_steps(vec![quick_step("a", "{code}", &[]), quick_step("b", "{a}!", &["a"])]).unwrap();

  let async_gen = generator_fn(|prompt: String| async move { Ok::<_, anyhow::Error>(prompt.to_uppercase()) });
  let ctx = chain.execute(&async_gen, [("code", "hi")]).await;
  assert_eq!(ctx.get_output("b"), Some("HI!"));

  let blocking_gen = blocking_generator_fn(|prompt: &str| Ok(prompt.chars().rev().collect()));
  let ctx = chain.execute(&blocking_gen, [("code", "hi")]).await;
  assert_eq!(ctx.get_output("b"), Some("!hi"));
}

#[tokio::test]
#[serial]
async fn test_chain_can_be_executed_repeatedly() {
  setup_tracing();
  let chain = Chain::from_steps(vec![quick_step("a", "{code}", &[])]).unwrap();
  let gen = EchoGenerator::new();

  let first = chain.execute(&gen, [("code", "one")]).await;
  let second = chain.execute(&gen, [("code", "two")]).await;

  assert_eq!(first.get_output("a"), Some("out(one)"));
  assert_eq!(second.get_output("a"), Some("out(two)"));
  assert_eq!(first.results().len(), 1);
  assert_eq!(second.results().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_empty_chain_completes_immediately() {
  setup_tracing();
  let chain = Chain::from_steps(Vec::new()).unwrap();
  let gen = EchoGenerator::new();

  let ctx = chain.execute(&gen, no_inputs()).await;

  assert!(ctx.is_complete());
  assert!(ctx.results().is_empty());
  assert_eq!(ctx.outcome(), Some(ChainOutcome::Completed));
}
