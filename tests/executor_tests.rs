// ABOUTME: Integration tests for classified retry behavior of the task runner
// ABOUTME: Verifies invocation counts, retry bookkeeping, and blocked reporting

use std::sync::Arc;
use std::time::Duration;

use stagecraft::executor::{
    CapabilityError, ExecutionOutput, FailureClass, RetryPolicy, TaskOutcome, TaskRunner,
};
use stagecraft::model::{ExecutionResult, TaskStatus};
use stagecraft::store::TaskStore;

mod common;
use common::{ProjectBuilder, ScriptedCapability};

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_retries, Duration::from_millis(1))
}

#[tokio::test]
async fn test_rate_limit_fails_immediately_despite_retry_budget() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("call", "hit the provider")
        .build()
        .await;
    let capability = ScriptedCapability::new(vec![Err(CapabilityError::RateLimited(
        "HTTP 429".to_string(),
    ))]);

    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone())
        .with_policy(fast_policy(10));
    let outcome = runner.run(1, 1).await.unwrap();

    // Exactly one invocation regardless of maxRetries.
    assert_eq!(capability.call_count(), 1);
    match outcome {
        TaskOutcome::Failed {
            class, attempts, ..
        } => {
            assert_eq!(class, FailureClass::RateLimit);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected rate-limit failure, got {:?}", other),
    }

    let task = store.get_task(1, 1).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 0);
}

#[tokio::test]
async fn test_transient_then_success_with_one_retry() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("flaky", "eventually works")
        .build()
        .await;
    let capability = ScriptedCapability::new(vec![
        Err(CapabilityError::Timeout("deadline".to_string())),
        Ok(ExecutionOutput::text("recovered")),
    ]);

    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone())
        .with_policy(fast_policy(1));
    let outcome = runner.run(1, 1).await.unwrap();

    // Exactly two invocations; retryCount records attempts beyond the first.
    assert_eq!(capability.call_count(), 2);
    assert!(outcome.is_completed());

    let task = store.get_task(1, 1).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.retry_count, 1);
    assert_eq!(
        task.execution_result,
        Some(ExecutionResult::text("recovered"))
    );
}

#[tokio::test]
async fn test_retry_exhaustion_keeps_last_error() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("doomed", "never works")
        .build()
        .await;
    let capability = ScriptedCapability::new(vec![
        Err(CapabilityError::Transport("reset #1".to_string())),
        Err(CapabilityError::Transport("reset #2".to_string())),
        Err(CapabilityError::Transport("reset #3".to_string())),
    ]);

    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone())
        .with_policy(fast_policy(2));
    let outcome = runner.run(1, 1).await.unwrap();

    assert_eq!(capability.call_count(), 3);
    assert!(matches!(
        outcome,
        TaskOutcome::Failed {
            class: FailureClass::Transient,
            attempts: 3,
            ..
        }
    ));

    let task = store.get_task(1, 1).await.unwrap().unwrap();
    assert_eq!(task.retry_count, 2);
    assert!(task.last_error.unwrap().contains("reset #3"));
}

#[tokio::test]
async fn test_validation_failure_never_retries() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("broken", "bad config")
        .build()
        .await;
    let capability = ScriptedCapability::new(vec![Err(CapabilityError::InvalidConfig(
        "model field is required".to_string(),
    ))]);

    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone())
        .with_policy(fast_policy(5));
    let outcome = runner.run(1, 1).await.unwrap();

    assert_eq!(capability.call_count(), 1);
    assert!(matches!(
        outcome,
        TaskOutcome::Failed {
            class: FailureClass::Fatal,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unresolved_macro_blocks_without_invocation() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("upstream", "")
        .add_dependent_task("downstream", "use {{prev}} carefully", vec![1])
        .build()
        .await;
    let capability = ScriptedCapability::echoing();

    // Upstream has not completed: downstream must not execute.
    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone());
    let outcome = runner.run(1, 2).await.unwrap();

    assert_eq!(capability.call_count(), 0);
    match outcome {
        TaskOutcome::Blocked { unresolved } => {
            assert_eq!(unresolved[0].token, "{{prev}}");
        }
        other => panic!("expected blocked, got {:?}", other),
    }
    let task = store.get_task(1, 2).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Blocked);
}

#[tokio::test]
async fn test_materialized_instruction_reaches_capability() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("first", "")
        .add_dependent_task("second", "continue from {{prev}}", vec![1])
        .build()
        .await;
    store
        .update_task_result(1, 1, ExecutionResult::text("chapter one"), 0)
        .await
        .unwrap();

    let capability = ScriptedCapability::echoing();
    let runner = TaskRunner::new(store.clone(), store.clone(), capability.clone());
    runner.run(1, 2).await.unwrap();

    let calls = capability.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], "continue from \"chapter one\"");
}

#[tokio::test]
async fn test_backoff_does_not_block_concurrent_tasks() {
    let (store, _) = ProjectBuilder::new(1)
        .add_task("slow-retry", "will retry")
        .add_task("quick", "runs alongside")
        .build()
        .await;

    let retrying = ScriptedCapability::new(vec![
        Err(CapabilityError::Timeout("first".to_string())),
        Ok(ExecutionOutput::text("finally")),
    ]);
    let quick = ScriptedCapability::echoing();

    let retry_runner = TaskRunner::new(store.clone(), store.clone(), retrying.clone())
        .with_policy(RetryPolicy::fixed(1, Duration::from_millis(200)));
    let quick_runner = TaskRunner::new(store.clone(), store.clone(), quick.clone());

    let started = tokio::time::Instant::now();
    let (slow, fast) = tokio::join!(retry_runner.run(1, 1), quick_runner.run(1, 2));
    slow.unwrap();
    fast.unwrap();

    // The quick task finished during the other task's backoff window, so the
    // combined run is bounded by the slow path alone.
    assert!(started.elapsed() < Duration::from_millis(600));
    assert_eq!(quick.call_count(), 1);
    assert_eq!(retrying.call_count(), 2);
}
