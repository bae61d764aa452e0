use super::*;
use crate::error::RuntimeError;
use crate::models::{
    ContainerRef, DimensionStatus, PodRef, ResourceDecision, ResourceDimension, ResourceSpec,
    SkipReason, Verdict,
};
use crate::runtime::ResizeRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

type Behavior = Box<dyn Fn(&ResizeRequest, usize) -> Result<(), RuntimeError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(String),
    End(String),
}

/// Runtime that records every call and tracks in-flight operations
struct MockRuntime {
    delay: Duration,
    behavior: Behavior,
    calls: StdMutex<Vec<ResizeRequest>>,
    events: StdMutex<Vec<Event>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    per_pod: StdMutex<HashMap<PodRef, usize>>,
    max_per_pod: AtomicUsize,
}

impl MockRuntime {
    fn new(delay: Duration, behavior: Behavior) -> Self {
        Self {
            delay,
            behavior,
            calls: StdMutex::new(Vec::new()),
            events: StdMutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            per_pod: StdMutex::new(HashMap::new()),
            max_per_pod: AtomicUsize::new(0),
        }
    }

    fn succeeding(delay: Duration) -> Self {
        Self::new(delay, Box::new(|_, _| Ok(())))
    }

    /// Rejects any request that lowers a value
    fn rejecting_decreases() -> Self {
        Self::new(
            Duration::ZERO,
            Box::new(|request, _| {
                let decreasing = request.decreasing_dimensions();
                if decreasing.is_empty() {
                    Ok(())
                } else {
                    Err(RuntimeError::Rejected {
                        dimensions: decreasing,
                        reason: "cannot be decreased".to_string(),
                    })
                }
            }),
        )
    }

    fn calls(&self) -> Vec<ResizeRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResizeRuntime for MockRuntime {
    async fn apply(&self, request: &ResizeRequest) -> Result<(), RuntimeError> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };

        let pod = request.container.pod.clone();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_pod = self.per_pod.lock().unwrap();
            let count = per_pod.entry(pod.clone()).or_insert(0);
            *count += 1;
            self.max_per_pod.fetch_max(*count, Ordering::SeqCst);
        }
        self.events
            .lock()
            .unwrap()
            .push(Event::Start(pod.name.clone()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.events.lock().unwrap().push(Event::End(pod.name.clone()));
        {
            let mut per_pod = self.per_pod.lock().unwrap();
            if let Some(count) = per_pod.get_mut(&pod) {
                *count -= 1;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.behavior)(request, call_index)
    }
}

fn decision(dimension: ResourceDimension, current: u64, target: u64) -> ResourceDecision {
    let verdict = if target > current {
        Verdict::ScaleUp
    } else if target < current {
        Verdict::ScaleDown
    } else {
        Verdict::NoChange
    };
    ResourceDecision {
        dimension,
        verdict,
        current_value: current,
        target_value: target,
        utilization_ratio: 0.5,
    }
}

fn plan_for(pod: &str, container: &str, cpu_target: u64, memory_target: u64) -> ResizePlan {
    ResizePlan {
        container: ContainerRef::new(PodRef::new("default", pod), container),
        cpu: decision(ResourceDimension::Cpu, 1000, cpu_target),
        memory: decision(ResourceDimension::Memory, 512 * MIB, memory_target),
        cpu_spec: ResourceSpec::new(500, 1000),
        memory_spec: ResourceSpec::new(256 * MIB, 512 * MIB),
    }
}

/// CPU up, memory unchanged
fn scale_up(pod: &str) -> ResizePlan {
    plan_for(pod, "app", 1500, 512 * MIB)
}

fn executor(runtime: Arc<MockRuntime>, config: ExecutorConfig) -> BatchExecutor {
    BatchExecutor::new(runtime, config)
}

fn config(batch_size: usize, concurrency: usize) -> ExecutorConfig {
    ExecutorConfig {
        batch_size,
        concurrency,
        ..ExecutorConfig::default()
    }
}

#[test]
fn test_partition_sizes() {
    let plans: Vec<_> = (0..7).map(|i| scale_up(&format!("pod-{}", i))).collect();
    let batches = partition(plans, 5);

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 5);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[1].index, 1);

    let positions: Vec<usize> = batches
        .iter()
        .flat_map(|b| b.plans.iter().map(|(p, _)| *p))
        .collect();
    assert_eq!(positions, (0..7).collect::<Vec<_>>());
}

#[test]
fn test_partition_edge_cases() {
    assert!(partition(Vec::new(), 5).is_empty());
    assert_eq!(partition(vec![scale_up("a"), scale_up("b")], 0).len(), 2);
    assert_eq!(partition(vec![scale_up("a"), scale_up("b")], 10).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batches_run_sequentially() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(30)));
    let executor = executor(runtime.clone(), config(5, 3));

    let plans: Vec<_> = (0..7).map(|i| scale_up(&format!("pod-{}", i))).collect();
    let summary = executor.execute(plans).await;

    assert_eq!(summary.outcomes.len(), 7);
    assert!(summary.deferred.is_empty());
    assert!(summary.outcomes.iter().all(|o| o.cpu.is_applied()));

    // Every operation of the first batch ends before any of the second starts
    let events = runtime.events();
    let first_batch: Vec<String> = (0..5).map(|i| format!("pod-{}", i)).collect();
    let last_first_end = events
        .iter()
        .rposition(|e| matches!(e, Event::End(p) if first_batch.contains(p)))
        .unwrap();
    let first_second_start = events
        .iter()
        .position(|e| matches!(e, Event::Start(p) if !first_batch.contains(p)))
        .unwrap();
    assert!(last_first_end < first_second_start);

    assert!(runtime.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outcomes_in_plan_order() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(5)));
    let executor = executor(runtime, config(4, 4));

    let names = ["e", "a", "d", "b", "c", "f"];
    let plans: Vec<_> = names.iter().map(|n| scale_up(n)).collect();
    let summary = executor.execute(plans).await;

    let order: Vec<&str> = summary
        .outcomes
        .iter()
        .map(|o| o.plan.pod().name.as_str())
        .collect();
    assert_eq!(order, names);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(20)));
    let executor = executor(runtime.clone(), config(9, 2));

    let plans: Vec<_> = (0..9).map(|i| scale_up(&format!("pod-{}", i))).collect();
    executor.execute(plans).await;

    assert_eq!(runtime.calls().len(), 9);
    assert!(runtime.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pod_exclusivity() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(20)));
    let executor = executor(runtime.clone(), config(8, 8));

    let plans = vec![
        plan_for("shared", "app", 1500, 512 * MIB),
        plan_for("shared", "sidecar", 1500, 512 * MIB),
        scale_up("other-1"),
        plan_for("shared", "proxy", 1500, 512 * MIB),
        scale_up("other-2"),
        scale_up("other-3"),
    ];
    let summary = executor.execute(plans).await;

    assert_eq!(summary.outcomes.len(), 6);
    assert!(summary.outcomes.iter().all(|o| o.cpu.is_applied()));
    assert_eq!(runtime.max_per_pod.load(Ordering::SeqCst), 1);
    assert!(executor.applier.locks.is_empty());
}

#[tokio::test]
async fn test_partial_application_on_rejected_decrease() {
    let runtime = Arc::new(MockRuntime::rejecting_decreases());
    let executor = executor(runtime.clone(), config(5, 3));

    // CPU up, memory down
    let plan = plan_for("web-0", "app", 1500, 256 * MIB);
    let summary = executor.execute(vec![plan]).await;

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.cpu, DimensionStatus::Applied);
    assert_eq!(
        outcome.memory,
        DimensionStatus::Skipped(SkipReason::DecreaseNotPermitted)
    );

    let calls = runtime.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].dimensions(),
        vec![ResourceDimension::Cpu, ResourceDimension::Memory]
    );
    assert_eq!(calls[1].dimensions(), vec![ResourceDimension::Cpu]);
}

#[tokio::test]
async fn test_failed_retry_marks_retried_dimensions_failed() {
    let runtime = Arc::new(MockRuntime::new(
        Duration::ZERO,
        Box::new(|request, call| match call {
            0 => Err(RuntimeError::Rejected {
                dimensions: request.decreasing_dimensions(),
                reason: "cannot be decreased".to_string(),
            }),
            _ => Err(RuntimeError::Failed("connection reset".to_string())),
        }),
    ));
    let executor = executor(runtime.clone(), config(5, 3));

    let summary = executor
        .execute(vec![plan_for("web-0", "app", 1500, 256 * MIB)])
        .await;

    let outcome = &summary.outcomes[0];
    assert!(matches!(&outcome.cpu, DimensionStatus::Failed(r) if r.contains("connection reset")));
    assert_eq!(
        outcome.memory,
        DimensionStatus::Skipped(SkipReason::DecreaseNotPermitted)
    );
    // One attempt plus one reduced-scope retry, never more
    assert_eq!(runtime.calls().len(), 2);
}

#[tokio::test]
async fn test_rejected_decrease_only_makes_single_call() {
    let runtime = Arc::new(MockRuntime::rejecting_decreases());
    let executor = executor(runtime.clone(), config(5, 3));

    let summary = executor
        .execute(vec![plan_for("web-0", "app", 1000, 256 * MIB)])
        .await;

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.cpu, DimensionStatus::Skipped(SkipReason::NoChange));
    assert_eq!(
        outcome.memory,
        DimensionStatus::Skipped(SkipReason::DecreaseNotPermitted)
    );
    assert_eq!(runtime.calls().len(), 1);
}

#[tokio::test]
async fn test_unrecognized_rejection_is_failure() {
    let runtime = Arc::new(MockRuntime::new(
        Duration::ZERO,
        Box::new(|_, _| {
            Err(RuntimeError::Rejected {
                dimensions: Vec::new(),
                reason: "admission webhook denied the request".to_string(),
            })
        }),
    ));
    let executor = executor(runtime.clone(), config(5, 3));

    let summary = executor
        .execute(vec![plan_for("web-0", "app", 1500, 256 * MIB)])
        .await;

    let outcome = &summary.outcomes[0];
    assert!(outcome.cpu.is_failed());
    assert!(outcome.memory.is_failed());
    assert_eq!(runtime.calls().len(), 1);
}

#[tokio::test]
async fn test_failure_is_isolated() {
    let runtime = Arc::new(MockRuntime::new(
        Duration::ZERO,
        Box::new(|request, _| {
            if request.container.pod.name == "bad" {
                Err(RuntimeError::Failed("pods \"bad\" not found".to_string()))
            } else {
                Ok(())
            }
        }),
    ));
    let executor = executor(runtime.clone(), config(2, 2));

    let plans = vec![scale_up("a"), scale_up("bad"), scale_up("c"), scale_up("d")];
    let summary = executor.execute(plans).await;

    assert_eq!(summary.outcomes.len(), 4);
    for outcome in &summary.outcomes {
        if outcome.plan.pod().name == "bad" {
            assert!(outcome.cpu.is_failed());
            assert_eq!(outcome.memory, DimensionStatus::Skipped(SkipReason::NoChange));
        } else {
            assert!(outcome.cpu.is_applied());
        }
    }
    // Failed apply is not retried
    assert_eq!(runtime.calls().len(), 4);
}

#[tokio::test]
async fn test_timeout_is_failure() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(500)));
    let executor = executor(
        runtime.clone(),
        ExecutorConfig {
            apply_timeout_ms: 20,
            ..config(5, 3)
        },
    );

    let summary = executor
        .execute(vec![plan_for("slow", "app", 1500, 256 * MIB)])
        .await;

    let outcome = &summary.outcomes[0];
    assert!(matches!(&outcome.cpu, DimensionStatus::Failed(r) if r.contains("timed out")));
    assert!(matches!(&outcome.memory, DimensionStatus::Failed(r) if r.contains("timed out")));
    assert_eq!(runtime.calls().len(), 1);
}

#[tokio::test]
async fn test_dry_run_never_calls_runtime() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::ZERO));
    let executor = executor(
        runtime.clone(),
        ExecutorConfig {
            dry_run: true,
            ..config(5, 3)
        },
    );

    let summary = executor
        .execute(vec![plan_for("web-0", "app", 1500, 512 * MIB)])
        .await;

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.cpu, DimensionStatus::Skipped(SkipReason::DryRun));
    assert_eq!(outcome.memory, DimensionStatus::Skipped(SkipReason::NoChange));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn test_expired_deadline_defers_everything() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::ZERO));
    let executor = executor(
        runtime.clone(),
        ExecutorConfig {
            cycle_deadline_secs: Some(0),
            ..config(2, 2)
        },
    );

    let plans = vec![scale_up("a"), scale_up("b"), scale_up("c")];
    let summary = executor.execute(plans).await;

    assert!(summary.outcomes.is_empty());
    let deferred: Vec<&str> = summary
        .deferred
        .iter()
        .map(|p| p.pod().name.as_str())
        .collect();
    assert_eq!(deferred, vec!["a", "b", "c"]);
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn test_deadline_defers_unstarted_batches() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::from_millis(700)));
    let executor = executor(
        runtime.clone(),
        ExecutorConfig {
            cycle_deadline_secs: Some(1),
            apply_timeout_ms: 5_000,
            ..config(1, 1)
        },
    );

    let plans = vec![scale_up("a"), scale_up("b"), scale_up("c")];
    let summary = executor.execute(plans).await;

    // Batch 2 starts at ~0.7s, batch 3 would start at ~1.4s
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.deferred.len(), 1);
    assert_eq!(summary.deferred[0].pod().name, "c");
}

#[tokio::test]
async fn test_empty_plan_list() {
    let runtime = Arc::new(MockRuntime::succeeding(Duration::ZERO));
    let executor = executor(runtime.clone(), config(5, 3));

    let summary = executor.execute(Vec::new()).await;
    assert!(summary.outcomes.is_empty());
    assert!(summary.deferred.is_empty());
    assert!(runtime.calls().is_empty());
}
