//! Resize plan building
//!
//! Pure filter over classified containers: drops containers whose CPU and
//! memory are both NoChange and keeps the rest in input order, so batching
//! downstream is deterministic for a given cycle.

use crate::models::{ContainerDecisions, ResizePlan};

/// Build the non-empty plan set, preserving input order
pub fn build_plans(decisions: Vec<ContainerDecisions>) -> Vec<ResizePlan> {
    decisions
        .into_iter()
        .filter(|d| d.cpu.is_change() || d.memory.is_change())
        .map(|d| ResizePlan {
            container: d.container,
            cpu: d.cpu,
            memory: d.memory,
            cpu_spec: d.cpu_spec,
            memory_spec: d.memory_spec,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContainerRef, PodRef, ResourceDecision, ResourceDimension, ResourceSpec, Verdict,
    };

    fn decisions(pod: &str, cpu: Verdict, memory: Verdict) -> ContainerDecisions {
        let decision = |dimension, verdict| match verdict {
            Verdict::NoChange => ResourceDecision::no_change(dimension, 1000, 0.5),
            Verdict::ScaleUp => ResourceDecision {
                dimension,
                verdict,
                current_value: 1000,
                target_value: 1500,
                utilization_ratio: 0.9,
            },
            Verdict::ScaleDown => ResourceDecision {
                dimension,
                verdict,
                current_value: 1000,
                target_value: 200,
                utilization_ratio: 0.1,
            },
        };
        ContainerDecisions {
            container: ContainerRef::new(PodRef::new("default", pod), "app"),
            cpu: decision(ResourceDimension::Cpu, cpu),
            memory: decision(ResourceDimension::Memory, memory),
            cpu_spec: ResourceSpec::new(500, 1000),
            memory_spec: ResourceSpec::new(500, 1000),
        }
    }

    #[test]
    fn test_filters_all_no_change() {
        let plans = build_plans(vec![
            decisions("a", Verdict::NoChange, Verdict::NoChange),
            decisions("b", Verdict::ScaleUp, Verdict::NoChange),
            decisions("c", Verdict::NoChange, Verdict::NoChange),
            decisions("d", Verdict::NoChange, Verdict::ScaleDown),
        ]);

        let pods: Vec<_> = plans.iter().map(|p| p.pod().name.as_str()).collect();
        assert_eq!(pods, vec!["b", "d"]);
    }

    #[test]
    fn test_preserves_input_order() {
        let names = ["z", "m", "a", "q", "b"];
        let input: Vec<_> = names
            .iter()
            .map(|n| decisions(n, Verdict::ScaleUp, Verdict::ScaleDown))
            .collect();

        let plans = build_plans(input);
        let pods: Vec<_> = plans.iter().map(|p| p.pod().name.as_str()).collect();
        assert_eq!(pods, names);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_plans(Vec::new()).is_empty());
    }

    #[test]
    fn test_plan_keeps_decisions() {
        let plans = build_plans(vec![decisions("a", Verdict::ScaleUp, Verdict::NoChange)]);
        let plan = &plans[0];
        assert_eq!(plan.cpu.target_value, 1500);
        assert_eq!(plan.memory.verdict, Verdict::NoChange);
        assert_eq!(plan.changing_dimensions(), vec![ResourceDimension::Cpu]);
    }
}
