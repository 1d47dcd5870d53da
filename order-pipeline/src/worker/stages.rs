//! Fulfillment stage plan
//!
//! Each stage persists its status first, then runs its activity.

use std::time::Duration;

use shared::order::OrderStatus;

pub const PROCESSING_MESSAGE: &str = "Order processing started";
pub const PACKAGING_MESSAGE: &str = "Packaging in progress";
pub const SHIPPING_MESSAGE: &str = "Order shipped";
pub const DELIVERED_MESSAGE: &str = "Order delivered";

/// Stage durations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTimings {
    pub processing_delay: Duration,
    pub packaging_duration: Duration,
    pub packaging_steps: u32,
    pub shipping_duration: Duration,
    pub shipping_steps: u32,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_secs(2),
            packaging_duration: Duration::from_secs(3 * 60),
            packaging_steps: 6,
            shipping_duration: Duration::from_secs(10 * 60),
            shipping_steps: 20,
        }
    }
}

/// Work done after a stage's status is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    None,
    Delay(Duration),
    /// `steps` equal sleeps spanning `duration`, each reported as progress
    Stepped { duration: Duration, steps: u32 },
}

impl Activity {
    pub fn total(&self) -> Duration {
        match *self {
            Activity::None => Duration::ZERO,
            Activity::Delay(d) => d,
            Activity::Stepped { duration, .. } => duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub status: OrderStatus,
    pub message: &'static str,
    pub activity: Activity,
}

/// The four fulfillment stages in order
#[derive(Debug, Clone)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn from_timings(timings: &StageTimings) -> Self {
        let stages = vec![
            Stage {
                status: OrderStatus::Processing,
                message: PROCESSING_MESSAGE,
                activity: Activity::Delay(timings.processing_delay),
            },
            Stage {
                status: OrderStatus::Packaging,
                message: PACKAGING_MESSAGE,
                activity: Activity::Stepped {
                    duration: timings.packaging_duration,
                    steps: timings.packaging_steps.max(1),
                },
            },
            Stage {
                status: OrderStatus::Shipping,
                message: SHIPPING_MESSAGE,
                activity: Activity::Stepped {
                    duration: timings.shipping_duration,
                    steps: timings.shipping_steps.max(1),
                },
            },
            Stage {
                status: OrderStatus::Completed,
                message: DELIVERED_MESSAGE,
                activity: Activity::None,
            },
        ];
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, status: OrderStatus) -> Option<&Stage> {
        self.stages.iter().find(|s| s.status == status)
    }

    /// Stages still to persist for an order currently at `status`
    pub fn stages_after(&self, status: OrderStatus) -> &[Stage] {
        match self.stages.iter().position(|s| s.status > status) {
            Some(index) => &self.stages[index..],
            None => &[],
        }
    }

    /// Wall time of a full run
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.activity.total()).sum()
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::from_timings(&StageTimings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(stages: &[Stage]) -> Vec<OrderStatus> {
        stages.iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_plan_follows_lifecycle() {
        let plan = StagePlan::default();
        assert_eq!(statuses(plan.stages()), OrderStatus::FULFILLMENT_STAGES.to_vec());
        assert_eq!(plan.total_duration(), Duration::from_secs(2 + 180 + 600));
        assert_eq!(
            plan.stage(OrderStatus::Packaging).map(|s| s.activity),
            Some(Activity::Stepped {
                duration: Duration::from_secs(180),
                steps: 6
            })
        );
        assert!(plan.stage(OrderStatus::Pending).is_none());
    }

    #[test]
    fn test_stages_after() {
        let plan = StagePlan::default();
        assert_eq!(plan.stages_after(OrderStatus::QueuedForProcessing).len(), 4);
        assert_eq!(
            statuses(plan.stages_after(OrderStatus::Packaging)),
            vec![OrderStatus::Shipping, OrderStatus::Completed]
        );
        assert!(plan.stages_after(OrderStatus::Completed).is_empty());
    }
}
