//! Routing policies: does an order need packaging and shipping?

use shared::order::Order;

/// Decides whether a new order goes through multi-stage fulfillment
pub trait RoutingPolicy: Send + Sync {
    fn needs_long_processing(&self, order: &Order) -> bool;

    fn name(&self) -> &'static str;
}

/// Every order is physically fulfilled
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFulfill;

impl RoutingPolicy for AlwaysFulfill {
    fn needs_long_processing(&self, _order: &Order) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "always_fulfill"
    }
}

/// Nothing ships; orders complete immediately (digital-only catalogues)
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFulfill;

impl RoutingPolicy for NeverFulfill {
    fn needs_long_processing(&self, _order: &Order) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "never_fulfill"
    }
}

/// Ship orders above a minor-unit amount, or flagged with
/// `metadata.requiresShipping = "true"`
#[derive(Debug, Clone, Copy)]
pub struct AmountThreshold {
    pub threshold: i64,
}

impl AmountThreshold {
    pub const REQUIRES_SHIPPING: &'static str = "requiresShipping";

    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }
}

impl RoutingPolicy for AmountThreshold {
    fn needs_long_processing(&self, order: &Order) -> bool {
        order.amount_total > self.threshold
            || order
                .metadata
                .get(Self::REQUIRES_SHIPPING)
                .is_some_and(|v| v == "true")
    }

    fn name(&self) -> &'static str {
        "amount_threshold"
    }
}
