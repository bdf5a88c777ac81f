//! Order progress indicator.

use food_client_core::OrderStatus;

/// One step of the progress indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    pub status: OrderStatus,
    pub label: &'static str,
    pub description: &'static str,
    /// Reached at or before the current step.
    pub completed: bool,
    /// The current step.
    pub active: bool,
}

const fn description(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "We have received your order",
        OrderStatus::Confirmed => "Restaurant accepted your order",
        OrderStatus::Preparing => "Your food is being prepared",
        OrderStatus::ReadyForPickup => "Ready for pickup",
        OrderStatus::OutForDelivery => "Delivery partner is on the way",
        OrderStatus::Delivered => "Enjoy your meal!",
        OrderStatus::Cancelled => "This order was cancelled",
        OrderStatus::Unknown => "",
    }
}

/// Tracks the furthest progress index seen across polls.
///
/// The backend is trusted to move orders forward only, but a stale response
/// can still arrive after a newer one. The displayed index is a high-water
/// mark so the indicator never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    high_water: Option<usize>,
    cancelled: bool,
}

impl ProgressTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            high_water: None,
            cancelled: false,
        }
    }

    /// Record an observed status and return the index to display.
    ///
    /// `Cancelled` and `Unknown` statuses have no index; they leave the
    /// high-water mark untouched.
    pub fn observe(&mut self, status: OrderStatus) -> Option<usize> {
        if status == OrderStatus::Cancelled {
            self.cancelled = true;
        }
        if let Some(index) = status.progress_index() {
            self.high_water = Some(self.high_water.map_or(index, |hw| hw.max(index)));
        }
        self.high_water
    }

    /// The index currently displayed.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.high_water
    }

    /// Whether a cancellation has been observed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// The steps of the indicator at the current index.
    #[must_use]
    pub fn steps(&self) -> Vec<ProgressStep> {
        OrderStatus::PROGRESSION
            .iter()
            .enumerate()
            .map(|(i, &status)| ProgressStep {
                status,
                label: status.label(),
                description: description(status),
                completed: self.high_water.is_some_and(|hw| i <= hw),
                active: self.high_water == Some(i),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_never_regresses() {
        let observed = [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Confirmed,
            OrderStatus::Unknown,
            OrderStatus::OutForDelivery,
            OrderStatus::Preparing,
            OrderStatus::Delivered,
        ];

        let mut tracker = ProgressTracker::new();
        let shown: Vec<_> = observed.iter().map(|&s| tracker.observe(s)).collect();

        assert_eq!(
            shown,
            vec![Some(0), Some(2), Some(2), Some(2), Some(4), Some(4), Some(5)]
        );
        assert!(shown.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_steps_mark_completed_and_active() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(OrderStatus::Preparing);

        let steps = tracker.steps();
        assert_eq!(steps.len(), 6);
        assert!(steps[..=2].iter().all(|s| s.completed));
        assert!(steps[3..].iter().all(|s| !s.completed));
        assert_eq!(
            steps.iter().filter(|s| s.active).map(|s| s.status).collect::<Vec<_>>(),
            vec![OrderStatus::Preparing]
        );
    }

    #[test]
    fn test_nothing_observed_has_no_completed_steps() {
        let tracker = ProgressTracker::new();
        assert!(tracker.steps().iter().all(|s| !s.completed && !s.active));
    }

    #[test]
    fn test_cancellation_keeps_reached_steps() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(OrderStatus::Confirmed);
        assert_eq!(tracker.observe(OrderStatus::Cancelled), Some(1));
        assert!(tracker.is_cancelled());
    }
}
