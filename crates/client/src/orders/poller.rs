//! Bounded fixed-interval polling of a single order.
//!
//! Order tracking and payment confirmation share one policy: fetch the order
//! every `interval`, stop as soon as a terminal predicate holds, and give up
//! after `max_attempts` ticks. A failed tick is logged and counts as an
//! attempt.
//!
//! The poll runs on its own task, owned by a [`PollHandle`]. Dropping the
//! handle aborts the task, so a poller can never outlive whoever started it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::models::Order;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Order tracking: every 10 seconds for up to an hour.
    pub const ORDER_TRACKING: Self = Self {
        interval: Duration::from_secs(10),
        max_attempts: 360,
    };

    /// Payment confirmation: every 2 seconds, 15 times.
    pub const PAYMENT_CONFIRMATION: Self = Self {
        interval: Duration::from_secs(2),
        max_attempts: 15,
    };
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The order reached a terminal state.
    Terminal(Order),
    /// Every attempt was used without reaching a terminal state.
    Exhausted {
        attempts: u32,
        /// The last order successfully fetched, if any.
        last: Option<Order>,
    },
    /// The session expired; further polls cannot succeed.
    AuthExpired { attempts: u32 },
    /// The poll was cancelled before finishing.
    Cancelled,
}

/// Result of waiting for a payment to be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentVerification {
    Confirmed(Order),
    Failed { attempts: u32 },
}

impl From<PollOutcome> for PaymentVerification {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Terminal(order) => Self::Confirmed(order),
            PollOutcome::Exhausted { attempts, .. } | PollOutcome::AuthExpired { attempts } => {
                Self::Failed { attempts }
            }
            PollOutcome::Cancelled => Self::Failed { attempts: 0 },
        }
    }
}

/// Owner of a running poll.
///
/// Dropping the handle aborts the poll.
#[derive(Debug)]
pub struct PollHandle {
    task: Option<JoinHandle<PollOutcome>>,
    updates: watch::Receiver<Option<Order>>,
}

impl PollHandle {
    /// Receiver that sees every successfully fetched order.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<Option<Order>> {
        self.updates.clone()
    }

    /// The most recently fetched order.
    #[must_use]
    pub fn latest(&self) -> Option<Order> {
        self.updates.borrow().clone()
    }

    /// Stop polling. [`Self::outcome`] then reports `Cancelled`.
    pub fn cancel(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Whether the poll has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the poll to end.
    ///
    /// Dropping this future before it resolves drops the handle and so
    /// aborts the poll.
    pub async fn outcome(mut self) -> PollOutcome {
        let Some(task) = self.task.as_mut() else {
            return PollOutcome::Cancelled;
        };
        let result = task.await;
        self.task = None;
        result.unwrap_or(PollOutcome::Cancelled)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start polling with `fetch` until `is_terminal` holds or attempts run out.
///
/// The first fetch happens immediately; later ones follow `policy.interval`.
pub fn spawn<F, Fut>(policy: PollPolicy, mut fetch: F, is_terminal: fn(&Order) -> bool) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Order, ApiError>> + Send + 'static,
{
    let (tx, rx) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = None;

        for attempt in 1..=policy.max_attempts {
            ticker.tick().await;

            match fetch().await {
                Ok(order) => {
                    debug!(attempt, order_id = %order.id, status = ?order.status, "polled order");
                    tx.send_replace(Some(order.clone()));
                    if is_terminal(&order) {
                        return PollOutcome::Terminal(order);
                    }
                    last = Some(order);
                }
                Err(ApiError::AuthExpired) => {
                    warn!(attempt, "session expired, stopping poll");
                    return PollOutcome::AuthExpired { attempts: attempt };
                }
                Err(e) => warn!(attempt, error = %e, "poll failed, retrying on next tick"),
            }
        }

        PollOutcome::Exhausted {
            attempts: policy.max_attempts,
            last,
        }
    });

    PollHandle {
        task: Some(task),
        updates: rx,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use food_client_core::{OrderId, OrderStatus, Price};

    use super::*;
    use crate::models::OrderTimestamps;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: None,
            restaurant_id: None,
            status,
            items: vec![],
            delivery_address: String::new(),
            payment_method: None,
            payment_status: None,
            paid: false,
            total_price: Price::zero(),
            timestamps: OrderTimestamps::default(),
        }
    }

    fn is_delivered_or_cancelled(order: &Order) -> bool {
        order.status.is_terminal()
    }

    /// A fetcher that replays `script` and counts its calls.
    fn scripted(
        script: Vec<Result<OrderStatus, ()>>,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<Order, ApiError>> + Send + 'static,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            let step = script.get(n).copied().or_else(|| script.last().copied());
            std::future::ready(match step {
                Some(Ok(status)) => Ok(order(status)),
                _ => Err(ApiError::Server {
                    status: 503,
                    message: None,
                }),
            })
        };
        (calls, fetch)
    }

    const FAST: PollPolicy = PollPolicy {
        interval: Duration::from_secs(10),
        max_attempts: 5,
    };

    #[tokio::test(start_paused = true)]
    async fn test_stops_immediately_on_terminal_status() {
        let (calls, fetch) = scripted(vec![
            Ok(OrderStatus::Pending),
            Ok(OrderStatus::Confirmed),
            Ok(OrderStatus::Delivered),
        ]);

        let outcome = spawn(FAST, fetch, is_delivered_or_cancelled).outcome().await;

        assert_eq!(outcome, PollOutcome::Terminal(order(OrderStatus::Delivered)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ticks_are_ignored_but_counted() {
        let (calls, fetch) = scripted(vec![
            Ok(OrderStatus::Pending),
            Err(()),
            Ok(OrderStatus::Cancelled),
        ]);

        let outcome = spawn(FAST, fetch, is_delivered_or_cancelled).outcome().await;

        assert_eq!(outcome, PollOutcome::Terminal(order(OrderStatus::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_order() {
        let (calls, fetch) = scripted(vec![Ok(OrderStatus::Preparing), Err(())]);

        let outcome = spawn(FAST, fetch, is_delivered_or_cancelled).outcome().await;

        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                attempts: 5,
                last: Some(order(OrderStatus::Preparing)),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_polling() {
        let (calls, fetch) = scripted(vec![Ok(OrderStatus::Pending)]);
        let handle = spawn(FAST, fetch, is_delivered_or_cancelled);

        tokio::time::sleep(Duration::from_secs(15)).await;
        drop(handle);
        let seen = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
        assert!(seen <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reports_cancelled() {
        let (_, fetch) = scripted(vec![Ok(OrderStatus::Pending)]);
        let mut handle = spawn(FAST, fetch, is_delivered_or_cancelled);
        handle.cancel();
        assert_eq!(handle.outcome().await, PollOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_publish_latest_order() {
        let (_, fetch) = scripted(vec![Ok(OrderStatus::Pending), Ok(OrderStatus::Preparing)]);
        let handle = spawn(FAST, fetch, is_delivered_or_cancelled);
        let mut updates = handle.updates();

        updates
            .wait_for(|o| o.as_ref().is_some_and(|o| o.status == OrderStatus::Preparing))
            .await
            .unwrap();
        assert_eq!(handle.latest().unwrap().status, OrderStatus::Preparing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_expiry_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(ApiError::AuthExpired))
        };

        let outcome = spawn(FAST, fetch, is_delivered_or_cancelled).outcome().await;
        assert_eq!(outcome, PollOutcome::AuthExpired { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_payment_verification_mapping() {
        let paid = order(OrderStatus::Confirmed);
        assert_eq!(
            PaymentVerification::from(PollOutcome::Terminal(paid.clone())),
            PaymentVerification::Confirmed(paid)
        );
        assert_eq!(
            PaymentVerification::from(PollOutcome::Exhausted {
                attempts: 15,
                last: None
            }),
            PaymentVerification::Failed { attempts: 15 }
        );
    }
}
