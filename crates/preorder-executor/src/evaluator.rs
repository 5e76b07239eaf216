//! Order evaluator.
//!
//! For each aggregated price, loads the preorder book, picks the pending
//! preorders for that symbol whose limit sits inside the eligible band, and
//! submits each one under a single session acquisition:
//!
//! 1. `check_order`: a rejection is final and cancels the preorder.
//! 2. `confirm_order`: a rejection leaves the preorder pending for the next
//!    price update.
//!
//! Every status change is saved as soon as it happens. A change whose save
//! fails is held in memory and re-applied to every freshly loaded book until
//! a save succeeds, so a placed order is never submitted twice. Errors,
//! timeouts and panics on one preorder never stop its siblings.

use crate::eligibility::check_eligibility;
use crate::error::{ExecutorResult, SessionError};
use crate::guard::SessionGuard;
use crate::keepalive::panic_message;
use crate::session::{CheckOutcome, ConfirmOutcome};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use preorder_core::{
    AggregatedPrice, BoxFuture, OrderAction, OrderRequest, Preorder, PreorderBook, PreorderStatus,
    Price, PriceHandler,
};
use preorder_persistence::PreorderStore;
use preorder_telemetry::Metrics;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Upper bound for each broker call.
    pub call_timeout: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Counts for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Orders placed.
    pub created: usize,
    /// Preorders canceled after a check rejection.
    pub canceled: usize,
    /// Confirm rejected; still pending.
    pub deferred: usize,
    /// Broker error, timeout or panic; still pending.
    pub failed: usize,
    /// Skipped by the eligibility rules.
    pub ineligible: usize,
    /// Status changes that could not be saved.
    pub save_failures: usize,
}

impl EvaluationSummary {
    fn record_metrics(&self) {
        Metrics::evaluation("created", self.created as u64);
        Metrics::evaluation("canceled", self.canceled as u64);
        Metrics::evaluation("deferred", self.deferred as u64);
        Metrics::evaluation("failed", self.failed as u64);
        Metrics::evaluation("ineligible", self.ineligible as u64);
    }
}

/// Result of the submission protocol for one preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Created { order_id: String },
    Canceled { reason: String },
    Deferred { reason: String },
    Failed { error: String },
}

/// A status change the store has not accepted yet.
#[derive(Debug, Clone)]
struct UnsavedTransition {
    symbol: String,
    action: OrderAction,
    limit_price: Price,
    product_id: String,
    status: PreorderStatus,
    at: Option<DateTime<Utc>>,
}

impl UnsavedTransition {
    fn of(preorder: &Preorder) -> Self {
        Self {
            symbol: preorder.symbol.clone(),
            action: preorder.action,
            limit_price: preorder.limit_price,
            product_id: preorder.product_id.clone(),
            status: preorder.status,
            at: preorder.order_created_utc,
        }
    }

    fn matches(&self, preorder: &Preorder) -> bool {
        preorder.symbol == self.symbol
            && preorder.action == self.action
            && preorder.limit_price == self.limit_price
            && preorder.product_id == self.product_id
    }

    fn apply(&self, preorder: &mut Preorder) -> preorder_core::Result<()> {
        match self.status {
            PreorderStatus::OrderCreated => {
                preorder.mark_order_created(self.at.unwrap_or_else(Utc::now))
            }
            PreorderStatus::Canceled => preorder.mark_canceled(),
            PreorderStatus::Pending => Ok(()),
        }
    }
}

pub struct OrderEvaluator {
    store: Arc<dyn PreorderStore>,
    guard: Arc<SessionGuard>,
    config: EvaluatorConfig,
    unsaved: Mutex<Vec<UnsavedTransition>>,
}

impl OrderEvaluator {
    pub fn new(
        store: Arc<dyn PreorderStore>,
        guard: Arc<SessionGuard>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            store,
            guard,
            config,
            unsaved: Mutex::new(Vec::new()),
        }
    }

    /// Status changes still waiting for a successful save.
    pub fn unsaved_count(&self) -> usize {
        self.unsaved.lock().len()
    }

    /// Evaluate every preorder for `price.symbol` against `price.price`.
    pub async fn evaluate(&self, price: &AggregatedPrice) -> ExecutorResult<EvaluationSummary> {
        let mut book = self.store.load()?;
        let mut summary = EvaluationSummary::default();

        if self.reapply_unsaved(&mut book) {
            self.save(&book, &mut summary);
        }

        for index in book.indices_for(&price.symbol) {
            let preorder = &book.preorders[index];
            if let Err(reason) = check_eligibility(preorder, price.price) {
                debug!(preorder = %preorder, market = %price.price, %reason, "Not eligible");
                summary.ineligible += 1;
                continue;
            }

            info!(preorder = %preorder, market = %price.price, "Submitting preorder");
            let request = preorder.to_order_request();
            let submission = match AssertUnwindSafe(self.submit(request)).catch_unwind().await {
                Ok(submission) => submission,
                Err(panic) => Submission::Failed {
                    error: format!("panicked: {}", panic_message(panic.as_ref())),
                },
            };

            let preorder = &mut book.preorders[index];
            let changed = match &submission {
                Submission::Created { order_id } => {
                    preorder.mark_order_created(Utc::now())?;
                    summary.created += 1;
                    info!(preorder = %preorder, order_id = %order_id, "Order created");
                    true
                }
                Submission::Canceled { reason } => {
                    preorder.mark_canceled()?;
                    summary.canceled += 1;
                    warn!(preorder = %preorder, reason = %reason, "Order check rejected, preorder canceled");
                    true
                }
                Submission::Deferred { reason } => {
                    summary.deferred += 1;
                    warn!(preorder = %preorder, reason = %reason, "Order confirm rejected, will retry");
                    false
                }
                Submission::Failed { error } => {
                    summary.failed += 1;
                    error!(preorder = %preorder, error = %error, "Order submission failed, will retry");
                    false
                }
            };

            if changed {
                let transition = UnsavedTransition::of(&book.preorders[index]);
                self.unsaved.lock().push(transition);
                self.save(&book, &mut summary);
            }
        }

        Metrics::pending_preorders(book.pending_count());
        summary.record_metrics();
        Ok(summary)
    }

    /// Re-apply held transitions to records still pending in `book`.
    ///
    /// Transitions whose record is gone or already terminal are dropped.
    /// Returns whether the book changed.
    fn reapply_unsaved(&self, book: &mut PreorderBook) -> bool {
        let mut unsaved = self.unsaved.lock();
        let mut changed = false;
        unsaved.retain(|transition| {
            let Some(preorder) = book
                .preorders
                .iter_mut()
                .find(|p| p.is_pending() && transition.matches(p))
            else {
                return false;
            };
            match transition.apply(preorder) {
                Ok(()) => {
                    warn!(preorder = %preorder, status = %preorder.status, "Re-applied unsaved status change");
                    changed = true;
                    true
                }
                Err(e) => {
                    error!(preorder = %preorder, error = %e, "Dropping unsaved status change");
                    false
                }
            }
        });
        changed
    }

    /// Save `book`; on success every held transition is persisted.
    fn save(&self, book: &PreorderBook, summary: &mut EvaluationSummary) {
        match self.store.save(book) {
            Ok(()) => self.unsaved.lock().clear(),
            Err(e) => {
                summary.save_failures += 1;
                error!(
                    error = %e,
                    unsaved = self.unsaved.lock().len(),
                    "Failed to save preorder status, holding change in memory"
                );
            }
        }
    }

    /// Run check then confirm under one session acquisition.
    pub async fn submit(&self, request: OrderRequest) -> Submission {
        let call_timeout = self.config.call_timeout;
        self.guard
            .with_session(move |session| {
                Box::pin(async move {
                    let check = timed("check_order", call_timeout, session.check_order(&request)).await;
                    let confirmation_id = match check {
                        Ok(CheckOutcome::Accepted { confirmation_id }) => confirmation_id,
                        Ok(CheckOutcome::Rejected { reason }) => {
                            return Submission::Canceled { reason };
                        }
                        Err(e) => {
                            return Submission::Failed {
                                error: e.to_string(),
                            };
                        }
                    };

                    let confirm = timed(
                        "confirm_order",
                        call_timeout,
                        session.confirm_order(&confirmation_id, &request),
                    )
                    .await;
                    match confirm {
                        Ok(ConfirmOutcome::Accepted { order_id }) => Submission::Created { order_id },
                        Ok(ConfirmOutcome::Rejected { reason }) => Submission::Deferred { reason },
                        Err(e) => Submission::Failed {
                            error: e.to_string(),
                        },
                    }
                })
            })
            .await
    }
}

async fn timed<T>(
    call: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, SessionError> {
    let started = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Timeout(format!(
            "{call} exceeded {}s",
            limit.as_secs()
        ))),
    };
    Metrics::broker_call_latency(call, started.elapsed().as_secs_f64() * 1000.0);
    result
}

impl PriceHandler for OrderEvaluator {
    fn on_price(&self, price: AggregatedPrice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.evaluate(&price).await {
                Ok(summary) => {
                    if summary != EvaluationSummary::default() {
                        info!(
                            symbol = %price.symbol,
                            price = %price.price,
                            created = summary.created,
                            canceled = summary.canceled,
                            deferred = summary.deferred,
                            failed = summary.failed,
                            ineligible = summary.ineligible,
                            save_failures = summary.save_failures,
                            "Evaluation complete"
                        );
                    }
                }
                Err(e) => {
                    error!(symbol = %price.symbol, price = %price.price, error = %e, "Evaluation failed");
                }
            }
        })
    }
}
