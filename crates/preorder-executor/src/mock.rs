//! Scriptable in-process broker for tests.
//!
//! All sessions created by one [`MockSessionFactory`] share a [`MockBroker`],
//! which records every call, replays queued outcomes, and tracks how many
//! calls are in flight at once.

use crate::error::{SessionError, SessionResult};
use crate::session::{
    BrokerSession, CheckOutcome, ConfirmOutcome, Credentials, DynSession, SessionFactory,
};
use parking_lot::Mutex;
use preorder_core::{BoxFuture, OrderRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A recorded broker call, tagged with the session that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect { session: u64 },
    Refresh { session: u64 },
    Check { session: u64, product_id: String },
    Confirm { session: u64, confirmation_id: String },
}

/// Shared state behind mock sessions.
#[derive(Debug, Default)]
pub struct MockBroker {
    calls: Mutex<Vec<MockCall>>,
    check_results: Mutex<VecDeque<SessionResult<CheckOutcome>>>,
    confirm_results: Mutex<VecDeque<SessionResult<ConfirmOutcome>>>,
    refresh_results: Mutex<VecDeque<SessionResult<()>>>,
    failing_connects: AtomicUsize,
    call_delay: Mutex<Duration>,
    next_session: AtomicU64,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next `check_order`. Defaults to accepted.
    pub fn push_check(&self, result: SessionResult<CheckOutcome>) {
        self.check_results.lock().push_back(result);
    }

    /// Queue the outcome of the next `confirm_order`. Defaults to accepted.
    pub fn push_confirm(&self, result: SessionResult<ConfirmOutcome>) {
        self.confirm_results.lock().push_back(result);
    }

    /// Queue the outcome of the next `refresh_account_info`. Defaults to ok.
    pub fn push_refresh(&self, result: SessionResult<()>) {
        self.refresh_results.lock().push_back(result);
    }

    /// Fail the next `n` connects with an authentication error.
    pub fn fail_next_connects(&self, n: usize) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Make every call take `delay`.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Record `call` and hold it in flight until the returned guard drops,
    /// which also covers calls abandoned by a caller's timeout.
    async fn enter(&self, call: MockCall) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = InFlight(self);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(call);

        let delay = *self.call_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        in_flight
    }
}

struct InFlight<'a>(&'a MockBroker);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session handed out by [`MockSessionFactory`].
pub struct MockSession {
    id: u64,
    broker: Arc<MockBroker>,
}

impl MockSession {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl BrokerSession for MockSession {
    fn connect(&mut self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            let _call = self.broker.enter(MockCall::Connect { session: self.id }).await;
            let failing = self
                .broker
                .failing_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SessionError::Authentication("invalid login".to_string()));
            }
            Ok(())
        })
    }

    fn refresh_account_info(&mut self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            let _call = self.broker.enter(MockCall::Refresh { session: self.id }).await;
            self.broker.refresh_results.lock().pop_front().unwrap_or(Ok(()))
        })
    }

    fn check_order<'a>(
        &'a mut self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<CheckOutcome>> {
        Box::pin(async move {
            let _call = self
                .broker
                .enter(MockCall::Check {
                    session: self.id,
                    product_id: request.product_id.clone(),
                })
                .await;
            let queued = self.broker.check_results.lock().pop_front();
            let result = queued.unwrap_or_else(|| {
                Ok(CheckOutcome::Accepted {
                    confirmation_id: self.broker.next_id("conf"),
                })
            });
            result
        })
    }

    fn confirm_order<'a>(
        &'a mut self,
        confirmation_id: &'a str,
        _request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<ConfirmOutcome>> {
        Box::pin(async move {
            let _call = self
                .broker
                .enter(MockCall::Confirm {
                    session: self.id,
                    confirmation_id: confirmation_id.to_string(),
                })
                .await;
            let queued = self.broker.confirm_results.lock().pop_front();
            let result = queued.unwrap_or_else(|| {
                Ok(ConfirmOutcome::Accepted {
                    order_id: self.broker.next_id("order"),
                })
            });
            result
        })
    }
}

/// Factory producing [`MockSession`]s numbered from 1.
pub struct MockSessionFactory {
    broker: Arc<MockBroker>,
}

impl MockSessionFactory {
    pub fn new(broker: Arc<MockBroker>) -> Self {
        Self { broker }
    }
}

impl SessionFactory for MockSessionFactory {
    fn create(&self, _credentials: &Credentials) -> SessionResult<DynSession> {
        let id = self.broker.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockSession {
            id,
            broker: self.broker.clone(),
        }))
    }
}
