//! Paper brokerage backend.
//!
//! Simulates the check/confirm protocol against an in-memory account so the
//! agent can run end to end without a live brokerage. The account outlives
//! individual sessions: a recreated session sees the same cash and holdings.

use crate::error::{SessionError, SessionResult};
use crate::session::{
    BrokerSession, CheckOutcome, ConfirmOutcome, Credentials, DynSession, SessionFactory,
};
use parking_lot::Mutex;
use preorder_core::{BoxFuture, OrderAction, OrderRequest};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Paper account settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    /// Starting cash balance.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Starting shares per product id.
    #[serde(default)]
    pub holdings: HashMap<String, u32>,
    /// Lifetime of a confirmation id.
    #[serde(default = "default_confirmation_ttl_secs")]
    pub confirmation_ttl_secs: u64,
}

fn default_initial_cash() -> Decimal {
    Decimal::from(100_000)
}

fn default_confirmation_ttl_secs() -> u64 {
    60
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            holdings: HashMap::new(),
            confirmation_ttl_secs: default_confirmation_ttl_secs(),
        }
    }
}

/// Booked paper order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperFill {
    pub order_id: String,
    pub request: OrderRequest,
}

#[derive(Debug)]
struct PaperAccount {
    cash: Decimal,
    holdings: HashMap<String, u32>,
    fills: Vec<PaperFill>,
}

impl PaperAccount {
    /// Reason the account cannot take `request`, if any.
    fn shortfall(&self, request: &OrderRequest) -> Option<String> {
        match request.action {
            OrderAction::Buy => {
                let cost = request.notional();
                (cost > self.cash).then(|| format!("insufficient cash: need {cost}, have {}", self.cash))
            }
            OrderAction::Sell => {
                let held = self.holdings.get(&request.product_id).copied().unwrap_or(0);
                (held < request.size).then(|| {
                    format!(
                        "insufficient holdings in {}: need {}, have {held}",
                        request.product_id, request.size
                    )
                })
            }
        }
    }

    fn book(&mut self, request: &OrderRequest) -> String {
        let notional = request.notional();
        let held = self.holdings.entry(request.product_id.clone()).or_insert(0);
        match request.action {
            OrderAction::Buy => {
                self.cash -= notional;
                *held = held.saturating_add(request.size);
            }
            OrderAction::Sell => {
                self.cash += notional;
                *held = held.saturating_sub(request.size);
            }
        }
        let order_id = Uuid::new_v4().to_string();
        self.fills.push(PaperFill {
            order_id: order_id.clone(),
            request: request.clone(),
        });
        order_id
    }
}

struct PendingConfirmation {
    request: OrderRequest,
    issued_at: Instant,
}

/// Session against the paper account.
pub struct PaperSession {
    credentials: Credentials,
    account: Arc<Mutex<PaperAccount>>,
    confirmation_ttl: Duration,
    pending: HashMap<String, PendingConfirmation>,
    used: HashSet<String>,
    connected: bool,
}

impl PaperSession {
    fn ensure_connected(&self) -> SessionResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::Transport("session not connected".to_string()))
        }
    }
}

impl BrokerSession for PaperSession {
    fn connect(&mut self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            if !self.credentials.is_complete() {
                return Err(SessionError::Authentication(
                    "username, password and account id are required".to_string(),
                ));
            }
            self.connected = true;
            info!(
                account = self.credentials.account_id(),
                "Paper session connected"
            );
            Ok(())
        })
    }

    fn refresh_account_info(&mut self) -> BoxFuture<'_, SessionResult<()>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let account = self.account.lock();
            debug!(
                cash = %account.cash,
                positions = account.holdings.len(),
                "Paper account refreshed"
            );
            Ok(())
        })
    }

    fn check_order<'a>(
        &'a mut self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<CheckOutcome>> {
        Box::pin(async move {
            self.ensure_connected()?;
            if let Some(reason) = self.account.lock().shortfall(request) {
                return Ok(CheckOutcome::Rejected { reason });
            }
            let confirmation_id = Uuid::new_v4().to_string();
            self.pending.insert(
                confirmation_id.clone(),
                PendingConfirmation {
                    request: request.clone(),
                    issued_at: Instant::now(),
                },
            );
            Ok(CheckOutcome::Accepted { confirmation_id })
        })
    }

    fn confirm_order<'a>(
        &'a mut self,
        confirmation_id: &'a str,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<ConfirmOutcome>> {
        Box::pin(async move {
            self.ensure_connected()?;
            let rejected = |reason: &str| {
                Ok(ConfirmOutcome::Rejected {
                    reason: reason.to_string(),
                })
            };

            if self.used.contains(confirmation_id) {
                return rejected("confirmation already used");
            }
            let Some(pending) = self.pending.remove(confirmation_id) else {
                return rejected("unknown confirmation");
            };
            self.used.insert(confirmation_id.to_string());

            if pending.issued_at.elapsed() > self.confirmation_ttl {
                return rejected("confirmation expired");
            }
            if pending.request != *request {
                return rejected("order does not match confirmation");
            }

            let mut account = self.account.lock();
            if let Some(reason) = account.shortfall(request) {
                return Ok(ConfirmOutcome::Rejected { reason });
            }
            let order_id = account.book(request);
            info!(
                order_id = %order_id,
                action = %request.action,
                product_id = %request.product_id,
                size = request.size,
                limit = %request.limit_price,
                cash = %account.cash,
                "Paper order booked"
            );
            Ok(ConfirmOutcome::Accepted { order_id })
        })
    }
}

/// Creates [`PaperSession`]s over one shared account.
pub struct PaperSessionFactory {
    account: Arc<Mutex<PaperAccount>>,
    confirmation_ttl: Duration,
}

impl PaperSessionFactory {
    pub fn new(config: PaperConfig) -> Self {
        Self {
            account: Arc::new(Mutex::new(PaperAccount {
                cash: config.initial_cash,
                holdings: config.holdings,
                fills: Vec::new(),
            })),
            confirmation_ttl: Duration::from_secs(config.confirmation_ttl_secs),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.account.lock().cash
    }

    pub fn holding(&self, product_id: &str) -> u32 {
        self.account
            .lock()
            .holdings
            .get(product_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn fills(&self) -> Vec<PaperFill> {
        self.account.lock().fills.clone()
    }
}

impl SessionFactory for PaperSessionFactory {
    fn create(&self, credentials: &Credentials) -> SessionResult<DynSession> {
        Ok(Box::new(PaperSession {
            credentials: credentials.clone(),
            account: self.account.clone(),
            confirmation_ttl: self.confirmation_ttl,
            pending: HashMap::new(),
            used: HashSet::new(),
            connected: false,
        }))
    }
}
