//! Brokerage session abstraction.
//!
//! A session is a stateful, authenticated handle that is not safe for
//! concurrent use. It is only ever reached through [`SessionGuard`], which
//! hands out `&mut` access to one caller at a time.
//!
//! [`SessionGuard`]: crate::guard::SessionGuard

use crate::error::SessionResult;
use preorder_core::{BoxFuture, OrderRequest};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Brokerage login. The password is wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
    account_id: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            account_id: account_id.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// All three fields are present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty() && !self.account_id.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Result of the pre-trade check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The venue will accept the order; confirm with this id.
    Accepted { confirmation_id: String },
    /// The venue refuses the order outright.
    Rejected { reason: String },
}

/// Result of confirming a checked order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Accepted { order_id: String },
    Rejected { reason: String },
}

/// Authenticated brokerage handle.
pub trait BrokerSession: Send {
    /// Log in.
    fn connect(&mut self) -> BoxFuture<'_, SessionResult<()>>;

    /// Lightweight call that keeps the login alive.
    fn refresh_account_info(&mut self) -> BoxFuture<'_, SessionResult<()>>;

    /// Pre-trade check. Acceptance yields a confirmation id.
    fn check_order<'a>(
        &'a mut self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<CheckOutcome>>;

    /// Place a previously checked order.
    fn confirm_order<'a>(
        &'a mut self,
        confirmation_id: &'a str,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, SessionResult<ConfirmOutcome>>;
}

/// Boxed session as held by the guard.
pub type DynSession = Box<dyn BrokerSession>;

/// Builds unconnected sessions.
pub trait SessionFactory: Send + Sync {
    fn create(&self, credentials: &Credentials) -> SessionResult<DynSession>;
}
