//! Session guard.
//!
//! Owns the single live brokerage session. Every use of the session, and
//! every replacement, happens while holding one async mutex, so calls on the
//! session are strictly serialized. The lock is released on every exit path
//! of the caller's closure, including unwinding. Logins are bounded by
//! `connect_timeout` so a hung login cannot hold the lock.

use crate::error::{SessionError, SessionResult};
use crate::session::{Credentials, DynSession, SessionFactory};
use preorder_core::BoxFuture;
use preorder_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct SessionGuard {
    session: Mutex<DynSession>,
    factory: Arc<dyn SessionFactory>,
    credentials: Credentials,
    connect_timeout: Duration,
}

impl SessionGuard {
    /// Build and connect the first session.
    pub async fn connect(
        factory: Arc<dyn SessionFactory>,
        credentials: Credentials,
        connect_timeout: Duration,
    ) -> SessionResult<Self> {
        let session = open_session(factory.as_ref(), &credentials, connect_timeout).await?;
        info!(account = credentials.account_id(), "Broker session established");
        Ok(Self {
            session: Mutex::new(session),
            factory,
            credentials,
            connect_timeout,
        })
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// Move owned data into the closure; the session reference is only valid
    /// for the returned future.
    pub async fn with_session<T, F>(&self, f: F) -> T
    where
        F: for<'s> FnOnce(&'s mut DynSession) -> BoxFuture<'s, T>,
    {
        let mut session = self.session.lock().await;
        f(&mut *session).await
    }

    /// Build and connect a fresh session, then swap it in.
    ///
    /// On failure the current session stays in place and the error is
    /// returned after logging.
    pub async fn replace(&self) -> SessionResult<()> {
        let mut session = self.session.lock().await;
        match open_session(self.factory.as_ref(), &self.credentials, self.connect_timeout).await {
            Ok(fresh) => {
                *session = fresh;
                Metrics::session_replaced(true);
                info!("Broker session replaced");
                Ok(())
            }
            Err(e) => {
                Metrics::session_replaced(false);
                warn!(error = %e, kind = e.kind(), "Session replacement failed, keeping current session");
                Err(e)
            }
        }
    }
}

async fn open_session(
    factory: &dyn SessionFactory,
    credentials: &Credentials,
    connect_timeout: Duration,
) -> SessionResult<DynSession> {
    let mut session = factory.create(credentials)?;
    match tokio::time::timeout(connect_timeout, session.connect()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SessionError::Timeout(format!(
                "connect exceeded {}s",
                connect_timeout.as_secs()
            )))
        }
    }
    Ok(session)
}
