//! Session keep-alive.
//!
//! Two supervised loops run against the [`SessionGuard`]:
//! - refresh: a lightweight account call every `refresh_interval`
//! - recreate: a full session replacement every `recreate_interval`
//!
//! A failed or panicking iteration is logged and counted; the loop carries
//! on with its next tick.

use crate::error::{ExecutorError, ExecutorResult, SessionError};
use crate::guard::SessionGuard;
use futures_util::FutureExt;
use preorder_telemetry::Metrics;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    pub refresh_interval: Duration,
    pub recreate_interval: Duration,
    /// Upper bound for one refresh call.
    pub call_timeout: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            recreate_interval: Duration::from_secs(600),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Handles of the two keep-alive loops.
pub struct KeepAliveHandles {
    pub refresh: JoinHandle<()>,
    pub recreate: JoinHandle<()>,
}

/// Spawn the refresh and recreate loops.
pub fn spawn_keepalive(
    guard: Arc<SessionGuard>,
    config: KeepAliveConfig,
    shutdown: CancellationToken,
) -> KeepAliveHandles {
    let refresh_guard = guard.clone();
    let call_timeout = config.call_timeout;
    let refresh = tokio::spawn(run_periodic(
        "refresh",
        config.refresh_interval,
        shutdown.clone(),
        move || {
            let guard = refresh_guard.clone();
            async move { refresh_once(&guard, call_timeout).await }
        },
    ));

    let recreate = tokio::spawn(run_periodic(
        "recreate",
        config.recreate_interval,
        shutdown,
        move || {
            let guard = guard.clone();
            async move { guard.replace().await.map_err(ExecutorError::from) }
        },
    ));

    KeepAliveHandles { refresh, recreate }
}

/// One refresh call through the guard, bounded by `call_timeout`.
pub async fn refresh_once(guard: &SessionGuard, call_timeout: Duration) -> ExecutorResult<()> {
    guard
        .with_session(move |session| {
            Box::pin(async move {
                match tokio::time::timeout(call_timeout, session.refresh_account_info()).await {
                    Ok(result) => result,
                    Err(_) => Err(SessionError::Timeout("refresh_account_info".to_string())),
                }
            })
        })
        .await?;
    debug!("Session refreshed");
    Ok(())
}

/// Run `task` every `period` until `shutdown` is cancelled.
///
/// The first run happens one period after start. Each run is isolated:
/// errors and panics are logged and the loop continues.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut task: F,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ExecutorResult<()>> + Send,
{
    info!(task = name, period_secs = period.as_secs(), "Keep-alive loop started");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!(task = name, "Keep-alive loop stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        match AssertUnwindSafe(task()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                Metrics::keepalive_failure(name);
                warn!(task = name, error = %e, "Keep-alive iteration failed");
            }
            Err(panic) => {
                Metrics::keepalive_failure(name);
                error!(
                    task = name,
                    panic = %panic_message(panic.as_ref()),
                    "Keep-alive iteration panicked"
                );
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
