//! Brokerage access and preorder execution.
//!
//! - [`SessionGuard`]: single owner of the brokerage session, serialized access
//! - keep-alive loops that refresh and periodically recreate the session
//! - [`OrderEvaluator`]: eligibility and the check/confirm submission protocol
//! - [`PaperSessionFactory`]: simulated brokerage for dry runs
//! - [`mock`]: scriptable broker for tests

pub mod eligibility;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod keepalive;
pub mod mock;
pub mod paper;
pub mod session;

pub use eligibility::{band, check_eligibility, Band, Ineligible};
pub use error::{ExecutorError, ExecutorResult, SessionError, SessionResult};
pub use evaluator::{EvaluationSummary, EvaluatorConfig, OrderEvaluator, Submission};
pub use guard::SessionGuard;
pub use keepalive::{refresh_once, run_periodic, spawn_keepalive, KeepAliveConfig, KeepAliveHandles};
pub use paper::{PaperConfig, PaperFill, PaperSession, PaperSessionFactory};
pub use session::{
    BrokerSession, CheckOutcome, ConfirmOutcome, Credentials, DynSession, SessionFactory,
};
