//! Query records and the lifecycle that drives them.
//!
//! A query is created running at submission and moved to a terminal state
//! by notifications from the execution backend.

pub mod events;
pub mod lifecycle;
pub mod spec;
pub mod types;

pub use events::{Effect, Notification, QueryEvent};
pub use lifecycle::{IgnoreReason, QueryLifecycle, StopOutcome, TransitionOutcome};
pub use spec::{QuerySpec, SqlType};
pub use types::{row, ColumnInfo, Query, QueryId, QueryResults, QueryState, Row, Value};
