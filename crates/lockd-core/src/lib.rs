//! # lockd Core Library
//!
//! This library provides the access-control and time-accounting engine behind
//! the lockd site governor. A browser extension (or any other host) forwards
//! navigation, tab and focus events to the engine and applies the overlay and
//! alarm commands it returns. The `lockd-cli` binary is a thin host over the
//! same library: it inspects and edits state, and runs the native-messaging
//! bridge.
//!
//! ## Architecture
//!
//! - **Governor Engine**: a synchronous state machine that requires the host
//!   to call `try_tick()` once per second and `flush()` periodically
//! - **Policy**: hostname matching and the ordered access-decision rules
//! - **Ration**: daily per-domain time budgets with additive overtime
//! - **Storage**: SQLite key/value state and TOML runtime settings
//!
//! ## Key Components
//!
//! - [`GovernorEngine`]: owns all governor state and dispatches events
//! - [`Decision`]: outcome of an access check
//! - [`Database`]: durable state store
//! - [`GovernorConfig`]: governed sites and prompt settings

pub mod analytics;
pub mod engine;
pub mod error;
pub mod events;
pub mod feelings;
pub mod messages;
pub mod pass;
pub mod policy;
pub mod ration;
pub mod scheduler;
pub mod storage;
pub mod tracker;

pub use engine::{overlay_for, AccessCheck, GovernorEngine, Navigation, TickReport};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{Event, OverlayMode};
pub use feelings::{Feeling, FeelingEntry};
pub use messages::{Request, Response};
pub use pass::{Pass, PassKind};
pub use policy::{Decision, MatchMode, SitePolicy};
pub use ration::RationStatus;
pub use scheduler::{TickGate, TickOutcome, TickPermit, FLUSH_INTERVAL, TICK_INTERVAL};
pub use storage::{Database, GovernorConfig, MemoryStore, RuntimeSettings, StateStore};
pub use tracker::{TabId, TabInfo, WindowId};
