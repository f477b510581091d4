//! Deterministic Chrome automation core over CDP.
//!
//! The middle layer between raw DevTools traffic and three external
//! surfaces: an in-page recorder, a tool-calling agent, and a script
//! player. The pieces:
//!
//! - [`browser`] — transport ownership, Chrome discovery, tab registry
//! - [`snapshot`] — the `@eN` registry built from the accessibility tree
//! - [`locator`] — identifier resolution with iframe descent and retries
//! - [`executor`] — the semantic-operation vocabulary and its envelope
//! - [`recorder`] — the polling mailbox bridge to the injected recorder
//! - [`player`] — recorded-script replay, script library, run history
//! - [`screencast`] — frame capture worker and GIF assembly

pub mod browser;
pub mod config;
pub mod error;
pub mod executor;
pub mod locator;
pub mod player;
pub mod recorder;
pub mod screencast;
pub mod snapshot;

pub use browser::BrowserManager;
pub use config::Config;
pub use error::{AutomationError, ErrorKind, Result};
pub use executor::{Executor, Operation, OperationResult};
pub use player::{PlayOptions, Player, RecordedScript, ScriptLibrary};
