//! folio - terminal chat client for a book-recommendation service
//!
//! The library holds everything but argument parsing: message classification,
//! chat persistence, the recommendation and sync clients, rendering, and the
//! chat controller that ties them together. `tui` drives the controller from
//! a terminal.

pub mod chat;
pub mod classify;
pub mod client;
pub mod config;
pub mod context;
pub mod dialog;
pub mod error;
pub mod logging;
pub mod models;
pub mod render;
pub mod store;
pub mod sync;
pub mod tui;

pub use chat::{ChatManager, PendingTurn, TurnOutcome, TurnReport, TurnResult};
pub use error::{ChatError, ChatResult};
pub use store::ChatStore;
