#![forbid(unsafe_code)]

pub mod config;
pub mod demo;
pub mod error;
mod ledger;
pub mod render;
pub mod routes;
pub mod state;
mod support;
pub mod tools;
pub mod tsa;

pub use ledger::HISTORY_LIMIT;
pub use routes::{bind, router, serve};
pub use state::{AppState, DbHealth, StateOptions};
