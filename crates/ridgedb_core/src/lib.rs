//! Embedded database core.
//!
//! Commands arrive already bound to catalog objects. A [`engine::session::Session`]
//! runs them inside transactions, while catalog changes go through the
//! database's system session and are versioned independently of user
//! transactions.
pub mod catalog;
pub mod command;
pub mod config;
pub mod engine;
pub mod expr;
pub mod scalar;
pub mod storage;
