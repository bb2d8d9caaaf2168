//! Quote Sync Server
//!
//! A small HTTP server holding shared quote collections, speaking the same
//! wire contract as the quote sync gateway.

pub mod server;

pub use server::{router, AppState};
