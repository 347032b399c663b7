#![doc(test(attr(deny(warnings))))]

//! Freelance Core prices offers and invoices for freelance work: billable
//! entries, document totals, finish-date estimates and the JSON store that
//! keeps clients and projects on disk.

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod export;
pub mod storage;
pub mod utils;

pub use errors::{CoreError, Result};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Freelance Core tracing initialized.");
    });
}
