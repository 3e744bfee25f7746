#![forbid(unsafe_code)]

//! Core library behind the tubescribe server: locator parsing, provider
//! clients, the SQLite record store and the transcript orchestration flow.

pub mod api;
pub mod config;
pub mod error;
pub mod locator;
pub mod orchestrator;
pub mod providers;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
