// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Kiln crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`store`] - In-memory design store fake for testing without filesystem
//! - [`compiler`] - Scripted compiler and recording diagnostic sink
//! - [`designs`] - Design builders over the stock-and-flow catalog

pub mod compiler;
pub mod designs;
pub mod store;

// Re-export commonly used items at crate root for convenience
pub use compiler::{RecordingSink, ScriptedCompiler};
pub use designs::{commit, stock_flow_design, DesignBuilder};
pub use store::InMemoryDesignStore;
