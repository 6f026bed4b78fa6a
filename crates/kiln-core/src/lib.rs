// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! kiln-core: versioned, typed design graph with validated frames.
//!
//! A [`Design`] owns an arena of committed [`StableFrame`]s and an undo/redo
//! cursor. Edits happen in a [`PendingFrame`] derived by value from one
//! committed frame; [`Design::accept`] validates it against the design's
//! [`Metamodel`] and either commits it whole or hands it back untouched.
//! Committed frames compile into a [`SimulationPlan`] through a
//! [`CompilerAdapter`], which reports failures as per-object diagnostics.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Built-in stock-and-flow metamodel catalog.
pub mod catalog;
mod compile;
mod error;
mod foreign;
mod frame;
mod history;
mod ident;
mod metamodel;
mod object;
mod plan;
mod store;
mod validate;
mod value;

// Re-exports for stable public API
/// Compiler port, diagnostics and the adapter that reports them.
pub use compile::{
    CompilationFailure, CompilerAdapter, CompilerError, CompilerIssue, Diagnostic,
    DiagnosticSink, FrameCompiler, IssueMap, TracingSink,
};
/// Error taxonomy for every design operation.
pub use error::DesignError;
/// Foreign frame port.
pub use foreign::{ForeignFrame, ForeignFrameError, ForeignFrameReader, ForeignObject, ForeignStructure};
/// Committed and pending frames.
pub use frame::{FrameView, PendingFrame, StableFrame};
/// Design history.
pub use history::{Design, Rejected};
/// Identifier types.
pub use ident::{FrameId, Hash, IdentitySequence, ObjectId};
/// Metamodel descriptors.
pub use metamodel::{Attribute, Metamodel, MetamodelBuilder, MetamodelError, ObjectType, StructuralKind};
/// Objects and their write handle.
pub use object::{DesignObject, MutableObject, Structure};
/// Reference stock-and-flow compiler.
pub use plan::{
    AuxiliaryPlan, FlowPlan, GraphicalFunctionPlan, SimulationPlan, StockFlowCompiler, StockPlan,
};
/// Persistent-store port and archive records.
pub use store::{DesignArchive, DesignRecord, DesignStore, FrameRecord, ObjectRecord, StoreError};
/// Frame validation.
pub use validate::{EdgeEndpoint, ObjectError, ValidationFailure, Validator, Violation};
/// Value model.
pub use value::{parse_assignment, AtomType, ValueError, ValueType, Variant, VariantArray};
