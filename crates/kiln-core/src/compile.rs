// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compiler adapter: runs a [`FrameCompiler`] over a committed frame and
//! turns a failed compile into per-object diagnostics.
//!
//! The adapter never returns a partial plan. On failure it emits every issue
//! to its [`DiagnosticSink`] (ascending object id, then the order the compiler
//! reported them) and only then returns one aggregate
//! [`DesignError::Compilation`].
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, error};

use crate::error::DesignError;
use crate::frame::{FrameView, StableFrame};
use crate::history::Design;
use crate::ident::ObjectId;

/// One issue reported by a compiler for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerIssue {
    /// What is wrong.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
}

impl CompilerIssue {
    /// Issue without a hint.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }

    /// Issue with a remediation hint.
    pub fn with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Issues grouped by subject object.
///
/// Objects iterate in ascending id order; issues of one object keep the order
/// they were pushed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueMap {
    issues: BTreeMap<ObjectId, Vec<CompilerIssue>>,
}

impl IssueMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an issue for `object`.
    pub fn push(&mut self, object: ObjectId, issue: CompilerIssue) {
        self.issues.entry(object).or_default().push(issue);
    }

    /// Issues recorded for `object`.
    #[must_use]
    pub fn issues_for(&self, object: ObjectId) -> &[CompilerIssue] {
        self.issues.get(&object).map_or(&[], Vec::as_slice)
    }

    /// Total number of issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    /// Returns `true` when no issue was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// `(object, issue)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &CompilerIssue)> {
        self.issues
            .iter()
            .flat_map(|(id, list)| list.iter().map(move |issue| (*id, issue)))
    }
}

impl FromIterator<(ObjectId, CompilerIssue)> for IssueMap {
    fn from_iter<T: IntoIterator<Item = (ObjectId, CompilerIssue)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (object, issue) in iter {
            map.push(object, issue);
        }
        map
    }
}

/// Failure reported by a [`FrameCompiler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilerError {
    /// Per-object problems in the frame.
    #[error("{} compiler issue(s)", .0.len())]
    Issues(IssueMap),
    /// The compiler itself failed.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Turns a committed frame into an executable plan.
pub trait FrameCompiler {
    /// Compiled artifact.
    type Plan;

    /// Compiles `frame`.
    ///
    /// # Errors
    /// [`CompilerError::Issues`] for problems attributable to objects;
    /// [`CompilerError::Internal`] for everything else.
    fn compile(&self, frame: &StableFrame) -> Result<Self::Plan, CompilerError>;
}

/// One formatted diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Subject object (`None` for internal compiler errors).
    pub object: Option<ObjectId>,
    /// Subject's `name` attribute, when it has one.
    pub object_name: Option<String>,
    /// What is wrong.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match (self.object, &self.object_name) {
            (Some(id), Some(name)) => write!(f, "error[{id} {name}]: {}", self.message)?,
            (Some(id), None) => write!(f, "error[{id}]: {}", self.message)?,
            (None, _) => write!(f, "error: {}", self.message)?,
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Receives diagnostics as the adapter emits them.
pub trait DiagnosticSink {
    /// Handles one diagnostic.
    fn emit(&mut self, diagnostic: &Diagnostic);
}

/// Default sink: one `tracing` error event per diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        error!(
            object = ?diagnostic.object,
            name = diagnostic.object_name.as_deref(),
            hint = diagnostic.hint.as_deref(),
            "{}",
            diagnostic.message
        );
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic);
    }
}

/// Aggregate compile failure; its diagnostics were already emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation failed with {} diagnostic(s)", .diagnostics.len())]
pub struct CompilationFailure {
    diagnostics: Vec<Diagnostic>,
}

impl CompilationFailure {
    /// Diagnostics in emission order.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Runs a compiler and reports its failures.
#[derive(Debug)]
pub struct CompilerAdapter<C, S = TracingSink> {
    compiler: C,
    sink: S,
}

impl<C: FrameCompiler> CompilerAdapter<C, TracingSink> {
    /// Adapter that logs diagnostics through `tracing`.
    pub fn new(compiler: C) -> Self {
        Self::with_sink(compiler, TracingSink)
    }
}

impl<C: FrameCompiler, S: DiagnosticSink> CompilerAdapter<C, S> {
    /// Adapter emitting to a custom sink.
    pub fn with_sink(compiler: C, sink: S) -> Self {
        Self { compiler, sink }
    }

    /// The wrapped compiler.
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Splits the adapter back into compiler and sink.
    pub fn into_parts(self) -> (C, S) {
        (self.compiler, self.sink)
    }

    /// Compiles `frame` into a complete plan.
    ///
    /// # Errors
    /// [`DesignError::Compilation`] after every diagnostic has been emitted.
    pub fn compile(&mut self, frame: &StableFrame) -> Result<C::Plan, DesignError> {
        let err = match self.compiler.compile(frame) {
            Ok(plan) => {
                debug!(frame = %frame.id(), "frame compiled");
                return Ok(plan);
            }
            Err(err) => err,
        };
        let diagnostics: Vec<Diagnostic> = match err {
            CompilerError::Issues(issues) => issues
                .iter()
                .map(|(id, issue)| Diagnostic {
                    object: Some(id),
                    object_name: frame
                        .object(id)
                        .and_then(|o| o.name())
                        .map(str::to_owned),
                    message: issue.message.clone(),
                    hint: issue.hint.clone(),
                })
                .collect(),
            CompilerError::Internal(message) => vec![Diagnostic {
                object: None,
                object_name: None,
                message,
                hint: None,
            }],
        };
        for diagnostic in &diagnostics {
            self.sink.emit(diagnostic);
        }
        Err(DesignError::Compilation(CompilationFailure { diagnostics }))
    }

    /// Compiles the design's current frame.
    ///
    /// # Errors
    /// [`DesignError::EmptyDesign`] when nothing is committed, otherwise as
    /// [`Self::compile`].
    pub fn compile_current(&mut self, design: &Design) -> Result<C::Plan, DesignError> {
        let frame = design.require_current()?;
        self.compile(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_map_orders_objects_then_insertion() {
        let a = ObjectId::from_raw(2);
        let b = ObjectId::from_raw(1);
        let map: IssueMap = [
            (a, CompilerIssue::new("second object, first issue")),
            (b, CompilerIssue::new("first object")),
            (a, CompilerIssue::new("second object, second issue")),
        ]
        .into_iter()
        .collect();
        let order: Vec<_> = map.iter().map(|(_, i)| i.message.as_str()).collect();
        assert_eq!(
            order,
            [
                "first object",
                "second object, first issue",
                "second object, second issue"
            ]
        );
        assert_eq!(map.len(), 3);
        assert_eq!(map.issues_for(a).len(), 2);
    }

    #[test]
    fn diagnostic_renders_one_line() {
        let d = Diagnostic {
            object: Some(ObjectId::from_raw(7)),
            object_name: Some("inventory".into()),
            message: "formula is empty".into(),
            hint: Some("give the stock an initial value".into()),
        };
        assert_eq!(
            d.to_string(),
            "error[#7 inventory]: formula is empty (hint: give the stock an initial value)"
        );
        let internal = Diagnostic {
            object: None,
            object_name: None,
            message: "boom".into(),
            hint: None,
        };
        assert_eq!(internal.to_string(), "error: boom");
    }
}
