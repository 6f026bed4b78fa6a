// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted compiler and recording diagnostic sink.

use kiln_core::{
    CompilerError, CompilerIssue, Diagnostic, DiagnosticSink, FrameCompiler, FrameId, FrameView,
    IssueMap, ObjectId, StableFrame,
};
use std::cell::Cell;

/// Compiler fake that returns a scripted outcome.
///
/// On success the "plan" is the id of the compiled frame, which lets tests
/// check which frame reached the compiler.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    issues: Vec<(ObjectId, CompilerIssue)>,
    internal: Option<String>,
    calls: Cell<usize>,
}

impl ScriptedCompiler {
    /// Compiler that always succeeds.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Compiler that fails with an internal error.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            internal: Some(message.into()),
            ..Self::default()
        }
    }

    /// Adds an issue reported for `object`; issues are reported in the order
    /// they are added here.
    pub fn with_issue(mut self, object: ObjectId, issue: CompilerIssue) -> Self {
        self.issues.push((object, issue));
        self
    }

    /// Number of `compile` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl FrameCompiler for ScriptedCompiler {
    type Plan = FrameId;

    fn compile(&self, frame: &StableFrame) -> Result<FrameId, CompilerError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(message) = &self.internal {
            return Err(CompilerError::Internal(message.clone()));
        }
        if self.issues.is_empty() {
            return Ok(frame.id());
        }
        Err(CompilerError::Issues(
            self.issues.iter().cloned().collect::<IssueMap>(),
        ))
    }
}

/// Sink that keeps every diagnostic it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    diagnostics: Vec<Diagnostic>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics rendered as one line each.
    pub fn lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    /// Subject objects in emission order.
    pub fn objects(&self) -> Vec<Option<ObjectId>> {
        self.diagnostics.iter().map(|d| d.object).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}
