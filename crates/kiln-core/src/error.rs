// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy shared by every design operation.
use thiserror::Error;

use crate::compile::CompilationFailure;
use crate::foreign::ForeignFrameError;
use crate::ident::{FrameId, ObjectId};
use crate::metamodel::StructuralKind;
use crate::store::StoreError;
use crate::validate::ValidationFailure;
use crate::value::{ValueError, ValueType};

/// Errors emitted by design, frame, validation and compilation operations.
///
/// Per-field problems (structure, assignment, type) are raised as soon as
/// they are detected. Validation and compilation problems are aggregated over
/// the whole frame and raised once.
#[derive(Debug, Error)]
pub enum DesignError {
    /// The referenced frame is not part of the committed history.
    #[error("unknown frame: {0}")]
    UnknownFrame(FrameId),
    /// A frame with this id is already part of the committed history.
    #[error("frame {0} is already committed")]
    FrameAlreadyCommitted(FrameId),
    /// The referenced object does not exist in the frame.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),
    /// The type name is not in the metamodel catalog.
    #[error("unknown object type: {0}")]
    UnknownObjectType(String),
    /// The attribute is not declared by the object's type.
    #[error("type {object_type} has no attribute {attribute}")]
    UnknownAttribute {
        /// Type of the object being written.
        object_type: String,
        /// Offending attribute name.
        attribute: String,
    },
    /// The requested structure does not match the type's structural kind.
    #[error("structural type mismatch: requested {requested}, type declares {declared}")]
    StructuralTypeMismatch {
        /// Structure supplied by the caller.
        requested: StructuralKind,
        /// Structure declared by the object type.
        declared: StructuralKind,
    },
    /// Malformed `name=value` text or an unparsable array literal.
    #[error("invalid attribute assignment `{text}`: {reason}")]
    InvalidAttributeAssignment {
        /// The offending input.
        text: String,
        /// Why the input was rejected.
        #[source]
        reason: ValueError,
    },
    /// The value kind is incompatible with the declared attribute type.
    #[error("type mismatch for attribute {attribute}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Attribute being written.
        attribute: String,
        /// Declared type.
        expected: ValueType,
        /// Type of the supplied value.
        found: ValueType,
    },
    /// The frame failed validation; carries every violation found.
    #[error(transparent)]
    ConstraintViolation(ValidationFailure),
    /// The frame failed to compile; diagnostics were emitted before raising.
    #[error(transparent)]
    Compilation(CompilationFailure),
    /// The cursor is already at the oldest undoable frame.
    #[error("no changes to undo")]
    NoChangesToUndo,
    /// The cursor is already at the newest frame.
    #[error("no changes to redo")]
    NoChangesToRedo,
    /// The operation needs at least one committed frame.
    #[error("design has no committed frame")]
    EmptyDesign,
    /// A foreign frame could not be read or imported.
    #[error("foreign frame: {0}")]
    ForeignFrame(#[from] ForeignFrameError),
    /// The design could not be loaded from its persistent store.
    #[error("persistent store: {0}")]
    PersistentStore(#[source] StoreError),
    /// The design could not be written to its persistent store.
    #[error("unable to save design: {0}")]
    UnableToSaveDesign(#[source] StoreError),
}

impl DesignError {
    /// Optional remediation hint for user-facing surfaces.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownFrame(_) => {
                Some("the frame may have been dropped by a newer edit; pick a frame from the history")
            }
            Self::FrameAlreadyCommitted(_) => Some("derive a new pending frame for further edits"),
            Self::UnknownObjectType(_) => Some("check the type name against the metamodel catalog"),
            Self::UnknownAttribute { .. } => {
                Some("check the attribute name against the object type's schema")
            }
            Self::StructuralTypeMismatch { .. } => {
                Some("create node types as nodes and edge types with origin and target endpoints")
            }
            Self::InvalidAttributeAssignment { .. } => Some(
                "use name=value; array attributes take a JSON array literal such as [1, 2, 3]",
            ),
            Self::TypeMismatch { .. } => Some("convert the value to the attribute's declared type"),
            Self::ConstraintViolation(_) => {
                Some("fix every listed violation, then accept the frame again")
            }
            Self::Compilation(_) => Some("see the emitted diagnostics for per-object hints"),
            Self::EmptyDesign => Some("create and accept a frame first"),
            Self::PersistentStore(_) => Some("check that the design exists and is readable"),
            Self::UnableToSaveDesign(_) => Some("check that the design location is writable"),
            Self::UnknownObject(_)
            | Self::NoChangesToUndo
            | Self::NoChangesToRedo
            | Self::ForeignFrame(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_mismatch_names_both_kinds() {
        let err = DesignError::StructuralTypeMismatch {
            requested: StructuralKind::Node,
            declared: StructuralKind::Edge,
        };
        assert_eq!(
            err.to_string(),
            "structural type mismatch: requested node, type declares edge"
        );
        assert!(err.hint().is_some());
    }

    #[test]
    fn history_boundaries_have_no_hint() {
        assert!(DesignError::NoChangesToUndo.hint().is_none());
        assert!(DesignError::NoChangesToRedo.hint().is_none());
    }
}
