// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame validation against the metamodel.
//!
//! The validator never stops at the first problem: every object is checked
//! and every violation is collected, so one failed accept reports the full
//! list.
//!
//! Per object, in ascending id order:
//! 1. the type name resolves in the metamodel (otherwise nothing else is
//!    checked);
//! 2. the structure kind matches the resolved type's structural kind;
//! 3. edge endpoints exist in the same frame and are nodes;
//! 4. every attribute key is declared by the type;
//! 5. every attribute value is finite and converts to its declared type.
use std::collections::BTreeMap;

use thiserror::Error;

use crate::frame::FrameView;
use crate::ident::ObjectId;
use crate::metamodel::{Metamodel, StructuralKind};
use crate::object::{DesignObject, Structure};
use crate::value::ValueType;

/// Which end of an edge a reference error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeEndpoint {
    /// The edge origin.
    Origin,
    /// The edge target.
    Target,
}

impl core::fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Origin => "origin",
            Self::Target => "target",
        })
    }
}

/// A problem with one object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// The object's type is not part of the validating metamodel.
    #[error("unknown object type {0}")]
    UnknownObjectType(String),
    /// The object's structure does not match its type.
    #[error("structure is {found}, type declares {expected}")]
    StructureMismatch {
        /// Structure kind of the object.
        found: StructuralKind,
        /// Kind declared by the type.
        expected: StructuralKind,
    },
    /// An edge endpoint is not in the frame.
    #[error("{endpoint} {target} does not exist")]
    BrokenReference {
        /// Which endpoint.
        endpoint: EdgeEndpoint,
        /// Missing object.
        target: ObjectId,
    },
    /// An edge endpoint exists but is not a node.
    #[error("{endpoint} {target} is not a node")]
    EndpointNotNode {
        /// Which endpoint.
        endpoint: EdgeEndpoint,
        /// Offending object.
        target: ObjectId,
    },
    /// The attribute is not declared by the type.
    #[error("unknown attribute {0}")]
    UnknownAttribute(String),
    /// The attribute value does not convert to its declared type.
    #[error("attribute {attribute} expects {expected}, got {found}")]
    TypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Declared type.
        expected: ValueType,
        /// Stored type.
        found: ValueType,
    },
    /// The attribute holds a NaN or infinite double.
    #[error("attribute {0} holds a non-finite number")]
    NonFiniteNumber(String),
}

/// One violation: the object it concerns and what is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Offending object.
    pub object: ObjectId,
    /// Problem found.
    pub error: ObjectError,
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.object, self.error)
    }
}

/// Aggregate validation failure.
///
/// `violations` lists every problem in canonical order (ascending object id,
/// then check order). `object_errors` indexes the same problems by object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("frame failed validation with {} violation(s)", .violations.len())]
pub struct ValidationFailure {
    violations: Vec<Violation>,
    object_errors: BTreeMap<ObjectId, Vec<ObjectError>>,
}

impl ValidationFailure {
    /// Builds the aggregate from an ordered violation list.
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let mut object_errors: BTreeMap<ObjectId, Vec<ObjectError>> = BTreeMap::new();
        for v in &violations {
            object_errors.entry(v.object).or_default().push(v.error.clone());
        }
        Self {
            violations,
            object_errors,
        }
    }

    /// Every violation, in canonical order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations grouped by object.
    #[must_use]
    pub fn object_errors(&self) -> &BTreeMap<ObjectId, Vec<ObjectError>> {
        &self.object_errors
    }

    /// Errors for one object (empty if it is clean).
    #[must_use]
    pub fn errors_for(&self, object: ObjectId) -> &[ObjectError] {
        self.object_errors.get(&object).map_or(&[], Vec::as_slice)
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns `true` when nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks frames against one metamodel.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'m> {
    metamodel: &'m Metamodel,
}

impl<'m> Validator<'m> {
    /// Creates a validator for `metamodel`.
    #[must_use]
    pub fn new(metamodel: &'m Metamodel) -> Self {
        Self { metamodel }
    }

    /// Validates every object of `frame`.
    ///
    /// # Errors
    /// Returns a [`ValidationFailure`] holding all violations when at least
    /// one is found.
    pub fn validate<F: FrameView + ?Sized>(&self, frame: &F) -> Result<(), ValidationFailure> {
        let mut violations = Vec::new();
        for object in frame.objects() {
            self.check_object(frame, object, &mut violations);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure::from_violations(violations))
        }
    }

    fn check_object<F: FrameView + ?Sized>(
        &self,
        frame: &F,
        object: &DesignObject,
        out: &mut Vec<Violation>,
    ) {
        let mut report = |error| {
            out.push(Violation {
                object: object.id(),
                error,
            });
        };
        // Checks run against the metamodel's descriptor, never the one the
        // object carries.
        let Some(ty) = self.metamodel.object_type(object.type_name()) else {
            report(ObjectError::UnknownObjectType(object.type_name().to_owned()));
            return;
        };

        let found = object.structure().kind();
        if found != ty.structural_kind() {
            report(ObjectError::StructureMismatch {
                found,
                expected: ty.structural_kind(),
            });
        }

        if let Structure::Edge { origin, target } = object.structure() {
            for (endpoint, id) in [(EdgeEndpoint::Origin, origin), (EdgeEndpoint::Target, target)] {
                match frame.object(id) {
                    None => report(ObjectError::BrokenReference {
                        endpoint,
                        target: id,
                    }),
                    Some(other) if other.structure() != Structure::Node => {
                        report(ObjectError::EndpointNotNode {
                            endpoint,
                            target: id,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        for (name, value) in object.attributes() {
            match ty.attribute(name) {
                None => report(ObjectError::UnknownAttribute(name.clone())),
                Some(_) if !value.is_finite() => {
                    report(ObjectError::NonFiniteNumber(name.clone()));
                }
                Some(attr) if !value.is_convertible(attr.value_type) => {
                    report(ObjectError::TypeMismatch {
                        attribute: name.clone(),
                        expected: attr.value_type,
                        found: value.value_type(),
                    });
                }
                Some(_) => {}
            }
        }
    }
}
