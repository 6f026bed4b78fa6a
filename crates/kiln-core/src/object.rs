// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Design objects and the write handle used inside pending frames.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::ATTR_NAME;
use crate::error::DesignError;
use crate::ident::ObjectId;
use crate::metamodel::{ObjectType, StructuralKind};
use crate::value::{parse_assignment, ValueType, Variant};

/// Graph structure of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Structure {
    /// Free-standing object.
    Unstructured,
    /// Graph node.
    Node,
    /// Directed edge between two objects of the same frame.
    Edge {
        /// Source endpoint.
        origin: ObjectId,
        /// Destination endpoint.
        target: ObjectId,
    },
}

impl Structure {
    /// Structural kind of this structure.
    #[must_use]
    pub fn kind(&self) -> StructuralKind {
        match self {
            Self::Unstructured => StructuralKind::Unstructured,
            Self::Node => StructuralKind::Node,
            Self::Edge { .. } => StructuralKind::Edge,
        }
    }

    /// `(origin, target)` for edges.
    #[must_use]
    pub fn endpoints(&self) -> Option<(ObjectId, ObjectId)> {
        match self {
            Self::Edge { origin, target } => Some((*origin, *target)),
            Self::Unstructured | Self::Node => None,
        }
    }
}

/// One object of a frame.
///
/// Objects are plain values: deriving a frame copies them, so edits in a
/// pending frame never reach the committed frame they were copied from.
/// Attribute writes go through [`MutableObject`], which only pending frames
/// hand out.
///
/// Invariants
/// - `structure.kind()` is checked against `object_type` at creation; the
///   validator re-checks it before commit.
/// - Attribute keys may include names outside the type schema while the
///   object lives in a pending frame; validation rejects them.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignObject {
    id: ObjectId,
    object_type: Arc<ObjectType>,
    structure: Structure,
    attributes: BTreeMap<String, Variant>,
}

impl DesignObject {
    /// Creates an object and applies the type's attribute defaults.
    pub(crate) fn new(id: ObjectId, object_type: Arc<ObjectType>, structure: Structure) -> Self {
        let attributes = object_type
            .attributes()
            .iter()
            .filter_map(|a| a.default.clone().map(|d| (a.name.clone(), d)))
            .collect();
        Self {
            id,
            object_type,
            structure,
            attributes,
        }
    }

    /// Object id.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Object type descriptor.
    #[must_use]
    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.object_type
    }

    /// Shorthand for `object_type().name()`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.object_type.name()
    }

    /// Graph structure.
    #[must_use]
    pub fn structure(&self) -> Structure {
        self.structure
    }

    /// All attributes in name order.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Variant> {
        &self.attributes
    }

    /// Attribute value, if set.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Variant> {
        self.attributes.get(name)
    }

    /// The `name` attribute when it holds a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attribute(ATTR_NAME).and_then(Variant::as_str)
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, Variant> {
        &mut self.attributes
    }
}

/// Write handle for an object of a pending frame.
///
/// Every setter either applies the whole write or leaves the object as it
/// was.
#[derive(Debug)]
pub struct MutableObject<'f> {
    object: &'f mut DesignObject,
}

impl<'f> MutableObject<'f> {
    pub(crate) fn new(object: &'f mut DesignObject) -> Self {
        Self { object }
    }

    /// Read-only view of the object.
    #[must_use]
    pub fn object(&self) -> &DesignObject {
        &*self.object
    }

    /// Object id.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    /// Stores `value` as-is. Schema conformance is checked at validation.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        self.object.attributes.insert(name.into(), value.into());
    }

    /// Removes an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Variant> {
        self.object.attributes.remove(name)
    }

    /// Checks `value` against the schema now and stores it converted to the
    /// declared type.
    ///
    /// # Errors
    /// [`DesignError::UnknownAttribute`] when the type does not declare
    /// `name`; [`DesignError::TypeMismatch`] when the value does not convert.
    pub fn set_typed_attribute(
        &mut self,
        name: &str,
        value: impl Into<Variant>,
    ) -> Result<(), DesignError> {
        let value = value.into();
        let declared = self.declared_type(name)?;
        let converted = value
            .convert(declared)
            .map_err(|_| DesignError::TypeMismatch {
                attribute: name.to_owned(),
                expected: declared,
                found: value.value_type(),
            })?;
        self.object.attributes.insert(name.to_owned(), converted);
        Ok(())
    }

    /// Assigns an attribute from free text.
    ///
    /// Declared array attributes parse `text` as a JSON array literal of the
    /// declared element kind. Any other attribute (including names the schema
    /// does not know) keeps `text` verbatim as a string.
    ///
    /// # Errors
    /// [`DesignError::InvalidAttributeAssignment`] when an array literal is
    /// malformed or not homogeneous; the previous value is kept.
    pub fn set_attribute_from_text(&mut self, name: &str, text: &str) -> Result<(), DesignError> {
        let declared = self
            .object
            .object_type
            .attribute(name)
            .map_or(ValueType::STRING, |a| a.value_type);
        let value = Variant::from_literal(text, declared).map_err(|reason| {
            DesignError::InvalidAttributeAssignment {
                text: format!("{name}={text}"),
                reason,
            }
        })?;
        self.object.attributes.insert(name.to_owned(), value);
        Ok(())
    }

    /// Applies a `name=value` assignment through [`Self::set_attribute_from_text`].
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), DesignError> {
        let (name, text) = parse_assignment(assignment).map_err(|reason| {
            DesignError::InvalidAttributeAssignment {
                text: assignment.to_owned(),
                reason,
            }
        })?;
        self.set_attribute_from_text(&name, &text)
    }

    fn declared_type(&self, name: &str) -> Result<ValueType, DesignError> {
        self.object
            .object_type
            .attribute(name)
            .map(|a| a.value_type)
            .ok_or_else(|| DesignError::UnknownAttribute {
                object_type: self.object.type_name().to_owned(),
                attribute: name.to_owned(),
            })
    }
}
