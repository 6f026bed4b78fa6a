// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Metamodel: object types, their structural kinds and attribute schemas.
//!
//! A [`Metamodel`] is immutable once built. Object types are handed out as
//! `Arc<ObjectType>` so objects can carry their type without copying the
//! schema.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{ValueType, Variant};

/// Whether an object is free-standing, a graph node, or a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralKind {
    /// No graph structure (e.g. notes, design-level settings).
    Unstructured,
    /// A graph node.
    Node,
    /// A graph edge with origin and target endpoints.
    Edge,
}

impl core::fmt::Display for StructuralKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Unstructured => "unstructured",
            Self::Node => "node",
            Self::Edge => "edge",
        };
        f.write_str(name)
    }
}

/// Schema entry for one attribute of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name, unique within its type.
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Value assigned when an object of the owning type is created.
    pub default: Option<Variant>,
    /// Short human-readable description.
    pub abstract_text: Option<String>,
}

impl Attribute {
    /// Creates an attribute without default or description.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
            abstract_text: None,
        }
    }

    /// Sets the creation default.
    pub fn with_default(mut self, value: impl Into<Variant>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description.
    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }
}

/// Descriptor of one object type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    name: String,
    structural_kind: StructuralKind,
    attributes: Vec<Attribute>,
}

impl ObjectType {
    /// Creates an object type. Attribute order is preserved.
    pub fn new(
        name: impl Into<String>,
        structural_kind: StructuralKind,
        attributes: Vec<Attribute>,
    ) -> Self {
        Self {
            name: name.into(),
            structural_kind,
            attributes,
        }
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared structural kind.
    #[must_use]
    pub fn structural_kind(&self) -> StructuralKind {
        self.structural_kind
    }

    /// Attribute schema in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Error returned by [`MetamodelBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetamodelError {
    /// Two object types share a name.
    #[error("duplicate object type: {0}")]
    DuplicateType(String),
    /// An object type declares the same attribute twice.
    #[error("duplicate attribute {attribute} in type {object_type}")]
    DuplicateAttribute {
        /// Owning type.
        object_type: String,
        /// Repeated attribute name.
        attribute: String,
    },
    /// An attribute default is not convertible to its declared type.
    #[error("default of {object_type}.{attribute} does not match its declared type")]
    InvalidDefault {
        /// Owning type.
        object_type: String,
        /// Attribute whose default is wrong.
        attribute: String,
    },
}

/// Read-only catalog of object types.
#[derive(Debug, Clone, PartialEq)]
pub struct Metamodel {
    name: String,
    types: BTreeMap<String, Arc<ObjectType>>,
}

impl Metamodel {
    /// Starts building a metamodel called `name`.
    pub fn builder(name: impl Into<String>) -> MetamodelBuilder {
        MetamodelBuilder {
            name: name.into(),
            types: Vec::new(),
        }
    }

    /// Assembles a catalog known to be well-formed (built-in catalogs only).
    pub(crate) fn from_trusted(name: &str, types: Vec<ObjectType>) -> Self {
        debug_assert!(
            Self::builder(name).with_types(types.clone()).build().is_ok(),
            "built-in catalog must be well-formed"
        );
        Self {
            name: name.to_owned(),
            types: types
                .into_iter()
                .map(|ty| (ty.name.clone(), Arc::new(ty)))
                .collect(),
        }
    }

    /// Metamodel name (recorded in archived designs).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a type name.
    #[must_use]
    pub fn object_type(&self, name: &str) -> Option<&Arc<ObjectType>> {
        self.types.get(name)
    }

    /// Iterates over all types in name order.
    pub fn object_types(&self) -> impl Iterator<Item = &Arc<ObjectType>> {
        self.types.values()
    }

    /// Returns `true` when `ty` is the same descriptor this metamodel holds under its name.
    #[must_use]
    pub fn contains(&self, ty: &ObjectType) -> bool {
        self.types.get(ty.name()).is_some_and(|own| **own == *ty)
    }
}

/// Builder for [`Metamodel`].
#[derive(Debug)]
pub struct MetamodelBuilder {
    name: String,
    types: Vec<ObjectType>,
}

impl MetamodelBuilder {
    /// Adds an object type.
    pub fn with_type(mut self, ty: ObjectType) -> Self {
        self.types.push(ty);
        self
    }

    /// Adds several object types.
    pub fn with_types(mut self, types: impl IntoIterator<Item = ObjectType>) -> Self {
        self.types.extend(types);
        self
    }

    /// Finalizes the catalog.
    ///
    /// # Errors
    /// Rejects duplicate type names, duplicate attribute names within a type,
    /// and defaults that do not convert to their declared type.
    pub fn build(self) -> Result<Metamodel, MetamodelError> {
        let mut types = BTreeMap::new();
        for ty in self.types {
            for (i, attr) in ty.attributes.iter().enumerate() {
                if ty.attributes[..i].iter().any(|a| a.name == attr.name) {
                    return Err(MetamodelError::DuplicateAttribute {
                        object_type: ty.name.clone(),
                        attribute: attr.name.clone(),
                    });
                }
                if let Some(default) = &attr.default {
                    if !default.is_convertible(attr.value_type) {
                        return Err(MetamodelError::InvalidDefault {
                            object_type: ty.name.clone(),
                            attribute: attr.name.clone(),
                        });
                    }
                }
            }
            if types.contains_key(&ty.name) {
                return Err(MetamodelError::DuplicateType(ty.name));
            }
            types.insert(ty.name.clone(), Arc::new(ty));
        }
        Ok(Metamodel {
            name: self.name,
            types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_types_are_rejected() {
        let err = Metamodel::builder("m")
            .with_type(ObjectType::new("A", StructuralKind::Node, vec![]))
            .with_type(ObjectType::new("A", StructuralKind::Edge, vec![]))
            .build()
            .unwrap_err();
        assert_eq!(err, MetamodelError::DuplicateType("A".into()));
    }

    #[test]
    fn duplicate_attributes_are_rejected() {
        let ty = ObjectType::new(
            "A",
            StructuralKind::Node,
            vec![
                Attribute::new("x", ValueType::INT),
                Attribute::new("x", ValueType::STRING),
            ],
        );
        let err = Metamodel::builder("m").with_type(ty).build().unwrap_err();
        assert!(matches!(err, MetamodelError::DuplicateAttribute { .. }));
    }

    #[test]
    fn defaults_must_match_declared_type() {
        let ty = ObjectType::new(
            "A",
            StructuralKind::Node,
            vec![Attribute::new("flag", ValueType::BOOL).with_default(3.5)],
        );
        let err = Metamodel::builder("m").with_type(ty).build().unwrap_err();
        assert!(matches!(err, MetamodelError::InvalidDefault { .. }));
    }

    #[test]
    fn contains_compares_descriptors() {
        let mm = Metamodel::builder("m")
            .with_type(ObjectType::new("A", StructuralKind::Node, vec![]))
            .build()
            .unwrap();
        let own = mm.object_type("A").unwrap();
        assert!(mm.contains(own));
        let impostor = ObjectType::new("A", StructuralKind::Edge, vec![]);
        assert!(!mm.contains(&impostor));
    }
}
