// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Foreign frame port.
//!
//! Readers for external frame files or bundles live outside this crate and
//! implement [`ForeignFrameReader`]. They hand back a [`ForeignFrame`] whose
//! objects refer to each other by foreign string ids; importing assigns
//! fresh design ids (see [`crate::PendingFrame::import_foreign`]).
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Variant;

/// Errors raised while reading or importing a foreign frame.
#[derive(Debug, Error)]
pub enum ForeignFrameError {
    /// The file or bundle could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Location that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The content is not a valid foreign frame.
    #[error("malformed foreign frame: {0}")]
    Malformed(String),
    /// Two foreign objects share an id.
    #[error("duplicate foreign id: {0}")]
    DuplicateId(String),
    /// An edge endpoint names an id absent from the foreign frame.
    #[error("unknown foreign reference: {0}")]
    UnknownReference(String),
}

/// Structure of a foreign object; edge endpoints use foreign ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignStructure {
    /// Free-standing object.
    Unstructured,
    /// Graph node.
    Node,
    /// Edge between two foreign objects.
    Edge {
        /// Foreign id of the origin.
        origin: String,
        /// Foreign id of the target.
        target: String,
    },
}

/// One object as described by an external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignObject {
    /// Foreign id; required only for objects referenced by edges.
    pub id: Option<String>,
    /// Type name resolved against the design's metamodel on import.
    pub type_name: String,
    /// Structure with foreign endpoint ids.
    pub structure: ForeignStructure,
    /// Attribute values.
    pub attributes: BTreeMap<String, Variant>,
}

impl ForeignObject {
    /// Node with foreign id `id`.
    pub fn node(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            type_name: type_name.into(),
            structure: ForeignStructure::Node,
            attributes: BTreeMap::new(),
        }
    }

    /// Anonymous edge between two foreign ids.
    pub fn edge(
        type_name: impl Into<String>,
        origin: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            structure: ForeignStructure::Edge {
                origin: origin.into(),
                target: target.into(),
            },
            attributes: BTreeMap::new(),
        }
    }

    /// Anonymous unstructured object.
    pub fn unstructured(type_name: impl Into<String>) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            structure: ForeignStructure::Unstructured,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Frame content produced by a foreign reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignFrame {
    /// Objects in source order.
    pub objects: Vec<ForeignObject>,
}

/// Reads foreign frames from a file or a bundle directory.
pub trait ForeignFrameReader {
    /// Reads the frame stored at `path`.
    fn read(&self, path: &Path) -> Result<ForeignFrame, ForeignFrameError>;
}
