// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistent-store port and the design archive service.
//!
//! [`DesignStore`] moves opaque bytes keyed by design name; [`DesignArchive`]
//! (de)serializes [`DesignRecord`]s as pretty JSON on top of it. Restoring a
//! record re-validates every frame and re-checks its state hash, so a store
//! can never smuggle an invalid frame into a design.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::DesignError;
use crate::frame::{FrameView, StableFrame};
use crate::history::Design;
use crate::ident::{FrameId, IdentitySequence, ObjectId};
use crate::metamodel::Metamodel;
use crate::object::{DesignObject, Structure};
use crate::validate::Validator;
use crate::value::Variant;

/// Storage port for raw design blobs keyed by design name.
pub trait DesignStore {
    /// Loads a raw blob. Returns [`StoreError::NotFound`] when missing.
    fn load_raw(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    /// Persists a raw blob, replacing any previous one.
    fn save_raw(&self, name: &str, data: &[u8]) -> Result<(), StoreError>;
    /// Deletes a blob. Returns [`StoreError::NotFound`] when missing.
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Name not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The record decoded but does not describe a consistent design.
    #[error("corrupt design record: {0}")]
    Corrupt(String),
    /// The record was written against another metamodel.
    #[error("design uses metamodel {found}, expected {expected}")]
    MetamodelMismatch {
        /// Metamodel supplied by the caller.
        expected: String,
        /// Metamodel named in the record.
        found: String,
    },
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serialized object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object id.
    pub id: ObjectId,
    /// Type name in the design's metamodel.
    pub type_name: String,
    /// Graph structure.
    pub structure: Structure,
    /// Attribute values.
    pub attributes: BTreeMap<String, Variant>,
}

/// Serialized committed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame id.
    pub id: FrameId,
    /// Parent frame id, if any.
    pub parent: Option<FrameId>,
    /// Hex state hash, checked on restore.
    pub state_hash: String,
    /// Objects in ascending id order.
    pub objects: Vec<ObjectRecord>,
}

/// Serialized design history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    /// Name of the metamodel the design was built against.
    pub metamodel: String,
    /// Next value of the identity sequence.
    pub next_id: u64,
    /// Every committed frame, ascending.
    pub frames: Vec<FrameRecord>,
    /// Current frame.
    pub current: Option<FrameId>,
    /// Undo stack, oldest first.
    pub undo: Vec<FrameId>,
    /// Redo stack, next last.
    pub redo: Vec<FrameId>,
}

impl DesignRecord {
    /// Captures the full history of `design`.
    #[must_use]
    pub fn capture(design: &Design) -> Self {
        let frames = design
            .frame_ids()
            .filter_map(|id| design.frame(id))
            .map(|frame| FrameRecord {
                id: frame.id(),
                parent: frame.parent(),
                state_hash: frame.state_hash_hex(),
                objects: frame
                    .objects()
                    .map(|o| ObjectRecord {
                        id: o.id(),
                        type_name: o.type_name().to_owned(),
                        structure: o.structure(),
                        attributes: o.attributes().clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            metamodel: design.metamodel().name().to_owned(),
            next_id: design.identities().peek(),
            frames,
            current: design.current_frame(),
            undo: design.undoable_frames().to_vec(),
            redo: design.redoable_frames().to_vec(),
        }
    }

    /// Rebuilds a design against `metamodel`.
    ///
    /// # Errors
    /// [`StoreError::MetamodelMismatch`] when the record names another
    /// metamodel; [`StoreError::Corrupt`] when any frame fails validation,
    /// its hash differs, or the cursor names a missing frame.
    pub fn restore(self, metamodel: Arc<Metamodel>) -> Result<Design, StoreError> {
        if self.metamodel != metamodel.name() {
            return Err(StoreError::MetamodelMismatch {
                expected: metamodel.name().to_owned(),
                found: self.metamodel,
            });
        }
        let identities = IdentitySequence::starting_at(self.next_id);
        let validator = Validator::new(&metamodel);
        let mut frames = BTreeMap::new();
        for record in self.frames {
            identities.observe(record.id.value());
            let frame = restore_frame(&metamodel, &identities, record)?;
            validator
                .validate(&frame)
                .map_err(|failure| StoreError::Corrupt(format!("{}: {failure}", frame.id())))?;
            if frames.insert(frame.id(), Arc::new(frame)).is_some() {
                return Err(StoreError::Corrupt("duplicate frame id".into()));
            }
        }

        let known = |id: &FrameId| frames.contains_key(id);
        if !self.current.iter().chain(&self.undo).chain(&self.redo).all(known) {
            return Err(StoreError::Corrupt("history names a missing frame".into()));
        }
        if self.current.is_none() && !(self.undo.is_empty() && self.redo.is_empty()) {
            return Err(StoreError::Corrupt("undo/redo without a current frame".into()));
        }
        Ok(Design::from_parts(
            metamodel,
            identities,
            frames,
            self.current,
            self.undo,
            self.redo,
        ))
    }
}

fn restore_frame(
    metamodel: &Metamodel,
    identities: &IdentitySequence,
    record: FrameRecord,
) -> Result<StableFrame, StoreError> {
    let mut objects = BTreeMap::new();
    for object in record.objects {
        identities.observe(object.id.value());
        let ty = metamodel.object_type(&object.type_name).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown object type {}", object.type_name))
        })?;
        let mut restored = DesignObject::new(object.id, Arc::clone(ty), object.structure);
        *restored.attributes_mut() = object.attributes;
        if objects.insert(object.id, restored).is_some() {
            return Err(StoreError::Corrupt(format!(
                "{}: duplicate object {}",
                record.id, object.id
            )));
        }
    }
    let frame = StableFrame::new(record.id, record.parent, objects);
    if frame.state_hash_hex() != record.state_hash {
        return Err(StoreError::Corrupt(format!(
            "{}: state hash mismatch",
            record.id
        )));
    }
    Ok(frame)
}

/// Thin service that serializes designs and delegates storage to a
/// [`DesignStore`].
pub struct DesignArchive<S> {
    store: S,
}

impl<S> DesignArchive<S> {
    /// Create a new archive using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the archive and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> DesignArchive<S>
where
    S: DesignStore,
{
    /// Loads the design `name`. Returns `Ok(None)` if it was never saved.
    ///
    /// # Errors
    /// [`DesignError::PersistentStore`] when the blob cannot be read, decoded
    /// or restored against `metamodel`.
    pub fn load(&self, name: &str, metamodel: Arc<Metamodel>) -> Result<Option<Design>, DesignError> {
        let bytes = match self.store.load_raw(name) {
            Ok(bytes) if bytes.is_empty() => return Ok(None),
            Ok(bytes) => bytes,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(DesignError::PersistentStore(e)),
        };
        let record: DesignRecord = serde_json::from_slice(&bytes)
            .map_err(|e| DesignError::PersistentStore(e.into()))?;
        let design = record
            .restore(metamodel)
            .map_err(DesignError::PersistentStore)?;
        debug!(design = name, frames = design.frame_ids().count(), "design loaded");
        Ok(Some(design))
    }

    /// Serializes and persists `design` as `name`.
    ///
    /// # Errors
    /// [`DesignError::UnableToSaveDesign`] when encoding or writing fails.
    pub fn save(&self, name: &str, design: &Design) -> Result<(), DesignError> {
        let record = DesignRecord::capture(design);
        let data = serde_json::to_vec_pretty(&record)
            .map_err(|e| DesignError::UnableToSaveDesign(e.into()))?;
        self.store
            .save_raw(name, &data)
            .map_err(DesignError::UnableToSaveDesign)?;
        info!(design = name, frames = record.frames.len(), "design saved");
        Ok(())
    }

    /// Deletes the design `name`.
    ///
    /// # Errors
    /// [`DesignError::PersistentStore`] when the store refuses.
    pub fn remove(&self, name: &str) -> Result<(), DesignError> {
        self.store.remove(name).map_err(DesignError::PersistentStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, ATTR_FORMULA, ATTR_NAME};

    fn two_frame_design() -> Design {
        let mut design = Design::new(Arc::new(catalog::stock_flow()));
        let mut frame = design.create_frame();
        frame
            .create_node(catalog::STOCK, [(ATTR_NAME, "a"), (ATTR_FORMULA, "1")])
            .unwrap();
        design.accept(frame).unwrap();
        let mut frame = design.create_frame();
        frame.create_unstructured(catalog::NOTE).unwrap();
        design.accept(frame).unwrap();
        design
    }

    #[test]
    fn record_restores_the_same_history() {
        let design = two_frame_design();
        let record = DesignRecord::capture(&design);
        let restored = record.clone().restore(Arc::clone(design.metamodel())).unwrap();
        assert_eq!(DesignRecord::capture(&restored), record);
        assert!(restored.identities().peek() >= design.identities().peek());
    }

    #[test]
    fn tampered_records_are_corrupt() {
        let design = two_frame_design();
        let mut record = DesignRecord::capture(&design);
        record.frames[0].objects[0]
            .attributes
            .insert(ATTR_NAME.into(), Variant::from("b"));
        let err = record.restore(Arc::clone(design.metamodel())).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("hash")));
    }

    #[test]
    fn metamodel_name_must_match() {
        let design = two_frame_design();
        let other = Arc::new(Metamodel::builder("other").build().unwrap());
        let err = DesignRecord::capture(&design).restore(other).unwrap_err();
        assert!(matches!(err, StoreError::MetamodelMismatch { .. }));
    }
}
