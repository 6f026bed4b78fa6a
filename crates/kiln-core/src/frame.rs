// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frames: committed snapshots and pending edits of the object graph.
//!
//! A [`PendingFrame`] starts as a value copy of one committed frame (or of
//! the empty design) and is exclusively owned by the caller until it is
//! accepted into the design history or dropped. A [`StableFrame`] is frozen:
//! it offers no mutable access and is shared as `Arc<StableFrame>`.
//!
//! State hash
//! - BLAKE3 over a canonical byte stream of the object map only (frame id
//!   and parent are excluded), so equal graphs hash equally.
//! - Objects in ascending `ObjectId` order; attributes in name order.
//! - Lengths and ids are 8-byte little-endian; strings are length-prefixed.
//! - Values are a one-byte kind tag followed by their literal text.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use blake3::Hasher;

use crate::error::DesignError;
use crate::foreign::{ForeignFrame, ForeignFrameError, ForeignStructure};
use crate::ident::{FrameId, Hash, IdentitySequence, ObjectId};
use crate::metamodel::{Metamodel, ObjectType, StructuralKind};
use crate::object::{DesignObject, MutableObject, Structure};
use crate::value::{AtomType, ValueType, Variant};

/// Read access shared by committed and pending frames.
pub trait FrameView {
    /// Frame id.
    fn id(&self) -> FrameId;

    /// Committed frame this one was derived from (`None` for a root frame).
    fn parent(&self) -> Option<FrameId>;

    /// Object map in ascending id order.
    fn object_map(&self) -> &BTreeMap<ObjectId, DesignObject>;

    /// Returns `true` if the frame holds `id`.
    fn contains(&self, id: ObjectId) -> bool {
        self.object_map().contains_key(&id)
    }

    /// Object by id.
    fn object(&self, id: ObjectId) -> Option<&DesignObject> {
        self.object_map().get(&id)
    }

    /// All objects in ascending id order.
    fn objects(&self) -> impl Iterator<Item = &DesignObject> {
        self.object_map().values()
    }

    /// Number of objects.
    fn len(&self) -> usize {
        self.object_map().len()
    }

    /// Returns `true` when the frame holds no objects.
    fn is_empty(&self) -> bool {
        self.object_map().is_empty()
    }

    /// Node-structured objects.
    fn nodes(&self) -> impl Iterator<Item = &DesignObject> {
        self.objects()
            .filter(|o| matches!(o.structure(), Structure::Node))
    }

    /// Edge-structured objects.
    fn edges(&self) -> impl Iterator<Item = &DesignObject> {
        self.objects()
            .filter(|o| matches!(o.structure(), Structure::Edge { .. }))
    }

    /// Edges whose origin is `id`.
    fn outgoing(&self, id: ObjectId) -> impl Iterator<Item = &DesignObject> {
        self.edges()
            .filter(move |e| e.structure().endpoints().is_some_and(|(o, _)| o == id))
    }

    /// Edges whose target is `id`.
    fn incoming(&self, id: ObjectId) -> impl Iterator<Item = &DesignObject> {
        self.edges()
            .filter(move |e| e.structure().endpoints().is_some_and(|(_, t)| t == id))
    }

    /// Objects of the named type.
    fn objects_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a DesignObject> {
        self.objects().filter(move |o| o.type_name() == type_name)
    }

    /// First object (lowest id) whose `name` attribute equals `name`.
    fn object_named(&self, name: &str) -> Option<&DesignObject> {
        self.objects().find(|o| o.name() == Some(name))
    }
}

/// Committed, immutable frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StableFrame {
    id: FrameId,
    parent: Option<FrameId>,
    objects: BTreeMap<ObjectId, DesignObject>,
    state_hash: Hash,
}

impl StableFrame {
    pub(crate) fn new(
        id: FrameId,
        parent: Option<FrameId>,
        objects: BTreeMap<ObjectId, DesignObject>,
    ) -> Self {
        let state_hash = compute_state_hash(&objects);
        Self {
            id,
            parent,
            objects,
            state_hash,
        }
    }

    /// Digest of the object graph (see module docs).
    #[must_use]
    pub fn state_hash(&self) -> Hash {
        self.state_hash
    }

    /// Digest as lowercase hex.
    #[must_use]
    pub fn state_hash_hex(&self) -> String {
        hex::encode(self.state_hash)
    }
}

impl FrameView for StableFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    fn object_map(&self) -> &BTreeMap<ObjectId, DesignObject> {
        &self.objects
    }
}

/// Frame under construction.
///
/// Obtained from [`crate::Design::create_pending_frame`] or
/// [`crate::Design::create_frame`]; the only place [`MutableObject`] handles
/// come from.
#[derive(Debug)]
pub struct PendingFrame {
    id: FrameId,
    parent: Option<FrameId>,
    metamodel: Arc<Metamodel>,
    identities: IdentitySequence,
    objects: BTreeMap<ObjectId, DesignObject>,
}

impl PendingFrame {
    pub(crate) fn derive(
        id: FrameId,
        parent: Option<&StableFrame>,
        metamodel: Arc<Metamodel>,
        identities: IdentitySequence,
    ) -> Self {
        Self {
            id,
            parent: parent.map(|p| p.id),
            metamodel,
            identities,
            objects: parent.map(|p| p.objects.clone()).unwrap_or_default(),
        }
    }

    /// Metamodel objects of this frame are created from.
    #[must_use]
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    fn resolve(&self, type_name: &str) -> Result<Arc<ObjectType>, DesignError> {
        self.metamodel
            .object_type(type_name)
            .cloned()
            .ok_or_else(|| DesignError::UnknownObjectType(type_name.to_owned()))
    }

    /// Creates an object of `object_type` with the given structure.
    ///
    /// Type defaults are applied. Edge endpoints are not checked here; the
    /// validator rejects dangling edges before commit.
    ///
    /// # Errors
    /// [`DesignError::StructuralTypeMismatch`] when the structure kind differs
    /// from the type's declared kind; no id is consumed in that case.
    pub fn create(
        &mut self,
        object_type: &Arc<ObjectType>,
        structure: Structure,
    ) -> Result<ObjectId, DesignError> {
        let declared = object_type.structural_kind();
        if structure.kind() != declared {
            return Err(DesignError::StructuralTypeMismatch {
                requested: structure.kind(),
                declared,
            });
        }
        let id = self.identities.next_object();
        self.objects
            .insert(id, DesignObject::new(id, Arc::clone(object_type), structure));
        Ok(id)
    }

    /// Creates a node of the named type and sets `attributes` verbatim.
    pub fn create_node<K, V>(
        &mut self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<ObjectId, DesignError>
    where
        K: Into<String>,
        V: Into<Variant>,
    {
        let ty = self.resolve(type_name)?;
        let id = self.create(&ty, Structure::Node)?;
        if let Some(object) = self.objects.get_mut(&id) {
            object
                .attributes_mut()
                .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        Ok(id)
    }

    /// Creates an edge of the named type from `origin` to `target`.
    pub fn create_edge(
        &mut self,
        type_name: &str,
        origin: ObjectId,
        target: ObjectId,
    ) -> Result<ObjectId, DesignError> {
        let ty = self.resolve(type_name)?;
        self.create(&ty, Structure::Edge { origin, target })
    }

    /// Creates an unstructured object of the named type.
    pub fn create_unstructured(&mut self, type_name: &str) -> Result<ObjectId, DesignError> {
        let ty = self.resolve(type_name)?;
        self.create(&ty, Structure::Unstructured)
    }

    /// Write handle for an object of this frame.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<MutableObject<'_>> {
        self.objects.get_mut(&id).map(MutableObject::new)
    }

    /// Like [`Self::object_mut`], failing with [`DesignError::UnknownObject`].
    pub fn require_mut(&mut self, id: ObjectId) -> Result<MutableObject<'_>, DesignError> {
        self.object_mut(id).ok_or(DesignError::UnknownObject(id))
    }

    /// Removes `id` and, transitively, every edge attached to a removed object.
    ///
    /// Returns the removed ids in ascending order. Removed ids are never
    /// reissued.
    pub fn remove_cascading(&mut self, id: ObjectId) -> Result<Vec<ObjectId>, DesignError> {
        if !self.objects.contains_key(&id) {
            return Err(DesignError::UnknownObject(id));
        }
        let mut removed = BTreeSet::from([id]);
        loop {
            let attached: Vec<ObjectId> = self
                .objects
                .values()
                .filter(|o| !removed.contains(&o.id()))
                .filter(|o| {
                    o.structure()
                        .endpoints()
                        .is_some_and(|(a, b)| removed.contains(&a) || removed.contains(&b))
                })
                .map(DesignObject::id)
                .collect();
            if attached.is_empty() {
                break;
            }
            removed.extend(attached);
        }
        for gone in &removed {
            self.objects.remove(gone);
        }
        Ok(removed.into_iter().collect())
    }

    /// Imports every object of a foreign frame with fresh ids.
    ///
    /// Foreign ids are only used to resolve edge endpoints within `foreign`.
    /// The import is all-or-nothing: on error the frame is unchanged.
    ///
    /// # Errors
    /// [`DesignError::UnknownObjectType`], [`DesignError::StructuralTypeMismatch`],
    /// or [`DesignError::ForeignFrame`] for duplicate ids and unresolved
    /// endpoint references.
    pub fn import_foreign(&mut self, foreign: &ForeignFrame) -> Result<Vec<ObjectId>, DesignError> {
        let mut types = Vec::with_capacity(foreign.objects.len());
        let mut id_map: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, object) in foreign.objects.iter().enumerate() {
            types.push(self.resolve(&object.type_name)?);
            if let Some(foreign_id) = object.id.as_deref() {
                if id_map.insert(foreign_id, index).is_some() {
                    return Err(ForeignFrameError::DuplicateId(foreign_id.to_owned()).into());
                }
            }
        }
        let lookup = |reference: &str| {
            id_map
                .get(reference)
                .copied()
                .ok_or_else(|| ForeignFrameError::UnknownReference(reference.to_owned()))
        };
        let mut shapes = Vec::with_capacity(foreign.objects.len());
        for (object, ty) in foreign.objects.iter().zip(&types) {
            let shape = match &object.structure {
                ForeignStructure::Unstructured => (StructuralKind::Unstructured, None),
                ForeignStructure::Node => (StructuralKind::Node, None),
                ForeignStructure::Edge { origin, target } => {
                    (StructuralKind::Edge, Some((lookup(origin)?, lookup(target)?)))
                }
            };
            if shape.0 != ty.structural_kind() {
                return Err(DesignError::StructuralTypeMismatch {
                    requested: shape.0,
                    declared: ty.structural_kind(),
                });
            }
            shapes.push(shape.1);
        }

        let ids: Vec<ObjectId> = foreign
            .objects
            .iter()
            .map(|_| self.identities.next_object())
            .collect();
        for (index, (object, ty)) in foreign.objects.iter().zip(types).enumerate() {
            let structure = match shapes[index] {
                Some((origin, target)) => Structure::Edge {
                    origin: ids[origin],
                    target: ids[target],
                },
                None if ty.structural_kind() == StructuralKind::Node => Structure::Node,
                None => Structure::Unstructured,
            };
            let mut created = DesignObject::new(ids[index], ty, structure);
            created.attributes_mut().extend(
                object
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            self.objects.insert(ids[index], created);
        }
        Ok(ids)
    }

    pub(crate) fn freeze(self) -> StableFrame {
        StableFrame::new(self.id, self.parent, self.objects)
    }
}

impl FrameView for PendingFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    fn object_map(&self) -> &BTreeMap<ObjectId, DesignObject> {
        &self.objects
    }
}

fn update_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn update_str(hasher: &mut Hasher, s: &str) {
    update_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn value_tag(value: &Variant) -> u8 {
    let atom = |a: AtomType| match a {
        AtomType::Bool => 0,
        AtomType::Int => 1,
        AtomType::Double => 2,
        AtomType::String => 3,
    };
    match value.value_type() {
        ValueType::Atom(a) => atom(a),
        ValueType::Array(a) => 4 + atom(a),
    }
}

/// Computes the canonical state hash of an object map.
pub(crate) fn compute_state_hash(objects: &BTreeMap<ObjectId, DesignObject>) -> Hash {
    let mut hasher = Hasher::new();
    update_len(&mut hasher, objects.len());
    for (id, object) in objects {
        hasher.update(&id.value().to_le_bytes());
        update_str(&mut hasher, object.type_name());
        match object.structure() {
            Structure::Unstructured => {
                hasher.update(&[0]);
            }
            Structure::Node => {
                hasher.update(&[1]);
            }
            Structure::Edge { origin, target } => {
                hasher.update(&[2]);
                hasher.update(&origin.value().to_le_bytes());
                hasher.update(&target.value().to_le_bytes());
            }
        }
        update_len(&mut hasher, object.attributes().len());
        for (name, value) in object.attributes() {
            update_str(&mut hasher, name);
            hasher.update(&[value_tag(value)]);
            update_str(&mut hasher, &value.to_literal());
        }
    }
    hasher.finalize().into()
}
