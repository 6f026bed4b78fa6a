// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Design history: the arena of committed frames and the edit cursor.
//!
//! Cursor model
//! - `current` is `None` only while nothing has been accepted.
//! - `undoable` holds the frames `undo` returns to, oldest first; the first
//!   accepted frame is never undone back to the empty design.
//! - `redoable` holds the frames `redo` returns to, the next one last.
//! - Accepting a frame clears `redoable` and drops those frames from the
//!   arena, except the accepted frame's own ancestors; nothing else removes a
//!   committed frame.
//! - A frame id is committed at most once.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DesignError;
use crate::frame::{FrameView, PendingFrame, StableFrame};
use crate::ident::{FrameId, IdentitySequence};
use crate::metamodel::Metamodel;
use crate::validate::Validator;

/// A pending frame that `accept` refused, handed back unchanged.
#[derive(Debug, Error)]
#[error("frame {} rejected: {error}", .frame.id())]
pub struct Rejected {
    /// The frame as submitted; still editable.
    pub frame: PendingFrame,
    /// Why it was refused.
    #[source]
    pub error: DesignError,
}

impl Rejected {
    /// Splits into the frame and the error.
    #[must_use]
    pub fn into_parts(self) -> (PendingFrame, DesignError) {
        (self.frame, self.error)
    }
}

impl From<Rejected> for DesignError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

/// A versioned design over one metamodel.
#[derive(Debug, Clone)]
pub struct Design {
    metamodel: Arc<Metamodel>,
    identities: IdentitySequence,
    frames: BTreeMap<FrameId, Arc<StableFrame>>,
    current: Option<FrameId>,
    undoable: Vec<FrameId>,
    redoable: Vec<FrameId>,
}

impl Design {
    /// Empty design.
    #[must_use]
    pub fn new(metamodel: Arc<Metamodel>) -> Self {
        Self {
            metamodel,
            identities: IdentitySequence::default(),
            frames: BTreeMap::new(),
            current: None,
            undoable: Vec::new(),
            redoable: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        metamodel: Arc<Metamodel>,
        identities: IdentitySequence,
        frames: BTreeMap<FrameId, Arc<StableFrame>>,
        current: Option<FrameId>,
        undoable: Vec<FrameId>,
        redoable: Vec<FrameId>,
    ) -> Self {
        Self {
            metamodel,
            identities,
            frames,
            current,
            undoable,
            redoable,
        }
    }

    /// Metamodel every frame is validated against.
    #[must_use]
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Id generator shared with pending frames.
    #[must_use]
    pub fn identities(&self) -> &IdentitySequence {
        &self.identities
    }

    /// Derives a pending frame from the committed frame `derived_from`.
    ///
    /// # Errors
    /// [`DesignError::UnknownFrame`] when `derived_from` is not committed.
    pub fn create_pending_frame(&self, derived_from: FrameId) -> Result<PendingFrame, DesignError> {
        let parent = self
            .frames
            .get(&derived_from)
            .ok_or(DesignError::UnknownFrame(derived_from))?;
        Ok(self.derive(Some(parent)))
    }

    /// Derives a pending frame from the current frame, or an empty root frame
    /// when nothing is committed.
    #[must_use]
    pub fn create_frame(&self) -> PendingFrame {
        self.derive(self.current())
    }

    fn derive(&self, parent: Option<&Arc<StableFrame>>) -> PendingFrame {
        let frame = PendingFrame::derive(
            self.identities.next_frame(),
            parent.map(Arc::as_ref),
            Arc::clone(&self.metamodel),
            self.identities.clone(),
        );
        debug!(frame = %frame.id(), parent = ?frame.parent(), objects = frame.len(), "pending frame derived");
        frame
    }

    /// Validates `frame` and, when it passes, commits it as the new current
    /// frame.
    ///
    /// Either the history advances (frame frozen and stored, cursor moved,
    /// redo branch dropped) or nothing changes and the frame comes back in
    /// [`Rejected`].
    ///
    /// # Errors
    /// [`DesignError::ConstraintViolation`] with every violation found,
    /// [`DesignError::UnknownFrame`] when the frame's parent is no longer in
    /// the history, or [`DesignError::FrameAlreadyCommitted`] when a frame
    /// with the same id is already in the history.
    pub fn accept(&mut self, frame: PendingFrame) -> Result<FrameId, Rejected> {
        if self.frames.contains_key(&frame.id()) {
            warn!(frame = %frame.id(), "frame rejected: id already committed");
            let error = DesignError::FrameAlreadyCommitted(frame.id());
            return Err(Rejected { frame, error });
        }
        if let Some(parent) = frame.parent() {
            if !self.frames.contains_key(&parent) {
                warn!(frame = %frame.id(), %parent, "frame rejected: parent no longer in history");
                return Err(Rejected {
                    frame,
                    error: DesignError::UnknownFrame(parent),
                });
            }
        }
        if let Err(failure) = Validator::new(&self.metamodel).validate(&frame) {
            warn!(frame = %frame.id(), violations = failure.len(), "frame rejected");
            return Err(Rejected {
                frame,
                error: DesignError::ConstraintViolation(failure),
            });
        }
        if frame.parent() != self.current {
            warn!(
                frame = %frame.id(),
                parent = ?frame.parent(),
                current = ?self.current,
                "accepting frame not derived from the current frame"
            );
        }

        let lineage = self.lineage(frame.parent());
        let stable = Arc::new(frame.freeze());
        let id = stable.id();
        info!(
            frame = %id,
            objects = stable.len(),
            state_hash = %stable.state_hash_hex(),
            "frame accepted"
        );
        for dropped in self.redoable.drain(..) {
            if !lineage.contains(&dropped) {
                self.frames.remove(&dropped);
            }
        }
        self.frames.insert(id, stable);
        if let Some(previous) = self.current.replace(id) {
            self.undoable.push(previous);
        }
        Ok(id)
    }

    /// `from` and every committed frame it descends from.
    fn lineage(&self, from: Option<FrameId>) -> BTreeSet<FrameId> {
        let mut lineage = BTreeSet::new();
        let mut next = from;
        while let Some(id) = next {
            if !lineage.insert(id) {
                break;
            }
            next = self.frames.get(&id).and_then(|f| f.parent());
        }
        lineage
    }

    /// Drops a pending frame without touching history.
    pub fn discard(&self, frame: PendingFrame) {
        debug!(frame = %frame.id(), "pending frame discarded");
        drop(frame);
    }

    /// Moves the cursor to the previous committed frame.
    ///
    /// # Errors
    /// [`DesignError::NoChangesToUndo`] at the oldest frame or on an empty
    /// design.
    pub fn undo(&mut self) -> Result<FrameId, DesignError> {
        let (Some(current), Some(target)) = (self.current, self.undoable.pop()) else {
            return Err(DesignError::NoChangesToUndo);
        };
        self.redoable.push(current);
        self.current = Some(target);
        debug!(from = %current, to = %target, "undo");
        Ok(target)
    }

    /// Moves the cursor to the next committed frame.
    ///
    /// # Errors
    /// [`DesignError::NoChangesToRedo`] when nothing was undone since the
    /// last accept.
    pub fn redo(&mut self) -> Result<FrameId, DesignError> {
        let (Some(current), Some(target)) = (self.current, self.redoable.pop()) else {
            return Err(DesignError::NoChangesToRedo);
        };
        self.undoable.push(current);
        self.current = Some(target);
        debug!(from = %current, to = %target, "redo");
        Ok(target)
    }

    /// Returns `true` when [`Self::undo`] would succeed.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.current.is_some() && !self.undoable.is_empty()
    }

    /// Returns `true` when [`Self::redo`] would succeed.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.current.is_some() && !self.redoable.is_empty()
    }

    /// Id of the current frame (`None` for an empty design).
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameId> {
        self.current
    }

    /// The current frame (`None` for an empty design).
    #[must_use]
    pub fn current(&self) -> Option<&Arc<StableFrame>> {
        self.current.and_then(|id| self.frames.get(&id))
    }

    /// The current frame.
    ///
    /// # Errors
    /// [`DesignError::EmptyDesign`] when nothing is committed.
    pub fn require_current(&self) -> Result<&Arc<StableFrame>, DesignError> {
        self.current().ok_or(DesignError::EmptyDesign)
    }

    /// A committed frame by id.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Arc<StableFrame>> {
        self.frames.get(&id)
    }

    /// Returns `true` if `id` is a committed frame of this design.
    #[must_use]
    pub fn contains_frame(&self, id: FrameId) -> bool {
        self.frames.contains_key(&id)
    }

    /// Ids of all committed frames, ascending.
    pub fn frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.keys().copied()
    }

    /// Frames reachable by undo, oldest first.
    #[must_use]
    pub fn undoable_frames(&self) -> &[FrameId] {
        &self.undoable
    }

    /// Frames reachable by redo; the next one is last.
    #[must_use]
    pub fn redoable_frames(&self) -> &[FrameId] {
        &self.redoable
    }
}
