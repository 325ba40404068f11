//! The state engine: authoritative container and sole mutator of the
//! document tree.
//!
//! Every mutation arrives as an [`Intent`], passes the validator, executes
//! through the dispatch in [`replay`], and is re-validated as a whole tree
//! before it becomes observable. Failures restore the pre-mutation
//! snapshot, so no partial mutation is ever visible outside a rolled-back
//! batch.
//!
//! Batching buffers intents without individual emission: members execute
//! immediately (each one atomic), and commit emits a single
//! `BatchCommitted` event so observers can treat the group as one unit.

use crate::error::EngineError;
use crate::event::{Listener, StateEvent};
use crate::id::{self, ShapeId, now_millis};
use crate::intent::Intent;
use crate::model::{DocumentState, Geometry, Shape, ShapeKind, Style};
use crate::validate;

/// Result of a successful `apply_intent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Executed and emitted immediately.
    Applied { shape_id: Option<ShapeId> },
    /// Executed inside the open batch; emission deferred to commit.
    Batched { shape_id: Option<ShapeId> },
}

impl ApplyOutcome {
    /// Id of the shape the intent introduced, if any.
    pub fn shape_id(&self) -> Option<ShapeId> {
        match self {
            ApplyOutcome::Applied { shape_id } | ApplyOutcome::Batched { shape_id } => *shape_id,
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, ApplyOutcome::Batched { .. })
    }
}

struct Batch {
    snapshot: DocumentState,
    intents: Vec<Intent>,
}

/// The canonical document holder. Single writer; readers get borrows or
/// owned snapshots, never a mutable handle.
pub struct StateEngine {
    doc: DocumentState,
    batch: Option<Batch>,
    listeners: Vec<Listener>,
}

impl StateEngine {
    /// Create an engine over a fresh empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            doc: DocumentState::new(),
            batch: None,
            listeners: Vec::new(),
        }
    }

    /// Create an engine over an existing (validated) document.
    pub fn with_state(doc: DocumentState) -> Result<Self, EngineError> {
        validate::validate_state(&doc)?;
        Ok(Self {
            doc,
            batch: None,
            listeners: Vec::new(),
        })
    }

    /// Read-only view of the canonical tree.
    pub fn doc(&self) -> &DocumentState {
        &self.doc
    }

    /// Deep copy of the canonical tree.
    pub fn snapshot(&self) -> DocumentState {
        self.doc.clone()
    }

    /// JSON Pointer lookup into the serialized tree (RFC 6901), e.g.
    /// `/canvas/width` or `/shapes/rect_1_0/geometry/left`. `None` for
    /// absent paths.
    pub fn state_slice(&self, pointer: &str) -> Option<serde_json::Value> {
        serde_json::to_value(&self.doc)
            .ok()?
            .pointer(pointer)
            .cloned()
    }

    /// Register a synchronous change observer.
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    // ─── Intent application ──────────────────────────────────────────────

    /// Validate and execute one intent.
    ///
    /// With a batch open the intent executes immediately but emits nothing;
    /// otherwise the change event fires before this returns. On any error
    /// the tree is left exactly as it was and nothing is emitted.
    pub fn apply_intent(&mut self, intent: Intent) -> Result<ApplyOutcome, EngineError> {
        validate::validate_intent(&intent)?;
        let intent = normalize(intent);
        log::debug!("apply `{}`", intent.name());

        if self.batch.is_some() {
            let shape_id = self.execute_checked(&intent)?;
            if let Some(batch) = &mut self.batch {
                batch.intents.push(intent);
            }
            return Ok(ApplyOutcome::Batched { shape_id });
        }

        let before = self.doc.clone();
        let applied = replay(&mut self.doc, &intent).and_then(|shape_id| {
            validate::validate_state(&self.doc)?;
            Ok(shape_id)
        });
        let shape_id = match applied {
            Ok(shape_id) => shape_id,
            Err(err) => {
                log::warn!("intent `{}` rejected: {err}", intent.name());
                self.doc = before;
                return Err(err);
            }
        };

        let timestamp = now_millis();
        self.doc.meta.modified_at = timestamp;
        let event = StateEvent::Changed {
            intent,
            before: Box::new(before),
            after: Box::new(self.doc.clone()),
            timestamp,
        };
        self.emit(&event);
        Ok(ApplyOutcome::Applied { shape_id })
    }

    /// Apply a sequence atomically: all intents commit as one batch, or the
    /// tree rolls back to its pre-call state and the first error returns.
    pub fn apply_intents(
        &mut self,
        intents: Vec<Intent>,
    ) -> Result<Vec<ApplyOutcome>, EngineError> {
        self.start_batch()?;
        let mut outcomes = Vec::with_capacity(intents.len());
        for intent in intents {
            match self.apply_intent(intent) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    let _ = self.rollback_batch();
                    return Err(err);
                }
            }
        }
        self.commit_batch()?;
        Ok(outcomes)
    }

    /// Execute against the live tree, restoring the pre-intent state when
    /// dispatch or post-validation fails.
    fn execute_checked(&mut self, intent: &Intent) -> Result<Option<ShapeId>, EngineError> {
        let before = self.doc.clone();
        let applied = replay(&mut self.doc, intent).and_then(|shape_id| {
            validate::validate_state(&self.doc)?;
            Ok(shape_id)
        });
        match applied {
            Ok(shape_id) => Ok(shape_id),
            Err(err) => {
                log::warn!("intent `{}` rejected: {err}", intent.name());
                self.doc = before;
                Err(err)
            }
        }
    }

    // ─── Batching ────────────────────────────────────────────────────────

    /// Open a batch. The pre-batch snapshot enables rollback; nesting is
    /// not supported.
    pub fn start_batch(&mut self) -> Result<(), EngineError> {
        if self.batch.is_some() {
            return Err(EngineError::BatchInProgress);
        }
        self.batch = Some(Batch {
            snapshot: self.doc.clone(),
            intents: Vec::new(),
        });
        Ok(())
    }

    /// Close the batch, emitting one `BatchCommitted` event for the whole
    /// group. An empty batch emits nothing.
    pub fn commit_batch(&mut self) -> Result<(), EngineError> {
        let batch = self.batch.take().ok_or(EngineError::NoActiveBatch)?;
        if batch.intents.is_empty() {
            return Ok(());
        }
        let timestamp = now_millis();
        self.doc.meta.modified_at = timestamp;
        let event = StateEvent::BatchCommitted {
            intents: batch.intents,
            before: Box::new(batch.snapshot),
            after: Box::new(self.doc.clone()),
            timestamp,
        };
        self.emit(&event);
        Ok(())
    }

    /// Discard the batch, restoring the pre-batch snapshot. Emits nothing.
    pub fn rollback_batch(&mut self) -> Result<(), EngineError> {
        let batch = self.batch.take().ok_or(EngineError::NoActiveBatch)?;
        log::debug!("rolling back batch of {} intents", batch.intents.len());
        self.doc = batch.snapshot;
        Ok(())
    }

    // ─── Serialization ───────────────────────────────────────────────────

    /// Serialize the full tree as pretty JSON.
    pub fn export_state(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.doc)?)
    }

    /// Replace the tree from serialized JSON. Re-validates before the swap,
    /// drops any open batch, and emits `Imported`.
    pub fn import_state(&mut self, json: &str) -> Result<(), EngineError> {
        let doc: DocumentState = serde_json::from_str(json)?;
        validate::validate_state(&doc)?;
        self.batch = None;
        self.doc = doc;
        let event = StateEvent::Imported {
            state: Box::new(self.doc.clone()),
            timestamp: now_millis(),
        };
        self.emit(&event);
        Ok(())
    }

    /// Serialize the full tree as MessagePack (compact persistence form).
    pub fn export_bytes(&self) -> Result<Vec<u8>, EngineError> {
        Ok(rmp_serde::to_vec_named(&self.doc)?)
    }

    /// Replace the tree from MessagePack bytes; same semantics as
    /// `import_state`.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let doc: DocumentState = rmp_serde::from_slice(bytes)?;
        validate::validate_state(&doc)?;
        self.batch = None;
        self.doc = doc;
        let event = StateEvent::Imported {
            state: Box::new(self.doc.clone()),
            timestamp: now_millis(),
        };
        self.emit(&event);
        Ok(())
    }

    /// Restore a fresh empty tree and emit `Reset`.
    pub fn reset(&mut self) {
        self.batch = None;
        self.doc = DocumentState::new();
        let event = StateEvent::Reset {
            timestamp: now_millis(),
        };
        self.emit(&event);
    }

    fn emit(&mut self, event: &StateEvent) {
        log::trace!("emit {}", event.name());
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl Default for StateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Normalization ───────────────────────────────────────────────────────

/// Fill generated ids into create/group payloads so emitted events always
/// carry replayable, fully-identified intents.
fn normalize(mut intent: Intent) -> Intent {
    match &mut intent {
        Intent::ShapeCreate {
            shape_type,
            properties,
        } => {
            if properties.id.is_none() {
                properties.id = Some(id::generate(shape_type.name()));
            }
        }
        Intent::LayerGroup { group_id, .. } => {
            if group_id.is_none() {
                *group_id = Some(id::generate("group"));
            }
        }
        _ => {}
    }
    intent
}

// ─── Dispatch ────────────────────────────────────────────────────────────

/// Execute one intent against a bare document tree. This is the raw
/// dispatch step shared by the engine and by history replay; it performs
/// reference checks but no payload validation and no whole-tree
/// re-validation — callers that mutate live state wrap it accordingly.
pub fn replay(doc: &mut DocumentState, intent: &Intent) -> Result<Option<ShapeId>, EngineError> {
    match intent {
        Intent::ShapeCreate {
            shape_type,
            properties,
        } => {
            let id = properties
                .id
                .ok_or(EngineError::Invalid(validate::ValidateError::MissingField {
                    intent: "shape.create",
                    field: "id",
                }))?;
            if doc.shapes.contains_key(&id) {
                return Err(EngineError::DuplicateShape(id));
            }
            let now = now_millis();
            let mut geometry = Geometry::default();
            properties.geometry.apply_to(&mut geometry);
            let mut style = Style::default();
            properties.style.apply_to(&mut style);
            let shape = Shape {
                id,
                kind: properties.build_kind(*shape_type),
                geometry,
                style,
                created_at: properties.created_at.unwrap_or(now),
                modified_at: now,
            };
            doc.shapes.insert(id, shape);
            doc.shape_order.push(id);
            Ok(Some(id))
        }

        Intent::ShapeUpdate { shape_id, patch } => {
            let shape = doc
                .shapes
                .get_mut(shape_id)
                .ok_or(EngineError::MissingShape(*shape_id))?;
            patch.geometry.apply_to(&mut shape.geometry);
            patch.style.apply_to(&mut shape.style);
            if let Some(content) = &patch.content
                && let ShapeKind::Text { content: current } = &mut shape.kind
            {
                *current = content.clone();
            }
            if let Some(src) = &patch.src
                && let ShapeKind::Image { src: current } = &mut shape.kind
            {
                *current = src.clone();
            }
            if let Some(points) = &patch.points {
                match &mut shape.kind {
                    ShapeKind::Line { points: current } | ShapeKind::Arrow { points: current } => {
                        *current = points.clone();
                    }
                    _ => {}
                }
            }
            shape.modified_at = now_millis();
            Ok(None)
        }

        Intent::ShapeDelete { shape_id } => {
            let shape = doc
                .shapes
                .get(shape_id)
                .ok_or(EngineError::MissingShape(*shape_id))?;
            if shape.is_group() {
                return Err(EngineError::GroupNotEmpty(*shape_id));
            }
            if doc.owning_group(*shape_id).is_some() {
                return Err(EngineError::NotTopLevel(*shape_id));
            }
            doc.shapes.remove(shape_id);
            doc.shape_order.retain(|id| id != shape_id);
            doc.selection.ids.retain(|id| *id != *shape_id);
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::ShapeTransform { shape_id, geometry } => {
            let shape = doc
                .shapes
                .get_mut(shape_id)
                .ok_or(EngineError::MissingShape(*shape_id))?;
            geometry.apply_to(&mut shape.geometry);
            shape.modified_at = now_millis();
            Ok(None)
        }

        Intent::StyleUpdate { shape_id, style } => {
            let shape = doc
                .shapes
                .get_mut(shape_id)
                .ok_or(EngineError::MissingShape(*shape_id))?;
            style.apply_to(&mut shape.style);
            shape.modified_at = now_millis();
            Ok(None)
        }

        Intent::SelectionSet { ids } => {
            // Reference check before any mutation: no partial selection.
            for id in ids {
                if !doc.shapes.contains_key(id) {
                    return Err(EngineError::MissingShape(*id));
                }
            }
            doc.selection.ids.clear();
            for &id in ids {
                if !doc.selection.ids.contains(&id) {
                    doc.selection.ids.push(id);
                }
            }
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::SelectionAdd { shape_id } => {
            if !doc.shapes.contains_key(shape_id) {
                return Err(EngineError::MissingShape(*shape_id));
            }
            if !doc.selection.ids.contains(shape_id) {
                doc.selection.ids.push(*shape_id);
            }
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::SelectionRemove { shape_id } => {
            // Tolerant: removing an unselected or unknown id is a no-op.
            doc.selection.ids.retain(|id| *id != *shape_id);
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::SelectionClear => {
            doc.selection.ids.clear();
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::LayerReorder {
            shape_id,
            new_index,
        } => {
            if !doc.shapes.contains_key(shape_id) {
                return Err(EngineError::MissingShape(*shape_id));
            }
            let pos = doc
                .order_index(*shape_id)
                .ok_or(EngineError::NotTopLevel(*shape_id))?;
            doc.shape_order.remove(pos);
            // Out-of-range index behaves as append.
            let target = (*new_index).min(doc.shape_order.len());
            doc.shape_order.insert(target, *shape_id);
            Ok(None)
        }

        Intent::LayerGroup {
            shape_ids,
            group_id,
        } => {
            let gid = group_id.ok_or(EngineError::Invalid(
                validate::ValidateError::MissingField {
                    intent: "layer.group",
                    field: "group_id",
                },
            ))?;
            if doc.shapes.contains_key(&gid) {
                return Err(EngineError::DuplicateShape(gid));
            }
            for id in shape_ids {
                if !doc.shapes.contains_key(id) {
                    return Err(EngineError::MissingShape(*id));
                }
                if doc.order_index(*id).is_none() {
                    return Err(EngineError::NotTopLevel(*id));
                }
            }
            doc.shape_order.retain(|id| !shape_ids.contains(id));
            let now = now_millis();
            let group = Shape {
                id: gid,
                kind: ShapeKind::Group {
                    children: shape_ids.clone(),
                },
                geometry: bounding_box(doc, shape_ids),
                style: Style::default(),
                created_at: now,
                modified_at: now,
            };
            doc.shapes.insert(gid, group);
            doc.shape_order.push(gid);
            Ok(Some(gid))
        }

        Intent::LayerUngroup { group_id } => {
            let shape = doc
                .shapes
                .get(group_id)
                .ok_or(EngineError::MissingShape(*group_id))?;
            let children = match &shape.kind {
                ShapeKind::Group { children } => children.clone(),
                _ => return Err(EngineError::NotAGroup(*group_id)),
            };
            let pos = doc
                .order_index(*group_id)
                .ok_or(EngineError::NotTopLevel(*group_id))?;
            doc.shapes.remove(group_id);
            doc.shape_order.remove(pos);
            // Splice children back at the group's former position,
            // preserving their relative order.
            for (offset, child) in children.into_iter().enumerate() {
                doc.shape_order.insert(pos + offset, child);
            }
            doc.selection.ids.retain(|id| *id != *group_id);
            doc.selection.sync_mode();
            Ok(None)
        }

        Intent::CanvasPan { dx, dy } => {
            doc.canvas.transform.translate_x += dx;
            doc.canvas.transform.translate_y += dy;
            Ok(None)
        }

        Intent::CanvasZoom { scale, point } => {
            let t = &mut doc.canvas.transform;
            let old_scale = t.scale;
            t.scale = *scale;
            if let Some(p) = point {
                // Keep the focal point fixed under the new scale.
                let ratio = *scale / old_scale;
                t.translate_x = p.x - (p.x - t.translate_x) * ratio;
                t.translate_y = p.y - (p.y - t.translate_y) * ratio;
            }
            Ok(None)
        }

        Intent::CanvasResize { width, height } => {
            doc.canvas.width = *width;
            doc.canvas.height = *height;
            Ok(None)
        }

        Intent::ToolActivate { tool, config } => {
            doc.active_tool = Some(crate::model::ToolState {
                tool: tool.clone(),
                config: config.clone(),
            });
            Ok(None)
        }

        Intent::ToolDeactivate => {
            doc.active_tool = None;
            Ok(None)
        }
    }
}

/// Axis-aligned bounding box over the given shapes' geometry.
fn bounding_box(doc: &DocumentState, ids: &[ShapeId]) -> Geometry {
    let mut left = f64::INFINITY;
    let mut top = f64::INFINITY;
    let mut right = f64::NEG_INFINITY;
    let mut bottom = f64::NEG_INFINITY;
    for id in ids {
        if let Some(shape) = doc.shapes.get(id) {
            let g = &shape.geometry;
            left = left.min(g.left);
            top = top.min(g.top);
            right = right.max(g.left + g.width);
            bottom = bottom.max(g.top + g.height);
        }
    }
    if !left.is_finite() {
        return Geometry::default();
    }
    Geometry {
        left,
        top,
        width: right - left,
        height: bottom - top,
        ..Geometry::default()
    }
}
