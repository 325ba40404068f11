//! Structural validation for intents, shapes, and the state tree.
//!
//! `validate_intent` is the sole gate before any mutation attempt;
//! `validate_state` re-checks the tree invariants after every mutation. A
//! violation aborts the mutation that produced it: the engine restores the
//! pre-state rather than repairing anything in place.

use crate::id::ShapeId;
use crate::intent::{Intent, ShapeInit, ShapePatch};
use crate::model::{
    DocumentState, GeometryPatch, Point, Shape, ShapeKind, ShapeType, StylePatch,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("{intent}: missing required field `{field}`")]
    MissingField {
        intent: &'static str,
        field: &'static str,
    },
    #[error("{intent}: field `{field}` {reason}")]
    Invalid {
        intent: &'static str,
        field: &'static str,
        reason: &'static str,
    },

    #[error("shape `{id}` {reason}")]
    BadShape { id: ShapeId, reason: &'static str },

    #[error("paint order references unknown shape `{id}`")]
    OrderUnknownShape { id: ShapeId },
    #[error("shape `{id}` appears twice in the paint order")]
    DuplicateOrder { id: ShapeId },
    #[error("shape `{id}` is neither top-level nor owned by a group")]
    Unparented { id: ShapeId },
    #[error("shape `{id}` is owned more than once")]
    MultiParented { id: ShapeId },
    #[error("group `{group}` references unknown child `{child}`")]
    MissingChild { group: ShapeId, child: ShapeId },
    #[error("selection references unknown shape `{id}`")]
    DanglingSelection { id: ShapeId },

    #[error("canvas field `{field}` {reason}")]
    BadCanvas {
        field: &'static str,
        reason: &'static str,
    },
}

type Result<T = ()> = std::result::Result<T, ValidateError>;

// ─── Intent validation ───────────────────────────────────────────────────

/// Check that an intent's payload carries the type-specific required fields
/// and that every numeric field is structurally sound.
pub fn validate_intent(intent: &Intent) -> Result {
    let name = intent.name();
    match intent {
        Intent::ShapeCreate {
            shape_type,
            properties,
        } => validate_create(name, *shape_type, properties),
        Intent::ShapeUpdate { patch, .. } => validate_shape_patch(name, patch),
        Intent::ShapeDelete { .. } => Ok(()),
        Intent::ShapeTransform { geometry, .. } => validate_geometry_patch(name, geometry),
        Intent::StyleUpdate { style, .. } => validate_style_patch(name, style),

        Intent::SelectionSet { .. }
        | Intent::SelectionAdd { .. }
        | Intent::SelectionRemove { .. }
        | Intent::SelectionClear => Ok(()),

        Intent::LayerReorder { .. } => Ok(()),
        Intent::LayerGroup {
            shape_ids,
            group_id,
        } => {
            if shape_ids.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "shape_ids",
                    reason: "must not be empty",
                });
            }
            let mut seen = HashSet::new();
            for id in shape_ids {
                if !seen.insert(*id) {
                    return Err(ValidateError::Invalid {
                        intent: name,
                        field: "shape_ids",
                        reason: "contains duplicate ids",
                    });
                }
            }
            if let Some(id) = group_id
                && id.as_str().is_empty()
            {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "group_id",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        Intent::LayerUngroup { .. } => Ok(()),

        Intent::CanvasPan { dx, dy } => {
            finite(name, "dx", *dx)?;
            finite(name, "dy", *dy)
        }
        Intent::CanvasZoom { scale, point } => {
            positive(name, "scale", *scale)?;
            if let Some(p) = point {
                finite(name, "point.x", p.x)?;
                finite(name, "point.y", p.y)?;
            }
            Ok(())
        }
        Intent::CanvasResize { width, height } => {
            positive(name, "width", *width)?;
            positive(name, "height", *height)
        }

        Intent::ToolActivate { tool, .. } => {
            if tool.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "tool",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        Intent::ToolDeactivate => Ok(()),
    }
}

fn validate_create(name: &'static str, shape_type: ShapeType, init: &ShapeInit) -> Result {
    if let Some(id) = init.id
        && id.as_str().is_empty()
    {
        return Err(ValidateError::Invalid {
            intent: name,
            field: "id",
            reason: "must not be empty",
        });
    }
    validate_geometry_patch(name, &init.geometry)?;
    validate_style_patch(name, &init.style)?;

    match shape_type {
        ShapeType::Line | ShapeType::Arrow => {
            let points = init.points.as_ref().ok_or(ValidateError::MissingField {
                intent: name,
                field: "points",
            })?;
            validate_points(name, points)
        }
        ShapeType::Polygon => {
            let sides = init.sides.ok_or(ValidateError::MissingField {
                intent: name,
                field: "sides",
            })?;
            if sides < 3 {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "sides",
                    reason: "needs at least three sides",
                });
            }
            Ok(())
        }
        ShapeType::Path => {
            let commands = init.commands.as_ref().ok_or(ValidateError::MissingField {
                intent: name,
                field: "commands",
            })?;
            if commands.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "commands",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        ShapeType::Text => {
            let content = init.content.as_ref().ok_or(ValidateError::MissingField {
                intent: name,
                field: "content",
            })?;
            if content.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "content",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        ShapeType::Image => {
            let src = init.src.as_ref().ok_or(ValidateError::MissingField {
                intent: name,
                field: "src",
            })?;
            if src.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "src",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        ShapeType::Group => {
            let children = init.children.as_ref().ok_or(ValidateError::MissingField {
                intent: name,
                field: "children",
            })?;
            if children.is_empty() {
                return Err(ValidateError::Invalid {
                    intent: name,
                    field: "children",
                    reason: "must not be empty",
                });
            }
            Ok(())
        }
        ShapeType::Rect | ShapeType::Circle | ShapeType::Ellipse | ShapeType::Triangle => Ok(()),
    }
}

fn validate_shape_patch(name: &'static str, patch: &ShapePatch) -> Result {
    validate_geometry_patch(name, &patch.geometry)?;
    validate_style_patch(name, &patch.style)?;
    if let Some(points) = &patch.points {
        validate_points(name, points)?;
    }
    Ok(())
}

fn validate_geometry_patch(name: &'static str, patch: &GeometryPatch) -> Result {
    for (field, value) in patch.values() {
        finite(name, field, value)?;
    }
    if let Some(w) = patch.width
        && w <= 0.0
    {
        return Err(ValidateError::Invalid {
            intent: name,
            field: "width",
            reason: "must be positive",
        });
    }
    if let Some(h) = patch.height
        && h <= 0.0
    {
        return Err(ValidateError::Invalid {
            intent: name,
            field: "height",
            reason: "must be positive",
        });
    }
    Ok(())
}

fn validate_style_patch(name: &'static str, patch: &StylePatch) -> Result {
    if let Some(o) = patch.opacity {
        finite(name, "opacity", o)?;
        if !(0.0..=1.0).contains(&o) {
            return Err(ValidateError::Invalid {
                intent: name,
                field: "opacity",
                reason: "must be within [0, 1]",
            });
        }
    }
    if let Some(w) = patch.stroke_width {
        finite(name, "stroke_width", w)?;
        if w < 0.0 {
            return Err(ValidateError::Invalid {
                intent: name,
                field: "stroke_width",
                reason: "must not be negative",
            });
        }
    }
    if let Some(r) = patch.corner_radius {
        finite(name, "corner_radius", r)?;
    }
    Ok(())
}

fn validate_points(name: &'static str, points: &[Point]) -> Result {
    if points.len() < 2 {
        return Err(ValidateError::Invalid {
            intent: name,
            field: "points",
            reason: "needs at least two points",
        });
    }
    for p in points {
        finite(name, "points", p.x)?;
        finite(name, "points", p.y)?;
    }
    Ok(())
}

fn finite(intent: &'static str, field: &'static str, value: f64) -> Result {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidateError::Invalid {
            intent,
            field,
            reason: "must be a finite number",
        })
    }
}

fn positive(intent: &'static str, field: &'static str, value: f64) -> Result {
    finite(intent, field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidateError::Invalid {
            intent,
            field,
            reason: "must be positive",
        })
    }
}

// ─── Shape validation ────────────────────────────────────────────────────

/// Per-variant structural check of a single shape.
pub fn validate_shape(shape: &Shape) -> Result {
    let id = shape.id;
    let g = &shape.geometry;
    for v in [
        g.left, g.top, g.width, g.height, g.angle, g.scale_x, g.scale_y,
    ] {
        if !v.is_finite() {
            return Err(ValidateError::BadShape {
                id,
                reason: "has non-finite geometry",
            });
        }
    }
    if g.width <= 0.0 || g.height <= 0.0 {
        return Err(ValidateError::BadShape {
            id,
            reason: "has non-positive dimensions",
        });
    }
    if !(0.0..=1.0).contains(&shape.style.opacity) {
        return Err(ValidateError::BadShape {
            id,
            reason: "has opacity outside [0, 1]",
        });
    }
    if shape.style.stroke_width < 0.0 || !shape.style.stroke_width.is_finite() {
        return Err(ValidateError::BadShape {
            id,
            reason: "has a negative stroke width",
        });
    }

    match &shape.kind {
        ShapeKind::Line { points } | ShapeKind::Arrow { points } => {
            if points.len() < 2 {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "needs at least two points",
                });
            }
        }
        ShapeKind::Polygon { sides } => {
            if *sides < 3 {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "needs at least three sides",
                });
            }
        }
        ShapeKind::Path { commands } => {
            if commands.is_empty() {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "has an empty command list",
                });
            }
        }
        ShapeKind::Text { content } => {
            if content.is_empty() {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "has empty text content",
                });
            }
        }
        ShapeKind::Image { src } => {
            if src.is_empty() {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "has an empty image source",
                });
            }
        }
        ShapeKind::Group { children } => {
            if children.is_empty() {
                return Err(ValidateError::BadShape {
                    id,
                    reason: "is a group with no children",
                });
            }
        }
        ShapeKind::Rect | ShapeKind::Circle | ShapeKind::Ellipse | ShapeKind::Triangle => {}
    }
    Ok(())
}

// ─── State validation ────────────────────────────────────────────────────

/// Check the tree invariants. Run after every mutation.
pub fn validate_state(doc: &DocumentState) -> Result {
    check_paint_order(doc)?;
    check_ownership(doc)?;
    check_selection(doc)?;
    for shape in doc.shapes.values() {
        validate_shape(shape)?;
    }
    check_canvas(doc)
}

/// Every id in the paint order exists, and appears at most once.
fn check_paint_order(doc: &DocumentState) -> Result {
    let mut seen = HashSet::new();
    for &id in &doc.shape_order {
        if !doc.shapes.contains_key(&id) {
            return Err(ValidateError::OrderUnknownShape { id });
        }
        if !seen.insert(id) {
            return Err(ValidateError::DuplicateOrder { id });
        }
    }
    Ok(())
}

/// Every shape is owned exactly once: top-level in the paint order, or a
/// child of exactly one group. Groups nest through the same rule.
fn check_ownership(doc: &DocumentState) -> Result {
    let mut owners: HashMap<ShapeId, u32> = HashMap::new();
    for &id in &doc.shape_order {
        *owners.entry(id).or_default() += 1;
    }
    for shape in doc.shapes.values() {
        for &child in shape.children() {
            if !doc.shapes.contains_key(&child) {
                return Err(ValidateError::MissingChild {
                    group: shape.id,
                    child,
                });
            }
            *owners.entry(child).or_default() += 1;
        }
    }
    for shape in doc.shapes.values() {
        match owners.get(&shape.id).copied().unwrap_or(0) {
            0 => return Err(ValidateError::Unparented { id: shape.id }),
            1 => {}
            _ => return Err(ValidateError::MultiParented { id: shape.id }),
        }
    }
    Ok(())
}

/// Every selected id exists in the shape map.
fn check_selection(doc: &DocumentState) -> Result {
    for &id in &doc.selection.ids {
        if !doc.shapes.contains_key(&id) {
            return Err(ValidateError::DanglingSelection { id });
        }
    }
    Ok(())
}

fn check_canvas(doc: &DocumentState) -> Result {
    let c = &doc.canvas;
    if !(c.width.is_finite() && c.width > 0.0) {
        return Err(ValidateError::BadCanvas {
            field: "width",
            reason: "must be positive",
        });
    }
    if !(c.height.is_finite() && c.height > 0.0) {
        return Err(ValidateError::BadCanvas {
            field: "height",
            reason: "must be positive",
        });
    }
    if !(c.transform.scale.is_finite() && c.transform.scale > 0.0) {
        return Err(ValidateError::BadCanvas {
            field: "transform.scale",
            reason: "must be positive",
        });
    }
    if !c.transform.translate_x.is_finite() || !c.transform.translate_y.is_finite() {
        return Err(ValidateError::BadCanvas {
            field: "transform.translate",
            reason: "must be a finite number",
        });
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Geometry, Style};

    fn shape(id: &str, kind: ShapeKind) -> Shape {
        Shape {
            id: ShapeId::intern(id),
            kind,
            geometry: Geometry::default(),
            style: Style::default(),
            created_at: 0,
            modified_at: 0,
        }
    }

    #[test]
    fn create_line_needs_two_points() {
        let intent = Intent::ShapeCreate {
            shape_type: ShapeType::Line,
            properties: ShapeInit {
                points: Some(vec![Point { x: 0.0, y: 0.0 }]),
                ..Default::default()
            },
        };
        let err = validate_intent(&intent).unwrap_err();
        assert!(matches!(err, ValidateError::Invalid { field: "points", .. }));
    }

    #[test]
    fn create_text_requires_content() {
        let intent = Intent::ShapeCreate {
            shape_type: ShapeType::Text,
            properties: ShapeInit::default(),
        };
        let err = validate_intent(&intent).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::MissingField { field: "content", .. }
        ));
    }

    #[test]
    fn zoom_scale_must_be_positive() {
        let intent = Intent::CanvasZoom {
            scale: 0.0,
            point: None,
        };
        assert!(validate_intent(&intent).is_err());

        let intent = Intent::CanvasZoom {
            scale: f64::NAN,
            point: None,
        };
        assert!(validate_intent(&intent).is_err());
    }

    #[test]
    fn opacity_outside_unit_range_rejected() {
        let intent = Intent::StyleUpdate {
            shape_id: ShapeId::intern("r1"),
            style: StylePatch {
                opacity: Some(1.5),
                ..Default::default()
            },
        };
        assert!(validate_intent(&intent).is_err());
    }

    #[test]
    fn state_rejects_order_entry_without_shape() {
        let mut doc = DocumentState::new();
        doc.shape_order.push(ShapeId::intern("ghost"));
        let err = validate_state(&doc).unwrap_err();
        assert!(matches!(err, ValidateError::OrderUnknownShape { .. }));
    }

    #[test]
    fn state_rejects_unparented_shape() {
        let mut doc = DocumentState::new();
        let s = shape("floating", ShapeKind::Rect);
        doc.shapes.insert(s.id, s);
        let err = validate_state(&doc).unwrap_err();
        assert!(matches!(err, ValidateError::Unparented { .. }));
    }

    #[test]
    fn state_rejects_dangling_selection() {
        let mut doc = DocumentState::new();
        doc.selection.ids.push(ShapeId::intern("ghost"));
        doc.selection.sync_mode();
        let err = validate_state(&doc).unwrap_err();
        assert!(matches!(err, ValidateError::DanglingSelection { .. }));
    }

    #[test]
    fn state_rejects_shape_owned_twice() {
        let mut doc = DocumentState::new();
        let child = shape("r1", ShapeKind::Rect);
        let child_id = child.id;
        let group = shape(
            "g1",
            ShapeKind::Group {
                children: vec![child_id],
            },
        );
        let group_id = group.id;
        doc.shapes.insert(child_id, child);
        doc.shapes.insert(group_id, group);
        doc.shape_order.push(group_id);
        doc.shape_order.push(child_id); // also top-level: owned twice
        let err = validate_state(&doc).unwrap_err();
        assert!(matches!(err, ValidateError::MultiParented { .. }));
    }

    #[test]
    fn valid_document_passes() {
        let mut doc = DocumentState::new();
        let s = shape("r1", ShapeKind::Rect);
        doc.shape_order.push(s.id);
        doc.shapes.insert(s.id, s);
        assert_eq!(validate_state(&doc), Ok(()));
    }
}
