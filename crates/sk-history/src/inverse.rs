//! Inverse intent synthesis.
//!
//! Forward intents carry only deltas, so the restore-to values are read
//! from the document as it stood *before* the forward intent applied. The
//! state engine hands that snapshot to observers in every change event;
//! synthesizing here, at record time, keeps history entries bounded by
//! intent size and makes reorder inverses immune to later reorders of the
//! same shape.

use sk_core::id::ShapeId;
use sk_core::intent::{Intent, ShapeInit, ShapePatch};
use sk_core::model::{DocumentState, ShapeKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InverseError {
    /// The intent type has no defined inverse. Such types are transient
    /// viewport/UI state and must never reach the undo stack.
    #[error("cannot create inverse for `{0}`")]
    NoInverse(&'static str),

    /// The pre-state does not contain the shape the intent refers to.
    #[error("unknown shape `{0}` at inverse synthesis")]
    MissingShape(ShapeId),
}

/// Build the intent that undoes `intent`, given the tree it applied to.
pub fn invert(before: &DocumentState, intent: &Intent) -> Result<Intent, InverseError> {
    match intent {
        // The engine normalizes create payloads, so the id is present on
        // every recorded forward intent.
        Intent::ShapeCreate { properties, .. } => {
            let shape_id = properties
                .id
                .ok_or(InverseError::NoInverse("shape.create"))?;
            Ok(Intent::ShapeDelete { shape_id })
        }

        Intent::ShapeDelete { shape_id } => {
            let shape = before
                .shape(*shape_id)
                .ok_or(InverseError::MissingShape(*shape_id))?;
            Ok(Intent::ShapeCreate {
                shape_type: shape.shape_type(),
                properties: ShapeInit::from_shape(shape),
            })
        }

        Intent::ShapeUpdate { shape_id, patch } => {
            let shape = before
                .shape(*shape_id)
                .ok_or(InverseError::MissingShape(*shape_id))?;
            let inverse = ShapePatch {
                geometry: patch.geometry.capture(&shape.geometry),
                style: patch.style.capture(&shape.style),
                content: patch.content.as_ref().and_then(|_| match &shape.kind {
                    ShapeKind::Text { content } => Some(content.clone()),
                    _ => None,
                }),
                src: patch.src.as_ref().and_then(|_| match &shape.kind {
                    ShapeKind::Image { src } => Some(src.clone()),
                    _ => None,
                }),
                points: patch.points.as_ref().and_then(|_| match &shape.kind {
                    ShapeKind::Line { points } | ShapeKind::Arrow { points } => {
                        Some(points.clone())
                    }
                    _ => None,
                }),
            };
            Ok(Intent::ShapeUpdate {
                shape_id: *shape_id,
                patch: inverse,
            })
        }

        Intent::ShapeTransform { shape_id, geometry } => {
            let shape = before
                .shape(*shape_id)
                .ok_or(InverseError::MissingShape(*shape_id))?;
            Ok(Intent::ShapeTransform {
                shape_id: *shape_id,
                geometry: geometry.capture(&shape.geometry),
            })
        }

        Intent::StyleUpdate { shape_id, style } => {
            let shape = before
                .shape(*shape_id)
                .ok_or(InverseError::MissingShape(*shape_id))?;
            Ok(Intent::StyleUpdate {
                shape_id: *shape_id,
                style: style.capture(&shape.style),
            })
        }

        Intent::LayerReorder { shape_id, .. } => {
            let new_index = before
                .order_index(*shape_id)
                .ok_or(InverseError::MissingShape(*shape_id))?;
            Ok(Intent::LayerReorder {
                shape_id: *shape_id,
                new_index,
            })
        }

        Intent::LayerGroup { group_id, .. } => {
            let group_id = group_id.ok_or(InverseError::NoInverse("layer.group"))?;
            Ok(Intent::LayerUngroup { group_id })
        }

        Intent::LayerUngroup { group_id } => {
            let shape = before
                .shape(*group_id)
                .ok_or(InverseError::MissingShape(*group_id))?;
            match &shape.kind {
                ShapeKind::Group { children } => Ok(Intent::LayerGroup {
                    shape_ids: children.clone(),
                    group_id: Some(*group_id),
                }),
                _ => Err(InverseError::NoInverse("layer.ungroup")),
            }
        }

        Intent::CanvasResize { .. } => Ok(Intent::CanvasResize {
            width: before.canvas.width,
            height: before.canvas.height,
        }),

        Intent::SelectionSet { .. }
        | Intent::SelectionAdd { .. }
        | Intent::SelectionRemove { .. }
        | Intent::SelectionClear
        | Intent::CanvasPan { .. }
        | Intent::CanvasZoom { .. }
        | Intent::ToolActivate { .. }
        | Intent::ToolDeactivate => Err(InverseError::NoInverse(intent.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_core::model::{Geometry, GeometryPatch, Shape, Style, StylePatch};

    fn doc_with_rect(id: &str, left: f64) -> (DocumentState, ShapeId) {
        let mut doc = DocumentState::new();
        let shape_id = ShapeId::intern(id);
        doc.shapes.insert(
            shape_id,
            Shape {
                id: shape_id,
                kind: ShapeKind::Rect,
                geometry: Geometry {
                    left,
                    ..Default::default()
                },
                style: Style::default(),
                created_at: 1,
                modified_at: 1,
            },
        );
        doc.shape_order.push(shape_id);
        (doc, shape_id)
    }

    #[test]
    fn create_inverts_to_delete() {
        let doc = DocumentState::new();
        let intent = Intent::ShapeCreate {
            shape_type: sk_core::model::ShapeType::Rect,
            properties: ShapeInit {
                id: Some(ShapeId::intern("r9")),
                ..Default::default()
            },
        };
        let inverse = invert(&doc, &intent).unwrap();
        assert_eq!(
            inverse,
            Intent::ShapeDelete {
                shape_id: ShapeId::intern("r9")
            }
        );
    }

    #[test]
    fn delete_inverts_to_full_recreate() {
        let (doc, id) = doc_with_rect("r1", 33.0);
        let inverse = invert(&doc, &Intent::ShapeDelete { shape_id: id }).unwrap();
        match inverse {
            Intent::ShapeCreate {
                shape_type,
                properties,
            } => {
                assert_eq!(shape_type, sk_core::model::ShapeType::Rect);
                assert_eq!(properties.id, Some(id));
                assert_eq!(properties.geometry.left, Some(33.0));
                assert_eq!(properties.created_at, Some(1));
            }
            other => panic!("expected shape.create, got {other:?}"),
        }
    }

    #[test]
    fn transform_inverse_captures_only_touched_fields() {
        let (doc, id) = doc_with_rect("r1", 10.0);
        let forward = Intent::ShapeTransform {
            shape_id: id,
            geometry: GeometryPatch {
                left: Some(99.0),
                ..Default::default()
            },
        };
        let inverse = invert(&doc, &forward).unwrap();
        match inverse {
            Intent::ShapeTransform { geometry, .. } => {
                assert_eq!(geometry.left, Some(10.0));
                assert!(geometry.top.is_none());
                assert!(geometry.width.is_none());
            }
            other => panic!("expected shape.transform, got {other:?}"),
        }
    }

    #[test]
    fn style_inverse_restores_prior_values() {
        let (doc, id) = doc_with_rect("r1", 0.0);
        let forward = Intent::StyleUpdate {
            shape_id: id,
            style: StylePatch {
                opacity: Some(0.2),
                ..Default::default()
            },
        };
        let inverse = invert(&doc, &forward).unwrap();
        match inverse {
            Intent::StyleUpdate { style, .. } => {
                assert_eq!(style.opacity, Some(1.0));
                assert!(style.fill.is_none());
            }
            other => panic!("expected style.update, got {other:?}"),
        }
    }

    #[test]
    fn reorder_inverse_uses_pre_move_index() {
        let (mut doc, id) = doc_with_rect("r1", 0.0);
        let (other_doc, other) = doc_with_rect("r2", 1.0);
        doc.shapes
            .insert(other, other_doc.shapes[&other].clone());
        doc.shape_order.insert(0, other);
        // `id` sits at index 1 before the move.
        let inverse = invert(
            &doc,
            &Intent::LayerReorder {
                shape_id: id,
                new_index: 0,
            },
        )
        .unwrap();
        assert_eq!(
            inverse,
            Intent::LayerReorder {
                shape_id: id,
                new_index: 1
            }
        );
    }

    #[test]
    fn transient_intents_have_no_inverse() {
        let doc = DocumentState::new();
        for intent in [
            Intent::SelectionClear,
            Intent::CanvasPan { dx: 1.0, dy: 1.0 },
            Intent::CanvasZoom {
                scale: 2.0,
                point: None,
            },
            Intent::ToolDeactivate,
        ] {
            let err = invert(&doc, &intent).unwrap_err();
            assert!(matches!(err, InverseError::NoInverse(_)));
        }
    }

    #[test]
    fn missing_shape_is_reported() {
        let doc = DocumentState::new();
        let err = invert(
            &doc,
            &Intent::ShapeDelete {
                shape_id: ShapeId::intern("ghost"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, InverseError::MissingShape(_)));
    }
}
