//! Intents — the sole unit of state mutation.
//!
//! An intent is a tagged command with a typed payload, drawn from a closed
//! set across five domains: shape lifecycle, selection, layer ordering,
//! canvas, and tool. The validator gates payloads before dispatch, and the
//! dispatch match in `state` is exhaustive, so an unknown intent type cannot
//! exist at runtime.

use crate::id::ShapeId;
use crate::model::{
    GeometryPatch, PathCmd, Point, Shape, ShapeKind, ShapeType, StylePatch,
};
use serde::{Deserialize, Serialize};

// ─── Create payload ──────────────────────────────────────────────────────

/// Property bag for `shape.create`. Kind-specific fields are optional here;
/// the validator enforces the ones the target kind requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeInit {
    /// Explicit id. Left empty, the engine assigns one.
    pub id: Option<ShapeId>,
    pub geometry: GeometryPatch,
    pub style: StylePatch,

    /// Line/arrow vertices (at least two).
    pub points: Option<Vec<Point>>,
    /// Path commands (pen tool output).
    pub commands: Option<Vec<PathCmd>>,
    /// Text content.
    pub content: Option<String>,
    /// Image source reference.
    pub src: Option<String>,
    /// Group children, ordered.
    pub children: Option<Vec<ShapeId>>,
    /// Polygon side count.
    pub sides: Option<u32>,

    /// Original creation stamp, set when restoring a deleted shape.
    pub created_at: Option<u64>,
}

impl ShapeInit {
    /// Capture a live shape's full state, so that applying a `shape.create`
    /// built from the result reproduces it exactly.
    pub fn from_shape(shape: &Shape) -> ShapeInit {
        let mut init = ShapeInit {
            id: Some(shape.id),
            geometry: GeometryPatch::from_geometry(&shape.geometry),
            style: StylePatch::from_style(&shape.style),
            created_at: Some(shape.created_at),
            ..Default::default()
        };
        match &shape.kind {
            ShapeKind::Polygon { sides } => init.sides = Some(*sides),
            ShapeKind::Line { points } | ShapeKind::Arrow { points } => {
                init.points = Some(points.clone());
            }
            ShapeKind::Path { commands } => init.commands = Some(commands.clone()),
            ShapeKind::Text { content } => init.content = Some(content.clone()),
            ShapeKind::Image { src } => init.src = Some(src.clone()),
            ShapeKind::Group { children } => init.children = Some(children.clone()),
            ShapeKind::Rect | ShapeKind::Circle | ShapeKind::Ellipse | ShapeKind::Triangle => {}
        }
        init
    }

    /// Build the concrete shape kind. Assumes the payload passed
    /// `validate_intent`; missing kind data falls back to empty defaults.
    pub fn build_kind(&self, shape_type: ShapeType) -> ShapeKind {
        match shape_type {
            ShapeType::Rect => ShapeKind::Rect,
            ShapeType::Circle => ShapeKind::Circle,
            ShapeType::Ellipse => ShapeKind::Ellipse,
            ShapeType::Triangle => ShapeKind::Triangle,
            ShapeType::Polygon => ShapeKind::Polygon {
                sides: self.sides.unwrap_or(3),
            },
            ShapeType::Line => ShapeKind::Line {
                points: self.points.clone().unwrap_or_default(),
            },
            ShapeType::Arrow => ShapeKind::Arrow {
                points: self.points.clone().unwrap_or_default(),
            },
            ShapeType::Path => ShapeKind::Path {
                commands: self.commands.clone().unwrap_or_default(),
            },
            ShapeType::Text => ShapeKind::Text {
                content: self.content.clone().unwrap_or_default(),
            },
            ShapeType::Image => ShapeKind::Image {
                src: self.src.clone().unwrap_or_default(),
            },
            ShapeType::Group => ShapeKind::Group {
                children: self.children.clone().unwrap_or_default(),
            },
        }
    }
}

// ─── Update payload ──────────────────────────────────────────────────────

/// Partial shape update: geometry and style merge field-wise; kind payloads
/// replace wholesale when present and the kind accepts them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapePatch {
    pub geometry: GeometryPatch,
    pub style: StylePatch,
    pub content: Option<String>,
    pub src: Option<String>,
    pub points: Option<Vec<Point>>,
}

impl ShapePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ─── Intents ─────────────────────────────────────────────────────────────

/// A typed command against the document. The exclusive mutation vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Intent {
    #[serde(rename = "shape.create")]
    ShapeCreate {
        shape_type: ShapeType,
        properties: ShapeInit,
    },
    #[serde(rename = "shape.update")]
    ShapeUpdate { shape_id: ShapeId, patch: ShapePatch },
    #[serde(rename = "shape.delete")]
    ShapeDelete { shape_id: ShapeId },
    #[serde(rename = "shape.transform")]
    ShapeTransform {
        shape_id: ShapeId,
        geometry: GeometryPatch,
    },
    #[serde(rename = "style.update")]
    StyleUpdate {
        shape_id: ShapeId,
        style: StylePatch,
    },

    #[serde(rename = "selection.set")]
    SelectionSet { ids: Vec<ShapeId> },
    #[serde(rename = "selection.add")]
    SelectionAdd { shape_id: ShapeId },
    #[serde(rename = "selection.remove")]
    SelectionRemove { shape_id: ShapeId },
    #[serde(rename = "selection.clear")]
    SelectionClear,

    #[serde(rename = "layer.reorder")]
    LayerReorder { shape_id: ShapeId, new_index: usize },
    #[serde(rename = "layer.group")]
    LayerGroup {
        shape_ids: Vec<ShapeId>,
        /// Explicit group id. Left empty, the engine assigns one.
        group_id: Option<ShapeId>,
    },
    #[serde(rename = "layer.ungroup")]
    LayerUngroup { group_id: ShapeId },

    #[serde(rename = "canvas.pan")]
    CanvasPan { dx: f64, dy: f64 },
    #[serde(rename = "canvas.zoom")]
    CanvasZoom {
        scale: f64,
        /// Focal point kept fixed under the new scale.
        point: Option<Point>,
    },
    #[serde(rename = "canvas.resize")]
    CanvasResize { width: f64, height: f64 },

    #[serde(rename = "tool.activate")]
    ToolActivate {
        tool: String,
        #[serde(default)]
        config: serde_json::Value,
    },
    #[serde(rename = "tool.deactivate")]
    ToolDeactivate,
}

impl Intent {
    /// Wire name of the intent type, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ShapeCreate { .. } => "shape.create",
            Intent::ShapeUpdate { .. } => "shape.update",
            Intent::ShapeDelete { .. } => "shape.delete",
            Intent::ShapeTransform { .. } => "shape.transform",
            Intent::StyleUpdate { .. } => "style.update",
            Intent::SelectionSet { .. } => "selection.set",
            Intent::SelectionAdd { .. } => "selection.add",
            Intent::SelectionRemove { .. } => "selection.remove",
            Intent::SelectionClear => "selection.clear",
            Intent::LayerReorder { .. } => "layer.reorder",
            Intent::LayerGroup { .. } => "layer.group",
            Intent::LayerUngroup { .. } => "layer.ungroup",
            Intent::CanvasPan { .. } => "canvas.pan",
            Intent::CanvasZoom { .. } => "canvas.zoom",
            Intent::CanvasResize { .. } => "canvas.resize",
            Intent::ToolActivate { .. } => "tool.activate",
            Intent::ToolDeactivate => "tool.deactivate",
        }
    }
}
