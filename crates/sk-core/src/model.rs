//! Core data model for Sketchboard documents.
//!
//! The document is a flat shape map plus an explicit top-level paint order.
//! Groups own their children by reference (ordered id lists), not by
//! containment, so every shape lives in the map exactly once. The tree is
//! plain data: `Clone` is a deep copy, serde is the persistence format, and
//! all mutation goes through the state engine.

use crate::id::ShapeId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Document schema version stamped into `DocumentMeta`.
pub const SCHEMA_VERSION: u32 = 1;

// ─── Color ───────────────────────────────────────────────────────────────

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex color string: `#RGB`, `#RRGGBB`, `#RRGGBBAA`.
    /// The string may optionally start with `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        match hex.len() {
            3 => {
                let v = u16::from_str_radix(hex, 16).ok()?;
                let r = ((v >> 8) & 0xF) as u8;
                let g = ((v >> 4) & 0xF) as u8;
                let b = (v & 0xF) as u8;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Self::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            8 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Self::rgba(
                    (v >> 24) as u8,
                    (v >> 16) as u8,
                    (v >> 8) as u8,
                    v as u8,
                ))
            }
            _ => None,
        }
    }

    /// Emit as shortest valid hex string.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

// ─── Font ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub weight: u16, // 100..900
    pub size: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Inter".into(),
            weight: 400,
            size: 14.0,
        }
    }
}

// ─── Style ───────────────────────────────────────────────────────────────

/// Effective style of a shape. Every field has a value; partial updates
/// arrive as a `StylePatch` and merge over this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f64,
    pub opacity: f64,
    pub corner_radius: f64,
    pub font: FontSpec,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Color::rgb(0xD9, 0xD9, 0xD9),
            stroke: Color::rgb(0, 0, 0),
            stroke_width: 1.0,
            opacity: 1.0,
            corner_radius: 0.0,
            font: FontSpec::default(),
        }
    }
}

/// Partial style: only `Some` fields are applied on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylePatch {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub corner_radius: Option<f64>,
    pub font: Option<FontSpec>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge this patch into `style`, overwriting only `Some` fields.
    pub fn apply_to(&self, style: &mut Style) {
        if let Some(fill) = self.fill {
            style.fill = fill;
        }
        if let Some(stroke) = self.stroke {
            style.stroke = stroke;
        }
        if let Some(w) = self.stroke_width {
            style.stroke_width = w;
        }
        if let Some(o) = self.opacity {
            style.opacity = o;
        }
        if let Some(r) = self.corner_radius {
            style.corner_radius = r;
        }
        if let Some(ref f) = self.font {
            style.font = f.clone();
        }
    }

    /// Full capture of a style record (used when restoring a shape).
    pub fn from_style(style: &Style) -> StylePatch {
        StylePatch {
            fill: Some(style.fill),
            stroke: Some(style.stroke),
            stroke_width: Some(style.stroke_width),
            opacity: Some(style.opacity),
            corner_radius: Some(style.corner_radius),
            font: Some(style.font.clone()),
        }
    }

    /// Capture the current values of exactly the fields this patch touches.
    /// Applying the result restores `base` for those fields.
    pub fn capture(&self, base: &Style) -> StylePatch {
        StylePatch {
            fill: self.fill.map(|_| base.fill),
            stroke: self.stroke.map(|_| base.stroke),
            stroke_width: self.stroke_width.map(|_| base.stroke_width),
            opacity: self.opacity.map(|_| base.opacity),
            corner_radius: self.corner_radius.map(|_| base.corner_radius),
            font: self.font.as_ref().map(|_| base.font.clone()),
        }
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Placement of a shape on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64, // degrees
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Partial geometry: only `Some` fields are applied on merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryPatch {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub angle: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
}

impl GeometryPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge this patch into `geometry`, leaving untouched fields at their
    /// current value.
    pub fn apply_to(&self, geometry: &mut Geometry) {
        if let Some(v) = self.left {
            geometry.left = v;
        }
        if let Some(v) = self.top {
            geometry.top = v;
        }
        if let Some(v) = self.width {
            geometry.width = v;
        }
        if let Some(v) = self.height {
            geometry.height = v;
        }
        if let Some(v) = self.angle {
            geometry.angle = v;
        }
        if let Some(v) = self.scale_x {
            geometry.scale_x = v;
        }
        if let Some(v) = self.scale_y {
            geometry.scale_y = v;
        }
    }

    /// Capture the current values of exactly the fields this patch touches.
    pub fn capture(&self, base: &Geometry) -> GeometryPatch {
        GeometryPatch {
            left: self.left.map(|_| base.left),
            top: self.top.map(|_| base.top),
            width: self.width.map(|_| base.width),
            height: self.height.map(|_| base.height),
            angle: self.angle.map(|_| base.angle),
            scale_x: self.scale_x.map(|_| base.scale_x),
            scale_y: self.scale_y.map(|_| base.scale_y),
        }
    }

    /// Full capture of a geometry record (used when restoring a shape).
    pub fn from_geometry(g: &Geometry) -> GeometryPatch {
        GeometryPatch {
            left: Some(g.left),
            top: Some(g.top),
            width: Some(g.width),
            height: Some(g.height),
            angle: Some(g.angle),
            scale_x: Some(g.scale_x),
            scale_y: Some(g.scale_y),
        }
    }

    /// Iterate over the `Some` values (for finiteness validation).
    pub fn values(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("left", self.left),
            ("top", self.top),
            ("width", self.width),
            ("height", self.height),
            ("angle", self.angle),
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.map(|v| (name, v)))
    }
}

// ─── Path data ───────────────────────────────────────────────────────────

/// A single path command (SVG-like but simplified).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),                // control, end
    CubicTo(f64, f64, f64, f64, f64, f64),     // c1, c2, end
    Close,
}

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

// ─── Shapes ──────────────────────────────────────────────────────────────

/// The shape variants in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Rect,
    Circle,
    Ellipse,
    Triangle,
    Polygon { sides: u32 },

    /// Polyline with at least two points.
    Line { points: Vec<Point> },
    /// Line with an arrow head; same point rules as `Line`.
    Arrow { points: Vec<Point> },

    /// Freeform path (pen tool output).
    Path { commands: Vec<PathCmd> },

    /// Text label.
    Text { content: String },

    /// Bitmap reference; `src` is resolved by the renderer.
    Image { src: String },

    /// Ordered child ids, owned by reference.
    Group { children: Vec<ShapeId> },
}

/// Fieldless discriminant for `ShapeKind`, used by create payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rect,
    Circle,
    Ellipse,
    Triangle,
    Polygon,
    Line,
    Arrow,
    Path,
    Text,
    Image,
    Group,
}

impl ShapeType {
    /// Id prefix for generated shape ids.
    pub fn name(&self) -> &'static str {
        match self {
            ShapeType::Rect => "rect",
            ShapeType::Circle => "circle",
            ShapeType::Ellipse => "ellipse",
            ShapeType::Triangle => "triangle",
            ShapeType::Polygon => "polygon",
            ShapeType::Line => "line",
            ShapeType::Arrow => "arrow",
            ShapeType::Path => "path",
            ShapeType::Text => "text",
            ShapeType::Image => "image",
            ShapeType::Group => "group",
        }
    }
}

/// A single shape in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub geometry: Geometry,
    pub style: Style,
    pub created_at: u64,
    pub modified_at: u64,
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self.kind {
            ShapeKind::Rect => ShapeType::Rect,
            ShapeKind::Circle => ShapeType::Circle,
            ShapeKind::Ellipse => ShapeType::Ellipse,
            ShapeKind::Triangle => ShapeType::Triangle,
            ShapeKind::Polygon { .. } => ShapeType::Polygon,
            ShapeKind::Line { .. } => ShapeType::Line,
            ShapeKind::Arrow { .. } => ShapeType::Arrow,
            ShapeKind::Path { .. } => ShapeType::Path,
            ShapeKind::Text { .. } => ShapeType::Text,
            ShapeKind::Image { .. } => ShapeType::Image,
            ShapeKind::Group { .. } => ShapeType::Group,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ShapeKind::Group { .. })
    }

    /// Children of a group shape, empty for any other kind.
    pub fn children(&self) -> &[ShapeId] {
        match &self.kind {
            ShapeKind::Group { children } => children,
            _ => &[],
        }
    }
}

// ─── Canvas ──────────────────────────────────────────────────────────────

/// Viewport transform: uniform scale plus translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasMeta {
    pub width: f64,
    pub height: f64,
    pub background: Color,
    pub transform: CanvasTransform,
}

impl Default for CanvasMeta {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            background: Color::rgb(255, 255, 255),
            transform: CanvasTransform::default(),
        }
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

/// The active selection. `mode` is `Multiple` iff more than one id is held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub ids: SmallVec<[ShapeId; 4]>,
    pub mode: SelectionMode,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.ids.contains(&id)
    }

    /// Recompute `mode` from the id count. Call after any id change.
    pub fn sync_mode(&mut self) {
        self.mode = if self.ids.len() > 1 {
            SelectionMode::Multiple
        } else {
            SelectionMode::Single
        };
    }
}

// ─── Tool ────────────────────────────────────────────────────────────────

/// The active tool and its configuration. Tool configs are open-ended
/// (owned by the UI collaborator), so they stay as structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    pub tool: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

// ─── Document ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub version: u32,
    pub created_at: u64,
    pub modified_at: u64,
}

/// The complete document state tree.
///
/// `shape_order` holds the paint order of top-level shapes (last painted on
/// top). Shapes owned by a group appear only in that group's child list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub canvas: CanvasMeta,
    pub shapes: HashMap<ShapeId, Shape>,
    pub shape_order: Vec<ShapeId>,
    pub selection: Selection,
    pub active_tool: Option<ToolState>,
    pub meta: DocumentMeta,
}

impl DocumentState {
    /// Create a fresh empty document.
    #[must_use]
    pub fn new() -> Self {
        let now = crate::id::now_millis();
        Self {
            canvas: CanvasMeta::default(),
            shapes: HashMap::new(),
            shape_order: Vec::new(),
            selection: Selection::default(),
            active_tool: None,
            meta: DocumentMeta {
                version: SCHEMA_VERSION,
                created_at: now,
                modified_at: now,
            },
        }
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Position of a shape in the top-level paint order.
    pub fn order_index(&self, id: ShapeId) -> Option<usize> {
        self.shape_order.iter().position(|&s| s == id)
    }

    /// The group that owns `id` as a child, if any.
    pub fn owning_group(&self, id: ShapeId) -> Option<ShapeId> {
        self.shapes
            .values()
            .find(|s| s.children().contains(&id))
            .map(|s| s.id)
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::new()
    }
}
