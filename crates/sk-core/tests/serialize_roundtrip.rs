//! Integration tests: full-document serialization round-trips (sk-core).
//!
//! Builds a document touching every shape variant through the public
//! intent surface, then checks that JSON and MessagePack round-trips are
//! deep-equal and that pointer slices resolve.

use pretty_assertions::assert_eq;
use sk_core::intent::{Intent, ShapeInit};
use sk_core::model::{Color, GeometryPatch, PathCmd, Point, ShapeType, StylePatch};
use sk_core::state::StateEngine;

fn populated_engine() -> StateEngine {
    let mut engine = StateEngine::new();

    let creates = vec![
        (ShapeType::Rect, ShapeInit::default()),
        (ShapeType::Circle, ShapeInit::default()),
        (ShapeType::Ellipse, ShapeInit::default()),
        (ShapeType::Triangle, ShapeInit::default()),
        (
            ShapeType::Polygon,
            ShapeInit {
                sides: Some(6),
                ..Default::default()
            },
        ),
        (
            ShapeType::Line,
            ShapeInit {
                points: Some(vec![
                    Point { x: 0.0, y: 0.0 },
                    Point { x: 80.0, y: 40.0 },
                ]),
                ..Default::default()
            },
        ),
        (
            ShapeType::Arrow,
            ShapeInit {
                points: Some(vec![
                    Point { x: 10.0, y: 10.0 },
                    Point { x: 90.0, y: 10.0 },
                ]),
                ..Default::default()
            },
        ),
        (
            ShapeType::Path,
            ShapeInit {
                commands: Some(vec![
                    PathCmd::MoveTo(0.0, 0.0),
                    PathCmd::CubicTo(10.0, 0.0, 20.0, 10.0, 30.0, 10.0),
                    PathCmd::Close,
                ]),
                ..Default::default()
            },
        ),
        (
            ShapeType::Text,
            ShapeInit {
                content: Some("caption".into()),
                style: StylePatch {
                    fill: Some(Color::rgb(20, 20, 20)),
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
        (
            ShapeType::Image,
            ShapeInit {
                src: Some("assets/logo.png".into()),
                ..Default::default()
            },
        ),
    ];

    let mut ids = Vec::new();
    for (shape_type, properties) in creates {
        let outcome = engine
            .apply_intent(Intent::ShapeCreate {
                shape_type,
                properties,
            })
            .unwrap();
        ids.push(outcome.shape_id().unwrap());
    }

    engine
        .apply_intent(Intent::LayerGroup {
            shape_ids: vec![ids[0], ids[1]],
            group_id: None,
        })
        .unwrap();
    engine
        .apply_intent(Intent::SelectionSet {
            ids: vec![ids[2], ids[3]],
        })
        .unwrap();
    engine
        .apply_intent(Intent::ToolActivate {
            tool: "pen".into(),
            config: serde_json::json!({ "smoothing": 0.5, "pressure": true }),
        })
        .unwrap();
    engine
        .apply_intent(Intent::CanvasZoom {
            scale: 1.5,
            point: Some(Point { x: 200.0, y: 100.0 }),
        })
        .unwrap();
    engine
        .apply_intent(Intent::CanvasResize {
            width: 1920.0,
            height: 1080.0,
        })
        .unwrap();
    engine
        .apply_intent(Intent::ShapeTransform {
            shape_id: ids[4],
            geometry: GeometryPatch {
                angle: Some(30.0),
                ..Default::default()
            },
        })
        .unwrap();

    engine
}

#[test]
fn json_roundtrip_is_deep_equal() {
    let engine = populated_engine();
    let json = engine.export_state().unwrap();

    let mut restored = StateEngine::new();
    restored.import_state(&json).unwrap();
    assert_eq!(restored.doc(), engine.doc());
}

#[test]
fn msgpack_roundtrip_is_deep_equal() {
    let engine = populated_engine();
    let bytes = engine.export_bytes().unwrap();

    let mut restored = StateEngine::new();
    restored.import_bytes(&bytes).unwrap();
    assert_eq!(restored.doc(), engine.doc());
}

#[test]
fn double_roundtrip_is_stable() {
    let engine = populated_engine();
    let first = engine.export_state().unwrap();

    let mut restored = StateEngine::new();
    restored.import_state(&first).unwrap();
    let second = restored.export_state().unwrap();
    assert_eq!(first, second);
}

#[test]
fn slices_resolve_into_imported_document() {
    let engine = populated_engine();
    let json = engine.export_state().unwrap();
    let mut restored = StateEngine::new();
    restored.import_state(&json).unwrap();

    assert_eq!(
        restored.state_slice("/canvas/width"),
        Some(serde_json::json!(1920.0))
    );
    assert_eq!(
        restored.state_slice("/canvas/transform/scale"),
        Some(serde_json::json!(1.5))
    );
    assert_eq!(
        restored.state_slice("/active_tool/tool"),
        Some(serde_json::json!("pen"))
    );
    assert_eq!(restored.state_slice("/shapes/absent/geometry"), None);
}
