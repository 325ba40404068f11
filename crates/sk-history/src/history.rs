//! Undo/redo engine.
//!
//! The history records intents, never state snapshots: each entry pairs
//! the forward intent(s) with inverse intent(s) synthesized at record time
//! from the change event's pre-mutation snapshot. Undo applies the stored
//! inverses (batches in reverse order, as one atomic group); redo reapplies
//! the originals verbatim.
//!
//! The engine instance is injected explicitly: `attach` registers the
//! recording listener on a `StateEngine` the host owns. While an undo or
//! redo is applying, the scoped re-entrancy guard makes the listener drop
//! incoming events, so replays never re-enter the history.

use crate::inverse::invert;
use sk_core::event::StateEvent;
use sk_core::intent::Intent;
use sk_core::model::DocumentState;
use sk_core::state::{StateEngine, replay};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Default undo stack capacity.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// One undoable unit: a single intent or an atomically-committed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Single {
        forward: Intent,
        inverse: Intent,
        timestamp: u64,
    },
    Batch {
        /// Recordable members, in application order.
        forwards: Vec<Intent>,
        /// Matching inverses, already reversed (last applied undone first).
        inverses: Vec<Intent>,
        timestamp: u64,
    },
}

impl HistoryEntry {
    pub fn timestamp(&self) -> u64 {
        match self {
            HistoryEntry::Single { timestamp, .. } | HistoryEntry::Batch { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

/// Structured result of `undo`/`redo`. An empty stack is not an error, and
/// a failing inverse is reported rather than propagated; a failed undo
/// must not destabilize the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Done,
    Nothing(&'static str),
    Failed(String),
}

impl HistoryOutcome {
    pub fn success(&self) -> bool {
        matches!(self, HistoryOutcome::Done)
    }
}

/// Transient viewport/UI intents are never recorded.
fn recordable(intent: &Intent) -> bool {
    !matches!(
        intent,
        Intent::SelectionSet { .. }
            | Intent::SelectionAdd { .. }
            | Intent::SelectionRemove { .. }
            | Intent::SelectionClear
            | Intent::CanvasPan { .. }
            | Intent::CanvasZoom { .. }
            | Intent::ToolActivate { .. }
            | Intent::ToolDeactivate
    )
}

struct HistoryState {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max_depth: usize,
}

impl HistoryState {
    /// Push a new entry: evict the oldest past capacity, clear redo.
    fn push(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        if self.undo.len() > self.max_depth {
            self.undo.remove(0);
        }
        self.redo.clear();
    }

    fn record_event(&mut self, event: &StateEvent) {
        match event {
            StateEvent::Changed {
                intent,
                before,
                timestamp,
                ..
            } => {
                if !recordable(intent) {
                    return;
                }
                match invert(before, intent) {
                    Ok(inverse) => self.push(HistoryEntry::Single {
                        forward: intent.clone(),
                        inverse,
                        timestamp: *timestamp,
                    }),
                    Err(err) => {
                        log::warn!("not recording `{}`: {err}", intent.name());
                    }
                }
            }
            StateEvent::BatchCommitted {
                intents,
                before,
                timestamp,
                ..
            } => match synthesize_batch(before, intents) {
                Ok((forwards, inverses)) => {
                    if !forwards.is_empty() {
                        self.push(HistoryEntry::Batch {
                            forwards,
                            inverses,
                            timestamp: *timestamp,
                        });
                    }
                }
                Err(reason) => log::warn!("not recording batch: {reason}"),
            },
            // A loaded or reset document has no meaningful prior intent to
            // invert; both wipe the history.
            StateEvent::Imported { .. } | StateEvent::Reset { .. } => {
                self.undo.clear();
                self.redo.clear();
            }
        }
    }
}

/// Replay the committed batch over a scratch copy of its pre-state,
/// capturing each recordable member's inverse just before that member
/// applies. Returns the recordable forwards in application order and the
/// inverses in reverse order.
fn synthesize_batch(
    before: &DocumentState,
    intents: &[Intent],
) -> Result<(Vec<Intent>, Vec<Intent>), String> {
    let mut scratch = before.clone();
    let mut forwards = Vec::new();
    let mut inverses = Vec::new();
    for intent in intents {
        if recordable(intent) {
            let inverse = invert(&scratch, intent).map_err(|e| e.to_string())?;
            forwards.push(intent.clone());
            inverses.push(inverse);
        }
        replay(&mut scratch, intent).map_err(|e| e.to_string())?;
    }
    inverses.reverse();
    Ok((forwards, inverses))
}

/// Scoped re-entrancy guard: held for the duration of an undo/redo apply,
/// released on every exit path.
struct RestoreGuard<'a>(&'a Cell<bool>);

impl<'a> RestoreGuard<'a> {
    fn hold(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        RestoreGuard(flag)
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Records undoable intents from a state engine's change stream and drives
/// undo/redo against it.
pub struct HistoryEngine {
    state: Rc<RefCell<HistoryState>>,
    restoring: Rc<Cell<bool>>,
}

impl HistoryEngine {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(HistoryState {
                undo: Vec::new(),
                redo: Vec::new(),
                max_depth,
            })),
            restoring: Rc::new(Cell::new(false)),
        }
    }

    /// Register the recording listener on `engine`. The engine stays owned
    /// by the host; the history only observes its change stream.
    pub fn attach(&self, engine: &mut StateEngine) {
        let state = Rc::clone(&self.state);
        let restoring = Rc::clone(&self.restoring);
        engine.subscribe(Box::new(move |event| {
            if restoring.get() {
                return;
            }
            state.borrow_mut().record_event(event);
        }));
    }

    /// Undo the most recent entry. Batch inverses apply in reverse order as
    /// one atomic group.
    pub fn undo(&self, engine: &mut StateEngine) -> HistoryOutcome {
        let Some(entry) = self.state.borrow_mut().undo.pop() else {
            return HistoryOutcome::Nothing("Nothing to undo");
        };
        let _guard = RestoreGuard::hold(&self.restoring);
        let applied = match &entry {
            HistoryEntry::Single { inverse, .. } => {
                engine.apply_intent(inverse.clone()).map(|_| ())
            }
            HistoryEntry::Batch { inverses, .. } => {
                engine.apply_intents(inverses.clone()).map(|_| ())
            }
        };
        match applied {
            Ok(()) => {
                self.state.borrow_mut().redo.push(entry);
                HistoryOutcome::Done
            }
            Err(err) => {
                log::warn!("undo failed: {err}");
                HistoryOutcome::Failed(err.to_string())
            }
        }
    }

    /// Redo the most recently undone entry, reapplying the original
    /// forward intent(s) verbatim in original order.
    pub fn redo(&self, engine: &mut StateEngine) -> HistoryOutcome {
        let Some(entry) = self.state.borrow_mut().redo.pop() else {
            return HistoryOutcome::Nothing("Nothing to redo");
        };
        let _guard = RestoreGuard::hold(&self.restoring);
        let applied = match &entry {
            HistoryEntry::Single { forward, .. } => {
                engine.apply_intent(forward.clone()).map(|_| ())
            }
            HistoryEntry::Batch { forwards, .. } => {
                engine.apply_intents(forwards.clone()).map(|_| ())
            }
        };
        match applied {
            Ok(()) => {
                self.state.borrow_mut().undo.push(entry);
                HistoryOutcome::Done
            }
            Err(err) => {
                log::warn!("redo failed: {err}");
                HistoryOutcome::Failed(err.to_string())
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.state.borrow().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.borrow().redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.state.borrow().undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.state.borrow().redo.len()
    }

    /// Empty both stacks (document load/reset).
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.undo.clear();
        state.redo.clear();
    }
}

impl Default for HistoryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_core::intent::ShapeInit;
    use sk_core::model::{GeometryPatch, ShapeType};

    fn wired() -> (StateEngine, HistoryEngine) {
        let mut engine = StateEngine::new();
        let history = HistoryEngine::default();
        history.attach(&mut engine);
        (engine, history)
    }

    fn create_rect(engine: &mut StateEngine) -> sk_core::ShapeId {
        engine
            .apply_intent(Intent::ShapeCreate {
                shape_type: ShapeType::Rect,
                properties: ShapeInit::default(),
            })
            .unwrap()
            .shape_id()
            .unwrap()
    }

    #[test]
    fn transient_intents_are_not_recorded() {
        let (mut engine, history) = wired();
        let id = create_rect(&mut engine);
        assert_eq!(history.undo_depth(), 1);

        engine
            .apply_intent(Intent::SelectionSet { ids: vec![id] })
            .unwrap();
        engine
            .apply_intent(Intent::CanvasPan { dx: 5.0, dy: 5.0 })
            .unwrap();
        engine
            .apply_intent(Intent::CanvasZoom {
                scale: 2.0,
                point: None,
            })
            .unwrap();
        engine
            .apply_intent(Intent::ToolActivate {
                tool: "select".into(),
                config: serde_json::Value::Null,
            })
            .unwrap();
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn resize_is_recorded_and_undone() {
        let (mut engine, history) = wired();
        engine
            .apply_intent(Intent::CanvasResize {
                width: 640.0,
                height: 480.0,
            })
            .unwrap();
        assert_eq!(history.undo_depth(), 1);

        assert!(history.undo(&mut engine).success());
        assert_eq!(engine.doc().canvas.width, 1280.0);
        assert_eq!(engine.doc().canvas.height, 720.0);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut engine = StateEngine::new();
        let history = HistoryEngine::new(3);
        history.attach(&mut engine);

        for _ in 0..5 {
            create_rect(&mut engine);
        }
        assert_eq!(history.undo_depth(), 3);

        let mut undone = 0;
        while history.undo(&mut engine).success() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        // The two oldest creates survive the undos.
        assert_eq!(engine.doc().shapes.len(), 2);
    }

    #[test]
    fn new_entry_clears_redo() {
        let (mut engine, history) = wired();
        create_rect(&mut engine);
        history.undo(&mut engine);
        assert!(history.can_redo());

        create_rect(&mut engine);
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_stacks_report_nothing() {
        let (mut engine, history) = wired();
        assert_eq!(
            history.undo(&mut engine),
            HistoryOutcome::Nothing("Nothing to undo")
        );
        assert_eq!(
            history.redo(&mut engine),
            HistoryOutcome::Nothing("Nothing to redo")
        );
    }

    #[test]
    fn import_and_reset_wipe_history() {
        let (mut engine, history) = wired();
        create_rect(&mut engine);
        assert!(history.can_undo());

        let json = engine.export_state().unwrap();
        engine.import_state(&json).unwrap();
        assert!(!history.can_undo());

        create_rect(&mut engine);
        assert!(history.can_undo());
        engine.reset();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn failed_undo_is_reported_not_propagated() {
        let (mut engine, history) = wired();
        let before = engine.snapshot();

        // Hand-craft an entry whose inverse targets a nonexistent shape.
        let ghost = sk_core::ShapeId::intern("ghost");
        history.state.borrow_mut().undo.push(HistoryEntry::Single {
            forward: Intent::ShapeDelete { shape_id: ghost },
            inverse: Intent::ShapeDelete { shape_id: ghost },
            timestamp: 0,
        });

        let outcome = history.undo(&mut engine);
        assert!(matches!(outcome, HistoryOutcome::Failed(_)));
        // Tree untouched by the failed inverse.
        assert_eq!(engine.doc(), &before);

        // Guard released on the failure path: new mutations still record.
        create_rect(&mut engine);
        assert!(history.can_undo());
    }

    #[test]
    fn batch_is_one_undo_unit() {
        let (mut engine, history) = wired();
        let id = create_rect(&mut engine);
        assert_eq!(history.undo_depth(), 1);

        engine
            .apply_intents(vec![
                Intent::ShapeTransform {
                    shape_id: id,
                    geometry: GeometryPatch {
                        left: Some(10.0),
                        ..Default::default()
                    },
                },
                Intent::ShapeTransform {
                    shape_id: id,
                    geometry: GeometryPatch {
                        left: Some(20.0),
                        ..Default::default()
                    },
                },
            ])
            .unwrap();
        assert_eq!(history.undo_depth(), 2);

        assert!(history.undo(&mut engine).success());
        assert_eq!(engine.doc().shape(id).unwrap().geometry.left, 0.0);
    }

    #[test]
    fn batch_of_only_transient_intents_is_skipped() {
        let (mut engine, history) = wired();
        let id = create_rect(&mut engine);
        engine
            .apply_intents(vec![
                Intent::SelectionSet { ids: vec![id] },
                Intent::CanvasPan { dx: 3.0, dy: 3.0 },
            ])
            .unwrap();
        assert_eq!(history.undo_depth(), 1); // only the create
    }

    #[test]
    fn replays_do_not_re_enter_history() {
        let (mut engine, history) = wired();
        create_rect(&mut engine);
        assert_eq!(history.undo_depth(), 1);

        history.undo(&mut engine);
        // The delete replay emitted a change event; it must not have been
        // recorded as a fresh entry.
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 1);

        history.redo(&mut engine);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn clear_empties_both_stacks() {
        let (mut engine, history) = wired();
        create_rect(&mut engine);
        history.undo(&mut engine);
        create_rect(&mut engine);
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
