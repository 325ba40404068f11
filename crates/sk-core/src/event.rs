//! Change events emitted by the state engine.
//!
//! Events fire synchronously, strictly in application order. A committed
//! batch emits exactly one `BatchCommitted` after all member intents have
//! applied, so no partially-applied state is ever observable. Every event
//! hands observers owned snapshots, never references into the engine.

use crate::intent::Intent;
use crate::model::DocumentState;
use serde::{Deserialize, Serialize};

/// A state change notification.
///
/// `before` is the tree as it stood when the mutation started (the same
/// snapshot the engine keeps for rollback); `after` is the committed
/// result. Observers that synthesize inverse intents read `before`, so the
/// restore-to values are captured at forward-apply time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEvent {
    /// A single intent was applied outside a batch.
    Changed {
        intent: Intent,
        before: Box<DocumentState>,
        after: Box<DocumentState>,
        timestamp: u64,
    },
    /// A batch committed; `intents` lists its members in application order.
    BatchCommitted {
        intents: Vec<Intent>,
        before: Box<DocumentState>,
        after: Box<DocumentState>,
        timestamp: u64,
    },
    /// A document was loaded via `import_state`.
    Imported {
        state: Box<DocumentState>,
        timestamp: u64,
    },
    /// The engine was reset to a fresh empty tree.
    Reset { timestamp: u64 },
}

impl StateEvent {
    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            StateEvent::Changed { .. } => "state.changed",
            StateEvent::BatchCommitted { .. } => "state.batch",
            StateEvent::Imported { .. } => "state.import",
            StateEvent::Reset { .. } => "state.reset",
        }
    }
}

/// Synchronous event observer. Registered via `StateEngine::subscribe`.
pub type Listener = Box<dyn FnMut(&StateEvent)>;
