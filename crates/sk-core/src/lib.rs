pub mod error;
pub mod event;
pub mod id;
pub mod intent;
pub mod model;
pub mod state;
pub mod validate;

pub use error::EngineError;
pub use event::{Listener, StateEvent};
pub use id::{ShapeId, deterministic_id, generate, init_session, now_millis};
pub use intent::{Intent, ShapeInit, ShapePatch};
pub use model::*;
pub use state::{ApplyOutcome, StateEngine, replay};
pub use validate::{ValidateError, validate_intent, validate_shape, validate_state};
