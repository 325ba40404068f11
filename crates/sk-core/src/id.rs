use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global string interner for shape IDs — fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for shapes in the document.
/// Internally a `Spur` index — 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(Spur);

impl ShapeId {
    /// Intern a new string as a ShapeId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        ShapeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ShapeId::intern(&s))
    }
}

// ─── Session-scoped generation ───────────────────────────────────────────

static SESSION: Mutex<Option<String>> = Mutex::new(None);
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Start a new id session: derives a session tag from the wall clock and
/// resets the generation counter. Runs implicitly on the first `generate`
/// call if never invoked.
pub fn init_session() -> String {
    let tag = to_base36(now_millis());
    let mut session = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    *session = Some(tag.clone());
    COUNTER.store(0, Ordering::Relaxed);
    tag
}

fn session_tag() -> String {
    let mut session = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    match &*session {
        Some(tag) => tag.clone(),
        None => {
            let tag = to_base36(now_millis());
            *session = Some(tag.clone());
            tag
        }
    }
}

/// Generate a unique id with a type prefix: `{prefix}_{session}_{n}`.
/// The counter is monotonically increasing and never reused in-process.
pub fn generate(prefix: &str) -> ShapeId {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    ShapeId::intern(&format!("{prefix}_{}_{n}", session_tag()))
}

/// Derive an id from content: `{prefix}_{hash36}_{ts36}`, where `hash36`
/// is a base-36 rendering of a 32-bit rolling hash of `content`. Two calls
/// with the same content share the hash segment. Never fails.
pub fn deterministic_id(content: &str, prefix: &str) -> ShapeId {
    let mut hash: u32 = 0;
    for byte in content.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    let ts = to_base36(now_millis());
    ShapeId::intern(&format!("{prefix}_{}_{ts}", to_base36(u64::from(hash))))
}

/// Milliseconds since the Unix epoch (0 on pre-epoch clocks).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    // Buffer only contains ASCII digits from the table above.
    String::from_utf8(buf).unwrap_or_default()
}
