use crate::scramble::Direction;
use crate::video::error::KeyParseError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Fixed output cadence; the sink is always written at this rate regardless
/// of the source rate. Deliberate simplification, not a bug.
pub const FRAME_RATE: u32 = 30;

/// Tick period approximating [`FRAME_RATE`] (33 ms ≈ 30 fps).
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// The live scramble key, shared between the control surface (writer) and
/// the tick worker (reader). A plain atomic: no tick can observe a torn
/// update, and an edit applies from the next tick onward.
#[derive(Debug, Clone)]
pub struct SharedKey(Arc<AtomicI64>);

impl SharedKey {
    pub fn new(key: i64) -> Self {
        Self(Arc::new(AtomicI64::new(key)))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, key: i64) {
        self.0.store(key, Ordering::Relaxed);
    }
}

/// Parse operator-entered key text. Whitespace is trimmed; anything that is
/// not a signed 64-bit integer is rejected so the caller can retain the
/// previous valid key.
pub fn parse_key(text: &str) -> Result<i64, KeyParseError> {
    text.trim().parse::<i64>().map_err(|_| KeyParseError {
        text: text.to_string(),
    })
}

/// Everything fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub direction: Direction,
    pub frame_rate: u32,
}

impl RunConfig {
    pub fn new(input: PathBuf, output: PathBuf, direction: Direction) -> Self {
        Self {
            input,
            output,
            direction,
            frame_rate: FRAME_RATE,
        }
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_accepts_integers() {
        assert_eq!(parse_key("42").unwrap(), 42);
        assert_eq!(parse_key("  -7 ").unwrap(), -7);
        assert_eq!(parse_key("9223372036854775807").unwrap(), i64::MAX);
    }

    #[test]
    fn test_parse_key_rejects_garbage() {
        assert!(parse_key("").is_err());
        assert!(parse_key("12.5").is_err());
        assert!(parse_key("abc").is_err());
        assert!(parse_key("9223372036854775808").is_err()); // i64 overflow
    }

    #[test]
    fn test_shared_key_visibility() {
        let key = SharedKey::new(4);
        let clone = key.clone();
        clone.set(99);
        assert_eq!(key.get(), 99);
    }
}
