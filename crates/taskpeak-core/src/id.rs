//! Strongly-typed identifiers for tasks and stage attempts.
//!
//! Registries are keyed by these; do not pass raw integers across crate boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(TaskId);
new_id!(StageId);
new_id!(StageAttemptId);

/// One attempt of one stage. Immutable; compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct StageKey {
    pub stage_id: StageId,
    pub attempt_id: StageAttemptId,
}

impl StageKey {
    pub const fn new(stage_id: u64, attempt_id: u64) -> Self {
        Self {
            stage_id: StageId::new(stage_id),
            attempt_id: StageAttemptId::new(attempt_id),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage_id.get(), self.attempt_id.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_key_display_and_equality() {
        let a = StageKey::new(3, 1);
        let b = StageKey::new(3, 1);
        assert_eq!(a, b);
        assert_ne!(a, StageKey::new(3, 0));
        assert_eq!(a.to_string(), "3.1");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&TaskId::new(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(TaskId::new(7).to_string(), "TaskId(7)");
    }
}
