//! Typed id wrappers and the push-id generator behind transaction identity.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Typed ID wrappers prevent mixing up action ids, transaction ids, and
/// queue names. These are just strings underneath — the engine doesn't
/// care what an action id looks like, only that it is stable.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(
    ActionId,
    "Stable identifier for an action kind. Throttling and middleware key on it."
);
typed_id!(
    TransactionId,
    "Unique identifier for one transaction — a 20-character push id."
);
typed_id!(QueueName, "Name of a registered operation queue.");

impl TransactionId {
    /// Generate a fresh transaction id from the process-wide push-id
    /// generator.
    pub fn generate() -> Self {
        static GENERATOR: OnceLock<PushIdGenerator> = OnceLock::new();
        Self(GENERATOR.get_or_init(PushIdGenerator::new).generate())
    }
}

/// The 64-character, ASCII-ordered alphabet used by push ids. Byte order
/// equals character order, so ids compare lexicographically as byte strings.
pub const PUSH_ID_ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Number of leading characters derived from the timestamp.
const TIME_CHARS: usize = 8;

/// Number of trailing random characters.
const RANDOM_CHARS: usize = 12;

/// Generates 20-character ascending identifiers: 8 characters encode
/// milliseconds since the epoch in the sort-preserving alphabet, followed
/// by 12 random characters.
///
/// Ids generated in time order compare lexicographically in time order.
/// When two ids fall in the same millisecond the time prefix is reused and
/// the previous random suffix is incremented by one (carry from position 11
/// toward 0), so same-millisecond ids compare in generation order.
///
/// Generation is mutex-protected; the generator is cheap to share.
pub struct PushIdGenerator {
    state: Mutex<GeneratorState>,
}

struct GeneratorState {
    last_millis: u64,
    // Alphabet indices (0..64), not characters.
    last_random: [u8; RANDOM_CHARS],
}

impl PushIdGenerator {
    /// Create a new generator with no history.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                last_millis: 0,
                last_random: [0; RANDOM_CHARS],
            }),
        }
    }

    /// Generate the next id.
    pub fn generate(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut state = self.state.lock().expect("push-id generator lock poisoned");

        // A clock regression reuses the previous prefix so ids stay
        // strictly increasing under serial calls.
        if millis <= state.last_millis {
            increment(&mut state.last_random);
        } else {
            state.last_millis = millis;
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64u8);
            }
        }

        let mut out = [0u8; TIME_CHARS + RANDOM_CHARS];
        let mut t = state.last_millis;
        for i in (0..TIME_CHARS).rev() {
            out[i] = PUSH_ID_ALPHABET[(t % 64) as usize];
            t /= 64;
        }
        for (i, idx) in state.last_random.iter().enumerate() {
            out[TIME_CHARS + i] = PUSH_ID_ALPHABET[*idx as usize];
        }

        out.iter().map(|&b| b as char).collect()
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Increment a suffix interpreted as a base-64 number, least significant
/// digit last, carrying from position 11 toward 0.
fn increment(random: &mut [u8; RANDOM_CHARS]) {
    for slot in random.iter_mut().rev() {
        if *slot == 63 {
            *slot = 0;
        } else {
            *slot += 1;
            return;
        }
    }
}
