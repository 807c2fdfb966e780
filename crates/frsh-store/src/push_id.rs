//! Chronologically sortable child keys.
//!
//! A push id is 20 characters: 8 characters encoding the creation time in
//! milliseconds followed by 12 random characters. Every character comes from
//! an alphabet in ASCII order, so lexicographic order of ids follows creation
//! order. Ids minted within the same millisecond increment the random part
//! instead of drawing a new one.

use parking_lot::Mutex;
use rand::Rng;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of a generated id.
pub const PUSH_ID_LEN: usize = 20;

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = PUSH_ID_LEN - TIME_CHARS;

#[derive(Debug, Default)]
struct State {
    last_millis: i64,
    random: [u8; RANDOM_CHARS],
}

/// Generates push ids. Safe to share between tasks.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an id stamped with the current wall-clock time.
    pub fn next_id(&self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Generate an id stamped with `millis` since the epoch.
    pub fn next_at(&self, millis: i64) -> String {
        let mut state = self.state.lock();

        if millis == state.last_millis {
            increment(&mut state.random);
        } else {
            state.last_millis = millis;
            state.random = random_digits();
        }

        let mut id = String::with_capacity(PUSH_ID_LEN);
        let mut time = millis.max(0) as u64;
        let mut time_chars = [0u8; TIME_CHARS];
        for slot in time_chars.iter_mut().rev() {
            *slot = ALPHABET[(time % 64) as usize];
            time /= 64;
        }
        id.extend(time_chars.iter().map(|&b| b as char));
        id.extend(state.random.iter().map(|&d| ALPHABET[d as usize] as char));
        id
    }
}

/// Twelve uniformly random base-64 digits.
fn random_digits() -> [u8; RANDOM_CHARS] {
    let mut rng = rand::rng();
    let mut digits = [0u8; RANDOM_CHARS];
    for digit in digits.iter_mut() {
        *digit = rng.random_range(0..64);
    }
    digits
}

/// Add one to a big-endian base-64 number, wrapping on overflow.
fn increment(digits: &mut [u8; RANDOM_CHARS]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}
