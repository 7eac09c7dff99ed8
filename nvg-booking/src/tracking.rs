use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 8;

/// Generates cargo tracking numbers: a fixed prefix followed by eight random
/// upper-case alphanumerics, e.g. `NGV-7QK2M9XA`.
///
/// Uniqueness is enforced by the store; callers retry on collision.
#[derive(Debug, Clone)]
pub struct TrackingNumbers {
    prefix: String,
}

impl TrackingNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut tracking = String::with_capacity(self.prefix.len() + SUFFIX_LEN);
        tracking.push_str(&self.prefix);
        for _ in 0..SUFFIX_LEN {
            tracking.push(CHARSET[rng.gen_range(0..CHARSET.len())] as char);
        }
        tracking
    }

    /// True if `value` has this generator's prefix and a well-formed suffix.
    pub fn matches(&self, value: &str) -> bool {
        match value.strip_prefix(&self.prefix) {
            Some(suffix) => {
                suffix.len() == SUFFIX_LEN && suffix.bytes().all(|b| CHARSET.contains(&b))
            }
            None => false,
        }
    }
}
