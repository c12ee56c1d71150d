use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Wrong guesses allowed before a code is thrown away
pub const MAX_ATTEMPTS: u32 = 5;

struct IssuedCode {
    code: String,
    issued: Instant,
    failed_attempts: u32,
}

/// Short-lived one-time codes keyed by email (password reset)
#[derive(Clone)]
pub struct VerificationCodeCache {
    codes: Arc<Mutex<HashMap<String, IssuedCode>>>,
    ttl: Duration,
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl VerificationCodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, IssuedCode>> {
        self.codes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issue a fresh 6-digit code for `email`, replacing any earlier one
    pub fn issue(&self, email: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let mut codes = self.lock();
        let now = Instant::now();
        codes.retain(|_, entry| now.duration_since(entry.issued) < self.ttl);
        codes.insert(
            normalize(email),
            IssuedCode {
                code: code.clone(),
                issued: now,
                failed_attempts: 0,
            },
        );
        code
    }

    /// Check `code` for `email`; a matching, unexpired code is removed.
    ///
    /// Every wrong guess counts against the code, which is dropped after
    /// `MAX_ATTEMPTS` of them; a new code has to be requested then.
    pub fn verify_and_consume(&self, email: &str, code: &str) -> bool {
        let key = normalize(email);
        let mut codes = self.lock();
        let Some(entry) = codes.get_mut(&key) else {
            return false;
        };

        if entry.issued.elapsed() >= self.ttl {
            codes.remove(&key);
            return false;
        }
        if entry.code == code.trim() {
            codes.remove(&key);
            return true;
        }

        entry.failed_attempts += 1;
        if entry.failed_attempts >= MAX_ATTEMPTS {
            tracing::warn!("Verification code for {} dropped after {} wrong guesses", key, MAX_ATTEMPTS);
            codes.remove(&key);
        }
        false
    }
}
