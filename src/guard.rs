use crate::error::GuardRejection;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const MAX_CLAIM_CHARS: usize = 500;
pub const MIN_CLAIM_CHARS: usize = 10;

#[derive(Clone, Copy, Debug)]
pub struct GuardLimits {
    pub max_checks_per_session: u32,
    pub min_interval: Duration,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_checks_per_session: 10,
            min_interval: Duration::from_secs(30),
        }
    }
}

impl GuardLimits {
    fn permit(&self, usage: &Usage, now: Instant) -> Result<(), GuardRejection> {
        if usage.checks >= self.max_checks_per_session {
            return Err(GuardRejection::SessionLimit {
                limit: self.max_checks_per_session,
            });
        }
        if let Some(last) = usage.last_check {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                let wait_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                return Err(GuardRejection::Cooldown { wait_secs });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Usage {
    checks: u32,
    last_check: Option<Instant>,
}

/// A slot taken by [`SessionGuard::admit`].
#[derive(Debug)]
#[must_use]
pub struct Reservation {
    session: String,
    at: Instant,
    previous: Option<Instant>,
}

/// Per-session usage limits.
pub struct SessionGuard {
    limits: GuardLimits,
    sessions: Mutex<HashMap<String, Usage>>,
}

impl SessionGuard {
    pub fn new(limits: GuardLimits) -> Self {
        Self {
            limits,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `session` could start a check now. Reserves nothing.
    pub fn check(&self, session: &str) -> Result<(), GuardRejection> {
        self.check_at(session, Instant::now())
    }

    pub fn check_at(&self, session: &str, now: Instant) -> Result<(), GuardRejection> {
        match self.sessions().get(session) {
            Some(usage) => self.limits.permit(usage, now),
            None => Ok(()),
        }
    }

    /// Checks the limits and claims a slot for `session` under one lock.
    /// The slot stays taken unless handed back with [`SessionGuard::release`].
    pub fn admit(&self, session: &str) -> Result<Reservation, GuardRejection> {
        self.admit_at(session, Instant::now())
    }

    pub fn admit_at(&self, session: &str, now: Instant) -> Result<Reservation, GuardRejection> {
        let mut sessions = self.sessions();
        let usage = sessions.entry(session.to_string()).or_default();
        self.limits.permit(usage, now)?;
        let previous = usage.last_check.replace(now);
        usage.checks += 1;
        info!(
            session,
            checks = usage.checks,
            limit = self.limits.max_checks_per_session,
            "check admitted"
        );
        Ok(Reservation {
            session: session.to_string(),
            at: now,
            previous,
        })
    }

    /// Keeps the slot for a check that completed.
    pub fn commit(&self, reservation: Reservation) {
        debug!(session = %reservation.session, "check slot kept");
    }

    /// Gives back a slot whose check did not complete.
    pub fn release(&self, reservation: Reservation) {
        let mut sessions = self.sessions();
        let Some(usage) = sessions.get_mut(&reservation.session) else {
            return;
        };
        usage.checks = usage.checks.saturating_sub(1);
        if usage.last_check == Some(reservation.at) {
            usage.last_check = reservation.previous;
        }
        info!(session = %reservation.session, checks = usage.checks, "check slot released");
    }

    pub fn reset(&self, session: &str) {
        self.sessions().remove(session);
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Usage>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the trimmed claim if its length is acceptable.
pub fn validate_claim(claim: &str) -> Result<&str, GuardRejection> {
    let trimmed = claim.trim();
    let len = trimmed.chars().count();
    if len > MAX_CLAIM_CHARS {
        return Err(GuardRejection::ClaimTooLong {
            len,
            max: MAX_CLAIM_CHARS,
        });
    }
    if len < MIN_CLAIM_CHARS {
        return Err(GuardRejection::ClaimTooShort);
    }
    Ok(trimmed)
}
