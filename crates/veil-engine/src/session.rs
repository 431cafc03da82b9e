//! Guard against concurrent redactions reusing one session id.

use std::collections::HashSet;

use parking_lot::Mutex;
use veil_core::{Error, Result};

#[derive(Debug, Default)]
pub struct SessionGuard {
    active: Mutex<HashSet<String>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a session as in flight until the returned claim is dropped.
    pub fn claim(&self, session_id: &str) -> Result<SessionClaim<'_>> {
        let mut active = self.active.lock();
        if !active.insert(session_id.to_string()) {
            return Err(Error::SessionConflict(session_id.to_string()));
        }
        Ok(SessionClaim {
            guard: self,
            session_id: session_id.to_string(),
        })
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().contains(session_id)
    }
}

/// Releases the session on drop, including when the redaction fails.
pub struct SessionClaim<'a> {
    guard: &'a SessionGuard,
    session_id: String,
}

impl Drop for SessionClaim<'_> {
    fn drop(&mut self) {
        self.guard.active.lock().remove(&self.session_id);
    }
}
