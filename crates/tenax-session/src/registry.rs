//! Live-handle registry scoped to the current connection generation

use std::collections::HashSet;
use std::fmt;

use parking_lot::Mutex;

/// Identifier of a server-side handle, stamped with the connection
/// generation that created it. A handle is only ever valid within its own
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    generation: u64,
    seq: u64,
}

impl HandleId {
    /// The connection generation this handle was created under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}.{}", self.generation, self.seq)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    generation: u64,
    next_seq: u64,
    statements: HashSet<HandleId>,
    result_sets: HashSet<HandleId>,
}

impl RegistryState {
    fn issue(&mut self) -> HandleId {
        self.next_seq += 1;
        HandleId {
            generation: self.generation,
            seq: self.next_seq,
        }
    }
}

/// Tracks the statement and result-set handles owned by the live
/// connection. Any handle not present here is stale: it belongs to a
/// connection that no longer exists and must not be operated on.
///
/// Membership requires both the id to be registered and its generation to
/// be the live one, so a handle can never leak across a reconnect even if
/// sequence numbers were ever to collide.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    inner: Mutex<RegistryState>,
}

impl HandleRegistry {
    /// Create an empty registry at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live connection generation.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Issue and register a statement handle in the live generation.
    pub fn register_statement(&self) -> HandleId {
        let mut state = self.inner.lock();
        let id = state.issue();
        state.statements.insert(id);
        id
    }

    /// Issue and register a result-set handle in the live generation.
    pub fn register_result_set(&self) -> HandleId {
        let mut state = self.inner.lock();
        let id = state.issue();
        state.result_sets.insert(id);
        id
    }

    /// Remove a statement handle. Returns false if it was not registered.
    pub fn unregister_statement(&self, id: HandleId) -> bool {
        self.inner.lock().statements.remove(&id)
    }

    /// Remove a result-set handle. Returns false if it was not registered.
    pub fn unregister_result_set(&self, id: HandleId) -> bool {
        self.inner.lock().result_sets.remove(&id)
    }

    /// Whether the statement handle is live.
    pub fn contains_statement(&self, id: HandleId) -> bool {
        let state = self.inner.lock();
        id.generation == state.generation && state.statements.contains(&id)
    }

    /// Whether the result-set handle is live.
    pub fn contains_result_set(&self, id: HandleId) -> bool {
        let state = self.inner.lock();
        id.generation == state.generation && state.result_sets.contains(&id)
    }

    /// Advance the connection generation, invalidating every handle issued
    /// so far. Returns the new generation.
    pub fn invalidate_all(&self) -> u64 {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.statements.clear();
        state.result_sets.clear();
        state.generation
    }

    /// Number of live statement handles.
    pub fn live_statements(&self) -> usize {
        self.inner.lock().statements.len()
    }

    /// Number of live result-set handles.
    pub fn live_result_sets(&self) -> usize {
        self.inner.lock().result_sets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_contains_unregister() {
        let registry = HandleRegistry::new();
        let stmt = registry.register_statement();
        let rs = registry.register_result_set();

        assert!(registry.contains_statement(stmt));
        assert!(registry.contains_result_set(rs));
        assert!(!registry.contains_statement(rs));
        assert_eq!(registry.live_statements(), 1);

        assert!(registry.unregister_statement(stmt));
        assert!(!registry.contains_statement(stmt));
        assert_eq!(registry.live_statements(), 0);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = HandleRegistry::new();
        let stmt = registry.register_statement();
        assert!(registry.unregister_statement(stmt));
        assert!(!registry.unregister_statement(stmt));
    }

    #[test]
    fn invalidate_clears_everything_and_bumps_generation() {
        let registry = HandleRegistry::new();
        let stmt = registry.register_statement();
        let rs = registry.register_result_set();
        assert_eq!(registry.generation(), 0);

        let generation = registry.invalidate_all();

        assert_eq!(generation, 1);
        assert!(!registry.contains_statement(stmt));
        assert!(!registry.contains_result_set(rs));
        assert_eq!(registry.live_statements(), 0);
        assert_eq!(registry.live_result_sets(), 0);
    }

    #[test]
    fn stale_generation_never_matches() {
        let registry = HandleRegistry::new();
        let old = registry.register_statement();
        registry.invalidate_all();

        // Issue new handles in the fresh generation; the old id must stay
        // stale regardless of what the new generation registers.
        let fresh = registry.register_statement();
        assert!(registry.contains_statement(fresh));
        assert!(!registry.contains_statement(old));
        assert_ne!(old.generation(), fresh.generation());
    }
}
