pub mod logging;

/// Monotonic id source for in-process identifiers.
///
/// Ids are never reused within a generator, so a closed tab's id cannot be
/// confused with a tab opened later.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// Creates a generator whose first id is `start`.
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// Hands out the next id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);

        let mut late = IdGenerator::new(u64::MAX);
        assert_eq!(late.next_id(), u64::MAX);
        assert_eq!(late.next_id(), u64::MAX);
    }
}
