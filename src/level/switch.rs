//! The process-wide minimum level.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::level::severity::Severity;

/// Shared mutable holder of the active minimum [`Severity`].
///
/// Readers are the log call sites; the reconciler is the single writer.
/// Every read returns a value that some write fully committed.
#[derive(Debug)]
pub struct LevelSwitch {
    level: AtomicU8,
}

impl LevelSwitch {
    pub fn new(initial: Severity) -> Self {
        Self {
            level: AtomicU8::new(initial as u8),
        }
    }

    /// The most recently committed level.
    pub fn current(&self) -> Severity {
        Severity::from_repr(self.level.load(Ordering::Acquire))
    }

    /// Commit a new level.
    pub fn set(&self, level: Severity) {
        self.level.store(level as u8, Ordering::Release);
    }

    /// Commit a new level and return the one it replaced.
    pub fn replace(&self, level: Severity) -> Severity {
        Severity::from_repr(self.level.swap(level as u8, Ordering::AcqRel))
    }

    /// Whether a record at `candidate` passes the active threshold.
    #[inline]
    pub fn is_enabled(&self, candidate: Severity) -> bool {
        candidate >= self.current()
    }
}

impl Default for LevelSwitch {
    fn default() -> Self {
        Self::new(Severity::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_then_current() {
        let switch = LevelSwitch::default();
        assert_eq!(switch.current(), Severity::Information);

        switch.set(Severity::Error);
        assert_eq!(switch.current(), Severity::Error);

        assert_eq!(switch.replace(Severity::Trace), Severity::Error);
        assert_eq!(switch.current(), Severity::Trace);
    }

    #[test]
    fn test_is_enabled_threshold() {
        let switch = LevelSwitch::new(Severity::Warning);
        assert!(!switch.is_enabled(Severity::Debug));
        assert!(!switch.is_enabled(Severity::Information));
        assert!(switch.is_enabled(Severity::Warning));
        assert!(switch.is_enabled(Severity::Fatal));
    }

    #[test]
    fn test_concurrent_readers_only_see_written_values() {
        let switch = Arc::new(LevelSwitch::new(Severity::Debug));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let switch = switch.clone();
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let seen = switch.current();
                        assert!(seen == Severity::Debug || seen == Severity::Error);
                    }
                })
            })
            .collect();

        for i in 0..10_000 {
            switch.set(if i % 2 == 0 { Severity::Error } else { Severity::Debug });
        }
        switch.set(Severity::Error);
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(switch.current(), Severity::Error);
    }
}
