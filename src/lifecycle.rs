use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

type Hook = Box<dyn FnOnce() + Send>;

/// Cleanup shared by every way playback can end.
///
/// Hooks run once, in reverse registration order, on the first call to
/// [`Lifecycle::teardown`]; later calls do nothing.
#[derive(Default)]
pub struct Lifecycle {
    torn_down: AtomicBool,
    hooks: Mutex<Vec<(&'static str, Hook)>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register cleanup to run at teardown. Registering after teardown runs
    /// the hook immediately.
    pub fn on_teardown(&self, name: &'static str, hook: impl FnOnce() + Send + 'static) {
        let mut hooks = self.hooks.lock();
        if self.is_torn_down() {
            drop(hooks);
            debug!("Running late teardown hook: {}", name);
            hook();
            return;
        }
        hooks.push((name, Box::new(hook)));
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Run all hooks. Returns `false` when teardown already happened.
    pub fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        let hooks = std::mem::take(&mut *self.hooks.lock());
        for (name, hook) in hooks.into_iter().rev() {
            debug!("Teardown: {}", name);
            hook();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn hooks_run_once_in_reverse() {
        let lifecycle = Lifecycle::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["terminal", "audio", "temp file"] {
            let log = log.clone();
            lifecycle.on_teardown(name, move || log.lock().push(name));
        }

        assert!(lifecycle.teardown());
        assert!(!lifecycle.teardown());
        assert_eq!(*log.lock(), vec!["temp file", "audio", "terminal"]);
    }

    #[test]
    fn late_hook_runs_immediately() {
        let lifecycle = Lifecycle::new();
        lifecycle.teardown();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        lifecycle.on_teardown("late", move || flag.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrent_teardown_runs_hooks_once() {
        let lifecycle = Arc::new(Lifecycle::new());
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        lifecycle.on_teardown("count", move || *c.lock() += 1);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                std::thread::spawn(move || lifecycle.teardown())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(*count.lock(), 1);
    }
}
