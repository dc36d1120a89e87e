use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// One-shot latch: waiters park until [`fire`](CompletionGate::fire) is called,
/// and registered hooks run exactly once. Firing again is a no-op.
pub struct CompletionGate {
    fired: watch::Sender<bool>,
    hooks: Mutex<Vec<Hook>>,
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionGate {
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            fired,
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.borrow()
    }

    /// Release all waiters and run pending hooks. Returns `false` if the gate had
    /// already fired.
    pub fn fire(&self) -> bool {
        let hooks = {
            let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
            let first = self.fired.send_if_modified(|fired| {
                if *fired {
                    false
                } else {
                    *fired = true;
                    true
                }
            });
            if !first {
                return false;
            }
            std::mem::take(&mut *hooks)
        };
        for hook in hooks {
            hook();
        }
        true
    }

    pub async fn wait(&self) {
        let mut rx = self.fired.subscribe();
        // The sender lives as long as `self`, so this only returns once fired.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Run `hook` when the gate fires, or right away if it already has.
    pub fn on_fire(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.is_fired() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }
}
