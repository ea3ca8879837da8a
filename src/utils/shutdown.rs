use std::sync::{Mutex, PoisonError};

use log::debug;

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Cleanup actions fired on interruption or at the end of a run.
///
/// Hooks run newest first and each runs at most once: `run_all` drains
/// the registry, so a Ctrl+C racing normal completion cannot double-fire.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        debug!("registered shutdown hook '{}'", name);
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, Box::new(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run and forget every registered hook
    pub fn run_all(&self) {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner));
        for (name, hook) in hooks.into_iter().rev() {
            debug!("running shutdown hook '{}'", name);
            hook();
        }
    }
}
