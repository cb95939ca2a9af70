//! Synchronous event registry.
//!
//! Listeners run on the emitting thread, in the order they were added. The
//! first failing listener stops the emission and its error is returned.

use crate::error::{Result, SwitchyardError};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumString};

/// Events emitted by the application itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CoreEvent {
    /// Modules started, request not yet resolved.
    Init,
    /// Request resolved, payload carries the status.
    PreRequestEnd,
    RequestEnd,
}

pub trait Listener: Send + Sync {
    fn on_emit(&self, payload: Option<&Value>) -> Result<()>;
}

impl<F> Listener for F
where
    F: Fn(Option<&Value>) -> Result<()> + Send + Sync,
{
    fn on_emit(&self, payload: Option<&Value>) -> Result<()> {
        self(payload)
    }
}

/// Event registry
#[derive(Clone, Default)]
pub struct Events {
    listeners: Arc<DashMap<String, Vec<Arc<dyn Listener>>>>,
}

impl Events {
    /// Create an empty event registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener and returns the handle [`Events::unlisten`] expects.
    pub fn listen(
        &self,
        event: impl AsRef<str>,
        listener: impl Listener + 'static,
    ) -> Arc<dyn Listener> {
        let listener: Arc<dyn Listener> = Arc::new(listener);
        self.listen_shared(event, listener.clone());
        listener
    }

    /// Like [`Events::listen`] for an already shared listener.
    pub fn listen_shared(&self, event: impl AsRef<str>, listener: Arc<dyn Listener>) {
        self.listeners
            .entry(event.as_ref().to_string())
            .or_default()
            .push(listener);
    }

    /// Removes a previously added listener. Returns whether it was found.
    pub fn unlisten(&self, event: impl AsRef<str>, listener: &Arc<dyn Listener>) -> bool {
        let Some(mut listeners) = self.listeners.get_mut(event.as_ref()) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Calls every listener of `event` in order.
    pub fn emit(&self, event: impl AsRef<str>, payload: Option<&Value>) -> Result<()> {
        let event = event.as_ref();
        // Snapshot so listeners may (un)listen while being called.
        let listeners = match self.listeners.get(event) {
            Some(listeners) => listeners.clone(),
            None => return Ok(()),
        };

        tracing::debug!(event, listeners = listeners.len(), "Emitting event");
        for listener in listeners {
            listener.on_emit(payload).map_err(|e| match e {
                SwitchyardError::Listener { .. } => e,
                other => SwitchyardError::listener(event, other.to_string()),
            })?;
        }
        Ok(())
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        self.listeners
            .get(event.as_ref())
            .map_or(0, |listeners| listeners.len())
    }
}
