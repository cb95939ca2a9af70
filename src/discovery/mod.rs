//! Service discovery contract.
//!
//! The registry backend itself lives outside this crate; modules wrapped in a
//! [`Service`](crate::module::Service) talk to it through [`ServiceProvider`].

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Service registry unreachable: {0}")]
    Unreachable(String),
}

/// One service's handle on the discovery registry.
pub trait ServiceProvider: Send + Sync {
    fn service_name(&self) -> &str;

    fn register_service(&self) -> Result<(), DiscoveryError>;

    fn unregister_service(&self) -> Result<(), DiscoveryError>;

    fn is_service_healthy(&self) -> bool;
}

/// In-process provider that only records the registration.
#[derive(Debug)]
pub struct MemoryServiceProvider {
    name: String,
    registered: AtomicBool,
}

impl MemoryServiceProvider {
    /// Create an unregistered provider for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registered: AtomicBool::new(false),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

impl ServiceProvider for MemoryServiceProvider {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn register_service(&self) -> Result<(), DiscoveryError> {
        self.registered.store(true, Ordering::Release);
        tracing::debug!(service = %self.name, "Service registered");
        Ok(())
    }

    fn unregister_service(&self) -> Result<(), DiscoveryError> {
        self.registered.store(false, Ordering::Release);
        tracing::debug!(service = %self.name, "Service unregistered");
        Ok(())
    }

    fn is_service_healthy(&self) -> bool {
        true
    }
}
