//! Typed handle to one configuration.
//!
//! A [`ConfigurationProvider<T>`] is what a module keeps around instead of
//! the whole service. Every call delegates to the [`ConfigurationService`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use modcfg_core::ConfigurationId;
use modcfg_schema::ErrorMap;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::configuration::{ActionResult, Configuration};
use crate::error::EngineError;
use crate::events::ConfigurationEvent;
use crate::registry::ConfigurationInfo;
use crate::service::ConfigurationService;

pub struct ConfigurationProvider<T> {
    service: Arc<ConfigurationService>,
    id: ConfigurationId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ConfigurationProvider<T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ConfigurationProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationProvider")
            .field("type", &std::any::type_name::<T>())
            .field("id", &self.id)
            .finish()
    }
}

impl<T: Configuration> ConfigurationProvider<T> {
    /// A provider for `T`, which must already be registered.
    pub fn new(service: Arc<ConfigurationService>) -> Result<Self, EngineError> {
        let id = service.configuration_info_of::<T>()?.id;
        Ok(Self {
            service,
            id,
            _marker: PhantomData,
        })
    }

    /// Registration data. Re-read on every call, since attaching the host
    /// module changes the host configuration's id.
    pub fn info(&self) -> Result<ConfigurationInfo, EngineError> {
        self.service.configuration_info_of::<T>()
    }

    pub fn new_instance(&self) -> Result<T, EngineError> {
        self.service.new_instance::<T>()
    }

    pub fn load(&self) -> Result<Arc<T>, EngineError> {
        self.service.load::<T>()
    }

    pub fn load_copy(&self) -> Result<T, EngineError> {
        self.service.load_copy::<T>()
    }

    pub fn save(&self, config: &T) -> Result<bool, EngineError> {
        self.service.save(config)
    }

    pub fn validate(&self, config: &T) -> Result<ErrorMap, EngineError> {
        self.service.validate(config)
    }

    pub fn perform_action(
        &self,
        config: &mut T,
        path: &str,
        action: &str,
    ) -> Result<ActionResult, EngineError> {
        self.service.perform_action(config, path, action)
    }

    /// Saved events of this configuration only.
    pub fn subscribe(&self) -> Result<SavedEvents, EngineError> {
        let id = self.info()?.id;
        Ok(SavedEvents {
            id,
            receiver: self.service.subscribe(),
        })
    }
}

/// A receiver of one configuration's `Saved` events.
#[derive(Debug)]
pub struct SavedEvents {
    id: ConfigurationId,
    receiver: broadcast::Receiver<ConfigurationEvent>,
}

impl SavedEvents {
    fn matches(&self, event: &ConfigurationEvent) -> bool {
        matches!(event, ConfigurationEvent::Saved { id, .. } if *id == self.id)
    }

    /// The next buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<ConfigurationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(id = %self.id, skipped, "configuration event receiver lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event. `None` once the service is gone.
    pub async fn recv(&mut self) -> Option<ConfigurationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(id = %self.id, skipped, "configuration event receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
