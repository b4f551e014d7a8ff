//! Tracking hooks called around each send.
//!
//! `on_prepare` creates a tracking record and returns its id; `on_update`
//! receives that id with the final [`Status`]. Without a created id the
//! update hook is never called.

use crate::models::{Param, Status};

/// Persistence hooks for sent messages.
#[cfg_attr(test, mockall::automock)]
pub trait Monitor {
    /// Create a record for the message, returning its id.
    fn on_prepare(&self, param: &Param) -> Option<String>;

    /// Store the outcome for a record created by [`Monitor::on_prepare`].
    fn on_update(&self, id: &str, status: &Status, param: &Param);
}

type PrepareFn = Box<dyn Fn(&Param) -> Option<String>>;
type UpdateFn = Box<dyn Fn(&str, &Status, &Param)>;

/// [`Monitor`] built from closures; either hook may be left out.
#[derive(Default)]
pub struct CallbackMonitor {
    prepare: Option<PrepareFn>,
    update: Option<UpdateFn>,
}

impl CallbackMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_prepare(mut self, hook: impl Fn(&Param) -> Option<String> + 'static) -> Self {
        self.prepare = Some(Box::new(hook));
        self
    }

    pub fn on_update(mut self, hook: impl Fn(&str, &Status, &Param) + 'static) -> Self {
        self.update = Some(Box::new(hook));
        self
    }
}

impl Monitor for CallbackMonitor {
    fn on_prepare(&self, param: &Param) -> Option<String> {
        self.prepare.as_ref().and_then(|hook| hook(param))
    }

    fn on_update(&self, id: &str, status: &Status, param: &Param) {
        if let Some(hook) = &self.update {
            hook(id, status, param);
        }
    }
}

/// Optional monitor plus the id of the record for the message in flight.
#[derive(Default)]
pub struct Monitoring {
    monitor: Option<Box<dyn Monitor>>,
    tracking_id: Option<String>,
}

impl Monitoring {
    pub fn set_monitor(&mut self, monitor: impl Monitor + 'static) {
        self.monitor = Some(Box::new(monitor));
    }

    pub fn tracking_id(&self) -> Option<&str> {
        self.tracking_id.as_deref()
    }

    /// Run the create hook, replacing any previous tracking id.
    pub fn create(&mut self, param: &Param) {
        self.tracking_id = self
            .monitor
            .as_ref()
            .and_then(|monitor| monitor.on_prepare(param))
            .filter(|id| !id.is_empty());
        if let Some(id) = &self.tracking_id {
            tracing::debug!(tracking_id = %id, "Monitoring record created");
        }
    }

    /// Run the update hook if a record was created.
    pub fn update(&self, status: &Status, param: &Param) {
        if let (Some(monitor), Some(id)) = (&self.monitor, &self.tracking_id) {
            monitor.on_update(id, status, param);
        }
    }
}

impl std::fmt::Debug for Monitoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitoring")
            .field("monitor", &self.monitor.is_some())
            .field("tracking_id", &self.tracking_id)
            .finish()
    }
}
