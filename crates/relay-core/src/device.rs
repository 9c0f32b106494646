//! Device context: the configuration record plus the peripherals that
//! command handlers act on.
//!
//! There is exactly one context per process. It is owned by the connection
//! manager and lent to the protocol dispatcher for each request, so the
//! record is only ever mutated from the single scheduler thread.

use crate::config::{ConfigError, ConfigStore, DeviceConfig};
use crate::link::{RelayOutput, StatusDisplay};
use crate::settings::NodeSettings;

pub struct DeviceContext {
    config: DeviceConfig,
    store: Box<dyn ConfigStore>,
    relay: Box<dyn RelayOutput>,
    display: Box<dyn StatusDisplay>,
    relay_on: Option<bool>,
}

impl DeviceContext {
    pub fn new(
        config: DeviceConfig,
        store: Box<dyn ConfigStore>,
        relay: Box<dyn RelayOutput>,
        display: Box<dyn StatusDisplay>,
    ) -> Self {
        Self {
            config,
            store,
            relay,
            display,
            relay_on: None,
        }
    }

    /// Build the context, loading the record from `store` (or taking the
    /// defaults when `use_stored_config` is off).
    pub fn open(
        settings: &NodeSettings,
        mut store: Box<dyn ConfigStore>,
        relay: Box<dyn RelayOutput>,
        display: Box<dyn StatusDisplay>,
    ) -> Result<Self, ConfigError> {
        let defaults = settings.default_config();
        let config = if settings.use_stored_config {
            store.load(&defaults)?
        } else {
            defaults
        };
        Ok(Self::new(config, store, relay, display))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Durably commit `next`, then make it the live record. On error the live
    /// record is left untouched.
    pub fn update_config(&mut self, next: DeviceConfig) -> Result<(), ConfigError> {
        self.store.commit(&next)?;
        self.config = next;
        Ok(())
    }

    pub fn set_relay(&mut self, on: bool) {
        self.relay.set(on);
        self.relay_on = Some(on);
    }

    /// Last state written to the relay, if any.
    pub fn relay_state(&self) -> Option<bool> {
        self.relay_on
    }

    pub fn show(&mut self, text: &str) {
        self.display.show(text);
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("config", &self.config)
            .field("relay_on", &self.relay_on)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryConfigStore, CONFIG_MARKER};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl RelayOutput for Recorder {
        fn set(&mut self, on: bool) {
            self.0.borrow_mut().push(format!("relay:{on}"));
        }
    }

    impl StatusDisplay for Recorder {
        fn show(&mut self, text: &str) {
            self.0.borrow_mut().push(format!("show:{text}"));
        }
    }

    struct FailingStore;

    impl ConfigStore for FailingStore {
        fn read_record(&mut self) -> Result<Option<DeviceConfig>, ConfigError> {
            Ok(Some(DeviceConfig::new("-stored", "stored")))
        }

        fn write_record(&mut self, _config: &DeviceConfig) -> Result<(), ConfigError> {
            Err(ConfigError::WriteError("flash worn out".to_string()))
        }
    }

    fn context_with(store: Box<dyn ConfigStore>, settings: &NodeSettings) -> (DeviceContext, Recorder) {
        let recorder = Recorder::default();
        let ctx = DeviceContext::open(
            settings,
            store,
            Box::new(recorder.clone()),
            Box::new(recorder.clone()),
        )
        .unwrap();
        (ctx, recorder)
    }

    #[test]
    fn test_open_loads_stored_record() {
        let (ctx, _) = context_with(Box::new(FailingStore), &NodeSettings::default());
        assert_eq!(ctx.config().network_pattern, "-stored");
    }

    #[test]
    fn test_open_ignores_store_when_disabled() {
        let settings = NodeSettings {
            use_stored_config: false,
            ..Default::default()
        };
        let (ctx, _) = context_with(Box::new(FailingStore), &settings);
        assert_eq!(ctx.config(), &settings.default_config());
    }

    #[test]
    fn test_failed_commit_keeps_live_record() {
        let (mut ctx, _) = context_with(Box::new(FailingStore), &NodeSettings::default());
        let next = ctx.config().with_password("new").unwrap();

        assert!(ctx.update_config(next).is_err());
        assert_eq!(ctx.config().password, "stored");
    }

    #[test]
    fn test_update_config_commits() {
        let (mut ctx, _) = context_with(Box::new(MemoryConfigStore::new()), &NodeSettings::default());
        let next = ctx.config().with_network_pattern("-5G").unwrap();

        ctx.update_config(next).unwrap();
        assert_eq!(ctx.config().network_pattern, "-5G");
        assert_eq!(ctx.config().marker, CONFIG_MARKER);
    }

    #[test]
    fn test_relay_and_display_are_forwarded() {
        let (mut ctx, recorder) = context_with(Box::new(MemoryConfigStore::new()), &NodeSettings::default());

        ctx.set_relay(true);
        ctx.show("hello");

        assert_eq!(ctx.relay_state(), Some(true));
        assert_eq!(*recorder.0.borrow(), vec!["relay:true", "show:hello"]);
    }
}
