//! Observable key/value configuration, single-threaded.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::Rc,
};

use serde_json::Value;
use shared::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ColourSet,
    LayerMap,
    WebserverIp,
    WebserverPort,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColourSet => "COLOUR_SET",
            Self::LayerMap => "LAYER_MAP",
            Self::WebserverIp => "WEBSERVER_IP",
            Self::WebserverPort => "WEBSERVER_PORT",
        }
    }

    /// Keys whose change invalidates every selection.
    pub fn resets_selection(self) -> bool {
        matches!(self, Self::ColourSet | Self::LayerMap)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ConfigListener = Rc<dyn Fn(ConfigKey, &Value)>;

pub trait ConfigStore {
    fn get(&self, key: ConfigKey) -> Result<Value, ConsoleError>;
    /// Stores `value`, then notifies every subscriber in subscription order.
    fn set(&self, key: ConfigKey, value: Value);
    fn subscribe(&self, listener: ConfigListener);
}

#[derive(Default)]
pub struct MemoryConfigStore {
    values: RefCell<HashMap<ConfigKey, Value>>,
    listeners: RefCell<Vec<ConfigListener>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value without notifying anyone.
    pub fn with_value(self, key: ConfigKey, value: Value) -> Self {
        self.values.borrow_mut().insert(key, value);
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: ConfigKey) -> Result<Value, ConsoleError> {
        self.values
            .borrow()
            .get(&key)
            .cloned()
            .ok_or_else(|| ConsoleError::MissingConfigKey(key.to_string()))
    }

    fn set(&self, key: ConfigKey, value: Value) {
        self.values.borrow_mut().insert(key, value.clone());
        // Listeners may read or subscribe from inside the callback.
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(key, &value);
        }
    }

    fn subscribe(&self, listener: ConfigListener) {
        self.listeners.borrow_mut().push(listener);
    }
}
