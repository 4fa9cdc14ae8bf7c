use crate::config::{AppConfig, ContextConfig};
use std::sync::Arc;

/// Read access to the context sections of the host configuration.
pub trait ConfigProvider: Send + Sync {
    fn root_context(&self) -> &ContextConfig;

    fn child_context(&self, name: &str) -> Option<&ContextConfig>;

    /// Child names in a stable order.
    fn child_names(&self) -> Vec<&str>;

    /// A top-level section as raw JSON.
    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value>;
}

/// [`ConfigProvider`] over a loaded [`AppConfig`].
pub struct AppConfigProvider(Arc<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }

    pub fn from_arc(config: Arc<AppConfig>) -> Self {
        Self(config)
    }

    pub fn inner(&self) -> &AppConfig {
        &self.0
    }
}

impl ConfigProvider for AppConfigProvider {
    fn root_context(&self) -> &ContextConfig {
        &self.0.context
    }

    fn child_context(&self, name: &str) -> Option<&ContextConfig> {
        self.0.children.get(name)
    }

    fn child_names(&self) -> Vec<&str> {
        self.0.children.keys().map(String::as_str).collect()
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "host" => serde_json::to_value(&self.0.host).ok(),
            "context" => serde_json::to_value(&self.0.context).ok(),
            "children" => serde_json::to_value(&self.0.children).ok(),
            "logging" => self
                .0
                .logging
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok()),
            _ => None,
        }
    }
}
