use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ChatError, Result};

/// Static description of a chat-completion backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProfile {
    /// Key the profile is registered under (e.g. "openai", "mlc")
    pub name: String,
    /// Base URL of the API; `complete` posts to `{base_path}/chat/completions`
    pub base_path: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Full URL used by `send_message`
    pub completion_endpoint: String,
    /// URL probed by the API key check, absent for backends that need no key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_validation_endpoint: Option<String>,
}

impl ServiceProfile {
    /// Creates a profile whose completion endpoint is derived from the base path.
    pub fn new(
        name: impl Into<String>,
        base_path: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self {
            name: name.into(),
            completion_endpoint: format!("{}/chat/completions", base_path),
            base_path,
            model: model.into(),
            key_validation_endpoint: None,
        }
    }

    /// Sets the endpoint used to validate API keys.
    pub fn with_key_validation(mut self, endpoint: impl Into<String>) -> Self {
        self.key_validation_endpoint = Some(endpoint.into());
        self
    }

    /// Returns whether API keys for this backend must be checked remotely.
    pub fn requires_key_validation(&self) -> bool {
        self.key_validation_endpoint.is_some()
    }

    /// The URL `complete` posts to.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_path.trim_end_matches('/'))
    }

    /// The stock OpenAI profile.
    pub fn openai() -> Self {
        Self::new("openai", "https://api.openai.com/v1", "gpt-3.5-turbo")
            .with_key_validation("https://api.openai.com/v1/engines")
    }

    /// The stock profile for a local MLC LLM REST server.
    pub fn mlc() -> Self {
        Self::new("mlc", "http://127.0.0.1:8000/v1", "Llama-2-7b-chat-hf-q4f16_1")
    }
}

/// Lookup table from service name to [`ServiceProfile`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceProfile>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the stock "openai" and "mlc" profiles.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(ServiceProfile::openai());
        registry.insert(ServiceProfile::mlc());
        registry
    }

    /// Parses a JSON array of profiles.
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<ServiceProfile> = serde_json::from_str(json)?;
        if profiles.is_empty() {
            return Err(ChatError::Config(
                "service registry must contain at least one profile".to_string(),
            ));
        }

        let mut registry = Self::new();
        for profile in profiles {
            registry.insert(profile);
        }
        Ok(registry)
    }

    /// Registers a profile under its own name, replacing any previous one.
    pub fn insert(&mut self, profile: ServiceProfile) -> Option<ServiceProfile> {
        self.services.insert(profile.name.clone(), profile)
    }

    /// Looks up a profile, failing fast for unknown names.
    pub fn get(&self, name: &str) -> Result<&ServiceProfile> {
        self.services
            .get(name)
            .ok_or_else(|| ChatError::UnknownService(name.to_string()))
    }

    /// Returns the registered service names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
