use crate::{error::ClientError, flatten::EntityIdentity};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::Path,
};
use url::Url;

pub const DEFAULT_LOCAL_DIRECTIVE: &str = "local";
pub const DEFAULT_TYPENAME_FIELD: &str = "__typename";
pub const DEFAULT_ID_FIELD: &str = "id";

/// Upper bound on how many queries a single invalidation chain may pass through.
pub const DEFAULT_MAX_INVALIDATION_DEPTH: usize = 16;

/// Settings shared by every query a [crate::client::QueryClient] executes.
///
/// Usually read from a toml file:
///
/// ```toml
/// endpoint = "https://example.com/graphql"
/// local_directive = "client"
/// inject_fields = ["__typename"]
///
/// [headers]
/// authorization = "Bearer abc"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote endpoint used by [crate::transport::HttpTransport]
    pub endpoint: Option<String>,
    /// Name of the directive marking a field as locally resolved, without the `@`
    pub local_directive: String,
    pub typename_field: String,
    pub id_field: String,
    /// Leaf fields added to every selection set sent to the server
    pub inject_fields: Vec<String>,
    pub max_invalidation_depth: usize,
    /// Extra headers attached to every HTTP request
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: None,
            local_directive: DEFAULT_LOCAL_DIRECTIVE.to_string(),
            typename_field: DEFAULT_TYPENAME_FIELD.to_string(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            inject_fields: vec![DEFAULT_TYPENAME_FIELD.to_string()],
            max_invalidation_depth: DEFAULT_MAX_INVALIDATION_DEPTH,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config at `path`. A missing file yields the default config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read client config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using the default client config.");
            return Ok(ClientConfig::default());
        }
        let content = read_to_string(path)?;
        ClientConfig::from_toml_str(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ClientError> {
        tracing::debug!("Attempting to write client config to: {:?}", path.as_ref());
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn endpoint_url(&self) -> Result<Url, ClientError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| ClientError::Config("no endpoint configured".to_string()))?;
        Ok(Url::parse(endpoint)?)
    }

    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity {
            typename_field: self.typename_field.clone(),
            id_field: self.id_field.clone(),
        }
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.local_directive.is_empty() || self.local_directive.starts_with('@') {
            return Err(ClientError::Config(format!(
                "local_directive must be a bare directive name, got '{}'",
                self.local_directive
            )));
        }
        if self.typename_field.is_empty() || self.id_field.is_empty() {
            return Err(ClientError::Config(
                "typename_field and id_field must not be empty".to_string(),
            ));
        }
        if self.max_invalidation_depth == 0 {
            return Err(ClientError::Config(
                "max_invalidation_depth must be at least 1".to_string(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            local_directive = "client"

            [headers]
            authorization = "Bearer abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.local_directive, "client");
        assert_eq!(config.typename_field, "__typename");
        assert_eq!(config.inject_fields, vec!["__typename".to_string()]);
        assert_eq!(
            config.headers.get("authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str("local_directive = \"@client\""),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("endpoint = \"not a url\""),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("max_invalidation_depth = \"deep\""),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_url_requires_endpoint() {
        assert!(ClientConfig::default().endpoint_url().is_err());
        let url = ClientConfig::default()
            .with_endpoint("https://example.com/graphql")
            .endpoint_url()
            .unwrap();
        assert_eq!(url.path(), "/graphql");
    }
}
