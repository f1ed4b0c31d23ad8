// Participant configuration.

use serde::{Deserialize, Serialize};

use crate::crypto::suite::SuiteId;
use crate::error::{Result, W4TrustError};
use crate::handshake::credentials::Credentials;

fn default_suites() -> Vec<SuiteId> {
    vec![SuiteId::W4Base1]
}

fn default_grease_count() -> usize {
    1
}

/// Static settings of a handshake participant.
///
/// # Example
/// ```ignore
/// let config = ParticipantConfig::new("w4id:key:alice")
///     .suites(vec![SuiteId::W4Base1])
///     .extensions(vec!["w4_ext_sdjwt_vp@1".into()])
///     .grease_count(2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub w4id: String,
    /// Suites in order of preference. Only implemented ones are ever selected.
    #[serde(default = "default_suites")]
    pub suites: Vec<SuiteId>,
    /// Extension names this participant supports.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Declared claims; defaults to [`Credentials::for_w4id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Number of GREASE names added to each ClientHello; at least one is
    /// always sent.
    #[serde(default = "default_grease_count")]
    pub grease_count: usize,
}

impl ParticipantConfig {
    pub fn new(w4id: impl Into<String>) -> Self {
        Self {
            w4id: w4id.into(),
            suites: default_suites(),
            extensions: Vec::new(),
            credentials: None,
            grease_count: default_grease_count(),
        }
    }

    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| W4TrustError::MalformedMessage(format!("participant config: {e}")))?;
        if config.w4id.is_empty() {
            return Err(W4TrustError::MalformedMessage(
                "participant config: empty w4id".into(),
            ));
        }
        if config.grease_count == 0 {
            return Err(W4TrustError::MalformedMessage(
                "participant config: grease_count must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    pub fn suites(mut self, suites: Vec<SuiteId>) -> Self {
        self.suites = suites;
        self
    }

    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the GREASE count; values below one are raised to one.
    pub fn grease_count(mut self, count: usize) -> Self {
        self.grease_count = count.max(1);
        self
    }

    /// The credentials this participant declares during the handshake.
    pub fn declared_credentials(&self) -> Credentials {
        self.credentials
            .clone()
            .unwrap_or_else(|| Credentials::for_w4id(self.w4id.clone()))
    }

    /// Whether `suite` is both configured and implemented.
    pub fn is_usable(&self, suite: &SuiteId) -> bool {
        suite.is_implemented() && self.suites.contains(suite)
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let config = ParticipantConfig::from_json(r#"{"w4id": "w4id:key:bob"}"#).unwrap();
        assert_eq!(config.suites, vec![SuiteId::W4Base1]);
        assert!(config.extensions.is_empty());
        assert_eq!(config.grease_count, 1);
        assert_eq!(config.declared_credentials(), Credentials::for_w4id("w4id:key:bob"));
        assert_eq!(config, ParticipantConfig::new("w4id:key:bob"));
    }

    #[test]
    fn json_overrides() {
        let config = ParticipantConfig::from_json(
            r#"{
                "w4id": "w4id:key:carol",
                "suites": ["W4-FIPS-1", "W4-BASE-1"],
                "extensions": ["w4_ext_sdjwt_vp@1"],
                "credentials": {"w4id": "w4id:key:carol", "entity_type": "service", "capabilities": []},
                "grease_count": 3
            }"#,
        )
        .unwrap();
        assert_eq!(config.suites, vec![SuiteId::W4Fips1, SuiteId::W4Base1]);
        assert!(config.supports_extension("w4_ext_sdjwt_vp@1"));
        assert_eq!(config.declared_credentials().entity_type, "service");
        assert_eq!(config.grease_count, 3);
    }

    #[test]
    fn grease_count_is_never_zero() {
        assert!(matches!(
            ParticipantConfig::from_json(r#"{"w4id": "alice", "grease_count": 0}"#),
            Err(W4TrustError::MalformedMessage(_))
        ));
        assert_eq!(ParticipantConfig::new("alice").grease_count(0).grease_count, 1);
    }

    #[test]
    fn rejects_missing_or_empty_w4id() {
        assert!(ParticipantConfig::from_json("{}").is_err());
        assert!(ParticipantConfig::from_json(r#"{"w4id": ""}"#).is_err());
        assert!(ParticipantConfig::from_json("not json").is_err());
    }

    #[test]
    fn usable_requires_configured_and_implemented() {
        let config = ParticipantConfig::new("x").suites(vec![SuiteId::W4Fips1, SuiteId::W4Base1]);
        assert!(config.is_usable(&SuiteId::W4Base1));
        assert!(!config.is_usable(&SuiteId::W4Fips1));
        assert!(!ParticipantConfig::new("x").suites(vec![]).is_usable(&SuiteId::W4Base1));
    }
}
