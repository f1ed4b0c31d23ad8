// Credential blob carried encrypted inside ServerHello and ClientFinished.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::to_canonical_vec;
use crate::error::{Result, W4TrustError};

/// Declared claims of a participant.
///
/// Any JSON object is accepted. The well-known claims are typed and empty
/// when absent; everything else lands in `claims` and is written back after
/// them in key order. Serialized canonically as
/// `{"w4id", "entity_type", "capabilities", ...claims}`. The transcript
/// signature covers the peer's exact plaintext bytes, not a re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub w4id: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(flatten)]
    pub claims: BTreeMap<String, Value>,
}

impl Credentials {
    /// Default claims for an AI participant.
    pub fn for_w4id(w4id: impl Into<String>) -> Self {
        Self {
            w4id: w4id.into(),
            entity_type: "ai".into(),
            capabilities: vec!["witness:attest".into()],
            claims: BTreeMap::new(),
        }
    }

    /// Add a free-form claim.
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| W4TrustError::MalformedMessage(format!("credentials: {e}")))
    }
}
