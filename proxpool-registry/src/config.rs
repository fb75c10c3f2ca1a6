use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Host-side declaration of which sources to run and with what parameters.
///
/// ```yaml
/// sources:
///   - source: proxpool.static-list
///     parameters:
///       proxies: "10.0.0.1:8080, 10.0.0.2:1080"
///       protocols: http
/// ```
///
/// This file only feeds the string-keyed parameter mapping each source is
/// initialized with; it never bypasses schema validation.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceConfig {
    /// Registered source id to instantiate.
    pub source: String,
    /// Uninterpreted string parameters handed to `initialize`.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl FromStr for SourcesConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}
