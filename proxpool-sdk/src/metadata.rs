use std::collections::HashMap;

use serde::Serialize;

use crate::{Error, Result};

/// Identity metadata attached to one source implementation.
///
/// Exists once per source type, queryable without constructing an
/// instance. The `hide_*` flags are advisory hints for listing UIs only
/// and must never be used to infer what a source can actually do; real
/// capability is reported by the instance itself.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    id: String,
    name: String,
    description: Option<String>,
    hide_batch: bool,
    hide_stream: bool,
}

impl SourceInfo {
    /// `id` convention: `<publisher>.<plugin-name>`, lowercase, dot
    /// separated. Uniqueness is enforced at registration, not here.
    pub fn new<T: Into<String>>(id: T, name: T) -> Result<Self> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(Error::Validation("source id must not be blank".into()));
        }
        if name.trim().is_empty() {
            return Err(Error::Validation("source name must not be blank".into()));
        }
        Ok(Self {
            id,
            name,
            description: None,
            hide_batch: false,
            hide_stream: false,
        })
    }

    pub fn with_description<T: Into<String>>(mut self, description: T) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the source as hidden from batch-style listings.
    pub fn with_hidden_batch(mut self) -> Self {
        self.hide_batch = true;
        self
    }

    /// Marks the source as hidden from stream-style listings.
    pub fn with_hidden_stream(mut self) -> Self {
        self.hide_stream = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn hide_batch(&self) -> bool {
        self.hide_batch
    }

    pub fn hide_stream(&self) -> bool {
        self.hide_stream
    }
}

/// One declared configuration parameter of a source.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    description: String,
    required: bool,
}

impl ParamSpec {
    pub fn required<T: Into<String>>(name: T, description: T) -> Result<Self> {
        Self::new(name.into(), description.into(), true)
    }

    pub fn optional<T: Into<String>>(name: T, description: T) -> Result<Self> {
        Self::new(name.into(), description.into(), false)
    }

    fn new(name: String, description: String, required: bool) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Validation("parameter name must not be blank".into()));
        }
        if description.trim().is_empty() {
            return Err(Error::Validation(format!(
                "parameter {} has a blank description",
                name
            )));
        }
        Ok(Self {
            name,
            description,
            required,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Checks a caller supplied parameter mapping against a declared schema.
///
/// Every required entry must have a matching key; the failure lists all
/// missing names at once. Unrecognized keys pass through uninterpreted
/// (the schema is not an allow-list) and values are not parsed here.
pub fn validate_parameters(
    specs: &[ParamSpec],
    supplied: &HashMap<String, String>,
) -> Result<()> {
    let missing = specs
        .iter()
        .filter(|s| s.required && !supplied.contains_key(&s.name))
        .map(|s| s.name.clone())
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingParameters(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("apiKey", "Upstream API key.").unwrap(),
            ParamSpec::required("region", "Upstream region.").unwrap(),
            ParamSpec::optional("limit", "Maximum proxies per fetch.").unwrap(),
        ]
    }

    #[test]
    fn blank_fields_rejected() {
        assert!(SourceInfo::new("", "Name").unwrap_err().is_validation());
        assert!(SourceInfo::new("acme.list", "  ").unwrap_err().is_validation());
        assert!(ParamSpec::required(" ", "desc").unwrap_err().is_validation());
        assert!(ParamSpec::optional("key", "").unwrap_err().is_validation());
    }

    #[test]
    fn reports_every_missing_required_key() {
        let supplied = HashMap::from([("limit".to_owned(), "5".to_owned())]);
        match validate_parameters(&schema(), &supplied) {
            Err(crate::Error::MissingParameters(names)) => {
                assert_eq!(names, vec!["apiKey".to_owned(), "region".to_owned()]);
            }
            other => panic!("expected MissingParameters, got {:?}", other),
        }
    }

    #[test]
    fn unknown_keys_pass_through() {
        let supplied = HashMap::from([
            ("apiKey".to_owned(), "k".to_owned()),
            ("region".to_owned(), "eu".to_owned()),
            ("x-extension".to_owned(), "anything".to_owned()),
        ]);
        assert!(validate_parameters(&schema(), &supplied).is_ok());
    }

    #[test]
    fn empty_schema_accepts_empty_mapping() {
        assert!(validate_parameters(&[], &HashMap::new()).is_ok());
    }
}
