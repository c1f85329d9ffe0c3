//! Application default-port catalog.
//!
//! When a flow names an application but leaves the ports as `any`, the
//! application's default ports stand in for them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{PolicyError, Result};
use crate::parser::parse_candidate_ports;
use crate::types::{CandidateFlow, PortToken, ANY};

#[derive(Deserialize)]
#[serde(untagged)]
enum PortSpec {
    Text(String),
    List(Vec<String>),
}

/// Default destination ports per application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDefaultCatalog {
    ports: HashMap<String, Vec<PortToken>>,
}

impl AppDefaultCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an application's default ports
    pub fn insert(&mut self, application: impl AsRef<str>, ports: Vec<PortToken>) {
        self.ports
            .insert(application.as_ref().trim().to_lowercase(), ports);
    }

    /// Set an application's default ports (builder form)
    pub fn with_app(mut self, application: impl AsRef<str>, ports: Vec<PortToken>) -> Self {
        self.insert(application, ports);
        self
    }

    pub fn get(&self, application: &str) -> Option<&[PortToken]> {
        self.ports
            .get(&application.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Load from JSON, e.g. `{"ssl": ["443"], "web-browsing": "80,8080"}`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, PortSpec> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (application, spec) in raw {
            let text = match spec {
                PortSpec::Text(text) => text,
                PortSpec::List(items) => items.join(","),
            };
            let ports = parse_candidate_ports(&text).map_err(|e| {
                PolicyError::ConfigError(format!(
                    "application '{}' default ports: {}",
                    application, e
                ))
            })?;
            catalog.insert(application, ports);
        }
        Ok(catalog)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PolicyError::ConfigError(format!(
                "Failed to read application catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }

    /// Replace `any` ports with the application's defaults.
    ///
    /// The flow is returned unchanged when it already names ports, when its
    /// application is `any`, or when the application is not in the catalog.
    pub fn resolve_ports(&self, flow: &CandidateFlow) -> CandidateFlow {
        if !flow.has_any_port() || flow.application == ANY {
            return flow.clone();
        }
        match self.get(&flow.application) {
            Some(ports) => {
                debug!(
                    "application {} resolves to default ports {:?}",
                    flow.application, ports
                );
                flow.clone().with_ports(ports.to_vec())
            }
            None => flow.clone(),
        }
    }
}
