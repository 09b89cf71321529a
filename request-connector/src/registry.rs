//! Converter registry - Resolves converters by name.
//!
//! The built-in `json` converter backs `type = "json"` endpoints. Endpoints
//! with `type = "custom"` name an extension that must have been registered
//! here; an unknown extension fails only that endpoint.

use crate::config::{ConverterType, EndpointConfig};
use crate::converters::json::JsonConverter;
use crate::converters::raw::RawConverter;
use crate::converters::Converter;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a converter for one endpoint.
pub type ConverterFactory =
    Arc<dyn Fn(&EndpointConfig) -> Result<Arc<dyn Converter>> + Send + Sync>;

const JSON_CONVERTER: &str = "json";

/// Maps converter names to factories.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    factories: HashMap<String, ConverterFactory>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the `json` and `raw` converters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(JSON_CONVERTER, JsonConverter::factory);
        registry.register("raw", RawConverter::factory);
        registry
    }

    /// Registers (or replaces) a converter factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&EndpointConfig) -> Result<Arc<dyn Converter>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Registered converter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves the converter configured for `endpoint`.
    pub fn resolve(&self, endpoint: &EndpointConfig) -> Result<Arc<dyn Converter>> {
        let name = match endpoint.converter.converter_type {
            ConverterType::Json => JSON_CONVERTER,
            ConverterType::Custom => endpoint
                .converter
                .extension
                .as_deref()
                .filter(|ext| !ext.trim().is_empty())
                .with_context(|| {
                    format!("Custom converter for url {} has no extension", endpoint.url)
                })?,
        };

        let factory = self.factories.get(name).with_context(|| {
            format!(
                "Cannot find extension module '{}' for url {} (registered: {})",
                name,
                endpoint.url,
                self.names().join(", ")
            )
        })?;

        factory(endpoint)
            .with_context(|| format!("Failed to build converter '{}' for url {}", name, endpoint.url))
    }
}
