use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::HandDetector;
use super::backends::CpuBackend;
use super::skin::SkinPolicy;

/// Named detector backends available to this build.
///
/// The first registered backend becomes the default.
pub struct DetectorRegistry {
    backends: HashMap<String, Box<dyn HandDetector>>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Every backend compiled into this build, configured with `policy`.
    pub fn builtin(policy: &SkinPolicy) -> Self {
        let mut registry = Self::new();
        registry.register(CpuBackend::new(policy.clone()));
        #[cfg(feature = "backend-opencv")]
        {
            match super::backends::OpenCvBackend::new(policy.clone()) {
                Ok(backend) => registry.register(backend),
                Err(err) => log::warn!("opencv detector unavailable: {:#}", err),
            }
        }
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: HandDetector + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("detector backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return a backend by name.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn HandDetector>> {
        self.backends.remove(name).ok_or_else(|| {
            anyhow!(
                "detector backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })
    }

    /// Remove and return the default backend.
    pub fn take_default(&mut self) -> Result<Box<dyn HandDetector>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.take(&name)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
