//! Configuration for StashDB
//!
//! Centralized configuration with sensible defaults. Only the store name
//! and the base path are required; everything else has a default that
//! matches the on-disk conventions (`daf`/`def`/`id` suffixes).

use std::path::{Path, PathBuf};

use crate::error::{Result, StashError};

/// Main configuration for a StashDB store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Unique name of the store within `base_path`; also the file stem
    pub store_name: String,

    /// Parent directory under which the store directory is created
    pub base_path: PathBuf,

    // -------------------------------------------------------------------------
    // File Layout
    // -------------------------------------------------------------------------
    /// Suffix of the data (payload) file
    pub data_file_suffix: String,

    /// Suffix of the description (slot) file
    pub description_file_suffix: String,

    /// Suffix of the id counter file
    pub id_file_suffix: String,

    // -------------------------------------------------------------------------
    // Tuning
    // -------------------------------------------------------------------------
    /// Initial capacity of the shared staging buffer (bytes)
    pub byte_buffer_size: usize,

    /// Minimum growth step of the data file (bytes)
    pub minimum_data_file_size: u64,
}

impl Config {
    /// Create a config with default settings for everything but name and path
    pub fn new(store_name: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            store_name: store_name.into(),
            base_path: base_path.into(),
            data_file_suffix: "daf".to_string(),
            description_file_suffix: "def".to_string(),
            id_file_suffix: "id".to_string(),
            byte_buffer_size: 512,
            minimum_data_file_size: 1024,
        }
    }

    /// Create a new config builder
    pub fn builder(store_name: impl Into<String>, base_path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::new(store_name, base_path),
        }
    }

    /// Check every option; empty strings and zero sizes are rejected
    pub fn validate(&self) -> Result<()> {
        if self.store_name.is_empty() {
            return Err(StashError::InvalidArgument("store name is empty".into()));
        }
        if self.data_file_suffix.is_empty()
            || self.description_file_suffix.is_empty()
            || self.id_file_suffix.is_empty()
        {
            return Err(StashError::InvalidArgument("file suffix is empty".into()));
        }
        if self.byte_buffer_size == 0 {
            return Err(StashError::InvalidArgument(
                "byte buffer size must be positive".into(),
            ));
        }
        if self.minimum_data_file_size == 0 {
            return Err(StashError::InvalidArgument(
                "minimum data file size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding all files of this store: `base_path/store_name/`
    pub fn store_directory(&self) -> PathBuf {
        self.base_path.join(&self.store_name)
    }

    /// Path of the description (slot) file
    pub fn description_file_path(&self) -> PathBuf {
        self.store_file_path(&self.description_file_suffix)
    }

    /// Path of the data (payload) file
    pub fn data_file_path(&self) -> PathBuf {
        self.store_file_path(&self.data_file_suffix)
    }

    /// Path of the id counter file
    pub fn id_file_path(&self) -> PathBuf {
        self.store_file_path(&self.id_file_suffix)
    }

    fn store_file_path(&self, suffix: &str) -> PathBuf {
        self.store_directory()
            .join(format!("{}.{}", self.store_name, suffix))
    }
}

/// Builder for Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_file_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.data_file_suffix = suffix.into();
        self
    }

    pub fn description_file_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.description_file_suffix = suffix.into();
        self
    }

    pub fn id_file_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.id_file_suffix = suffix.into();
        self
    }

    pub fn byte_buffer_size(mut self, size: usize) -> Self {
        self.config.byte_buffer_size = size;
        self
    }

    pub fn minimum_data_file_size(mut self, size: u64) -> Self {
        self.config.minimum_data_file_size = size;
        self
    }

    pub fn base_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.base_path = path.as_ref().to_path_buf();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
