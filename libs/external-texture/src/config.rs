// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Subsystem configuration via `external_texture.yaml`.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ExternalTextureError, Result};

/// Which native allocator backs reconstructed textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeAllocatorMode {
    /// The platform allocator when one exists, otherwise the null capability.
    #[default]
    Auto,
    /// Always the null capability; every reconstruction reports unsupported.
    Disabled,
}

impl std::str::FromStr for NativeAllocatorMode {
    type Err = ExternalTextureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "disabled" => Ok(Self::Disabled),
            other => Err(ExternalTextureError::Configuration(format!(
                "unknown native allocator mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadbackConfig {
    /// Drain GL errors left pending by the caller before reading back, so
    /// only errors raised by the readback fail it.
    ///
    /// Draining consumes those errors: the application's own later
    /// `glGetError` no longer sees them, they only reach the `warn` log.
    /// Turn this off when the captured application relies on polling its
    /// errors; a pending error then fails the readback instead.
    pub drain_stale_errors: bool,
    /// Upper bound on `glGetError` calls per drain.
    pub max_error_drain: u32,
}

impl Default for ReadbackConfig {
    fn default() -> Self {
        Self {
            drain_stale_errors: true,
            max_error_drain: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExternalTextureConfig {
    pub gles_library: String,
    pub egl_library: String,
    pub native_allocator: NativeAllocatorMode,
    pub readback: ReadbackConfig,
}

impl Default for ExternalTextureConfig {
    fn default() -> Self {
        Self {
            gles_library: "libGLESv2.so".into(),
            egl_library: "libEGL.so".into(),
            native_allocator: NativeAllocatorMode::Auto,
            readback: ReadbackConfig::default(),
        }
    }
}

impl ExternalTextureConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "external_texture.yaml";

    pub const ENV_GLES_LIBRARY: &'static str = "EXTERNAL_TEXTURE_GLES_LIBRARY";
    pub const ENV_EGL_LIBRARY: &'static str = "EXTERNAL_TEXTURE_EGL_LIBRARY";
    pub const ENV_NATIVE_ALLOCATOR: &'static str = "EXTERNAL_TEXTURE_NATIVE_ALLOCATOR";

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            ExternalTextureError::Configuration(format!("Failed to parse config: {}", e))
        })
    }

    /// Load configuration from a directory. Returns error if the file is
    /// missing or cannot be parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            ExternalTextureError::Configuration(format!(
                "Failed to read {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let config = serde_yaml::from_str(&content).map_err(|e| {
            ExternalTextureError::Configuration(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;

        tracing::info!("Loaded external texture config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, falling back to defaults if the
    /// file is missing or unparseable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);
        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Apply `EXTERNAL_TEXTURE_*` environment overrides.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(Self::ENV_GLES_LIBRARY) {
            self.gles_library = path;
        }
        if let Some(path) = lookup(Self::ENV_EGL_LIBRARY) {
            self.egl_library = path;
        }
        if let Some(mode) = lookup(Self::ENV_NATIVE_ALLOCATOR) {
            self.native_allocator = mode.parse()?;
        }
        Ok(())
    }
}
