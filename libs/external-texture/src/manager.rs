// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Capture/replay entry point owning the capability tables and the pool.

use gl::types::{GLenum, GLuint};

use crate::captured::CapturedTexture;
use crate::config::ExternalTextureConfig;
use crate::error::Result;
use crate::format::resolve_external;
use crate::gles::{GlesApi, GlesDispatch};
use crate::native::{platform_allocator, NativeAllocator};
use crate::pool::{ExternalResourcePool, ExternalTextureResource, ResourceId, ResourceKey};
use crate::readback::read_external_texture;

/// Capture and replay of external textures for one graphics context.
///
/// Must be used on the thread that owns the context. Dropping the manager
/// releases every reconstructed resource.
pub struct ExternalTextureManager {
    config: ExternalTextureConfig,
    gl: Box<dyn GlesApi>,
    pool: ExternalResourcePool,
}

impl ExternalTextureManager {
    /// Build from explicit capability tables.
    pub fn new(
        config: ExternalTextureConfig,
        gl: Box<dyn GlesApi>,
        allocator: Box<dyn NativeAllocator>,
    ) -> Self {
        Self {
            config,
            gl,
            pool: ExternalResourcePool::new(allocator),
        }
    }

    /// Resolve the GLES table and the platform allocator named by `config`.
    pub fn load(config: ExternalTextureConfig) -> Result<Self> {
        let gl = GlesDispatch::load(&config.gles_library)?;
        let allocator = platform_allocator(&config)?;
        tracing::info!(
            "External texture manager ready (allocator: {})",
            allocator.name()
        );
        Ok(Self::new(config, Box::new(gl), allocator))
    }

    pub fn config(&self) -> &ExternalTextureConfig {
        &self.config
    }

    pub fn pool(&self) -> &ExternalResourcePool {
        &self.pool
    }

    /// Read the live content of external texture `texture`.
    pub fn capture(&self, texture: GLuint) -> Result<CapturedTexture> {
        read_external_texture(self.gl.as_ref(), texture, &self.config.readback)
    }

    /// Obtain (or create) the reconstructed texture for `identity` and fill
    /// it with `captured`.
    pub fn restore(
        &mut self,
        identity: ResourceId,
        captured: &CapturedTexture,
    ) -> Result<&ExternalTextureResource> {
        captured.validate()?;
        let key = *self
            .pool
            .find_or_create(
                identity,
                captured.width,
                captured.height,
                captured.internal_format,
            )?
            .key();
        self.pool.write(&key, &captured.pixels)
    }

    /// Read back the content of a previously reconstructed texture.
    ///
    /// Fails with `InvalidArgument` if nothing was restored under that key.
    pub fn reextract(
        &self,
        identity: ResourceId,
        width: u32,
        height: u32,
        internal_format: GLenum,
    ) -> Result<CapturedTexture> {
        let key = ResourceKey {
            identity,
            width,
            height,
            format: resolve_external(internal_format)?,
        };
        let pixels = self.pool.read(&key)?;
        Ok(CapturedTexture {
            width,
            height,
            internal_format,
            pixels,
        })
    }

    /// Tear down every reconstructed texture.
    pub fn release_all(&mut self) {
        self.pool.release_all();
    }
}

impl std::fmt::Debug for ExternalTextureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalTextureManager")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}
