// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pool of reconstructed external textures.
//!
//! Entries are keyed by `(identity, width, height, format)` and live until
//! [`ExternalResourcePool::release_all`] (or the pool is dropped). There is
//! no per-entry eviction: the pool spans one context/device lifetime.

use gl::types::GLenum;

use crate::error::{ExternalTextureError, Result};
use crate::format::{resolve_external, ExternalFormat};
use crate::native::{ClientBufferHandle, ImageHandle, NativeAllocator, NativeBufferHandle};
use crate::reconstructor::NativeBufferReconstructor;

/// Identity of the logical texture being replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

/// Full cache key of a reconstructed texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub identity: ResourceId,
    pub width: u32,
    pub height: u32,
    pub format: ExternalFormat,
}

/// A reconstructed external texture.
///
/// The native allocation, client buffer and image are created together and
/// destroyed together by the owning pool.
#[derive(Debug)]
pub struct ExternalTextureResource {
    key: ResourceKey,
    byte_len: usize,
    native_buffer: NativeBufferHandle,
    client_buffer: ClientBufferHandle,
    image: ImageHandle,
}

impl ExternalTextureResource {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn identity(&self) -> ResourceId {
        self.key.identity
    }

    pub fn width(&self) -> u32 {
        self.key.width
    }

    pub fn height(&self) -> u32 {
        self.key.height
    }

    pub fn format(&self) -> ExternalFormat {
        self.key.format
    }

    /// Tightly packed content size.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn native_buffer(&self) -> NativeBufferHandle {
        self.native_buffer
    }

    pub fn client_buffer(&self) -> ClientBufferHandle {
        self.client_buffer
    }

    /// Image handle the replay driver samples from.
    pub fn image(&self) -> ImageHandle {
        self.image
    }
}

pub struct ExternalResourcePool {
    reconstructor: NativeBufferReconstructor,
    entries: Vec<ExternalTextureResource>,
}

impl ExternalResourcePool {
    pub fn new(allocator: Box<dyn NativeAllocator>) -> Self {
        Self {
            reconstructor: NativeBufferReconstructor::new(allocator),
            entries: Vec::new(),
        }
    }

    pub fn reconstructor(&self) -> &NativeBufferReconstructor {
        &self.reconstructor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalTextureResource> {
        self.entries.iter()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ExternalTextureResource> {
        self.entries.iter().find(|entry| entry.key == *key)
    }

    /// Return the entry for `(identity, width, height, internal_format)`,
    /// allocating it on first request.
    ///
    /// A hit is returned unchanged. A failed allocation or import leaves the
    /// pool untouched.
    pub fn find_or_create(
        &mut self,
        identity: ResourceId,
        width: u32,
        height: u32,
        internal_format: GLenum,
    ) -> Result<&ExternalTextureResource> {
        if width == 0 || height == 0 {
            return Err(ExternalTextureError::InvalidArgument(format!(
                "{} requested with empty extent {}x{}",
                identity, width, height
            )));
        }
        if internal_format == gl::NONE {
            return Err(ExternalTextureError::InvalidArgument(format!(
                "{} requested without a format",
                identity
            )));
        }
        let format = resolve_external(internal_format)?;
        let byte_len = format.descriptor().checked_image_bytes(width, height)?;

        let key = ResourceKey {
            identity,
            width,
            height,
            format,
        };

        if let Some(index) = self.entries.iter().position(|entry| entry.key == key) {
            tracing::trace!("Reusing external texture {:?}", key);
            return Ok(&self.entries[index]);
        }

        let allocation = self.reconstructor.allocate(width, height, format)?;
        self.entries.push(ExternalTextureResource {
            key,
            byte_len,
            native_buffer: allocation.buffer,
            client_buffer: allocation.imported.client_buffer,
            image: allocation.imported.image,
        });

        tracing::debug!(
            "Created external texture {} ({}x{} {:?}) via {}, pool size {}",
            identity,
            width,
            height,
            format,
            self.reconstructor.allocator().name(),
            self.entries.len()
        );

        Ok(&self.entries[self.entries.len() - 1])
    }

    fn lookup(&self, key: &ResourceKey) -> Result<&ExternalTextureResource> {
        self.get(key).ok_or_else(|| {
            ExternalTextureError::InvalidArgument(format!("no pooled resource for {:?}", key))
        })
    }

    /// Overwrite the content of the entry at `key` with tightly packed
    /// `bytes`.
    pub fn write(&self, key: &ResourceKey, bytes: &[u8]) -> Result<&ExternalTextureResource> {
        let entry = self.lookup(key)?;
        self.reconstructor.write(entry, bytes)?;
        Ok(entry)
    }

    /// Read the content of the entry at `key` as tightly packed rows.
    pub fn read(&self, key: &ResourceKey) -> Result<Vec<u8>> {
        self.reconstructor.read(self.lookup(key)?)
    }

    /// Destroy every image, release every allocation, and empty the pool.
    pub fn release_all(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            self.reconstructor.release(&entry);
        }
        tracing::debug!("Released {} external texture resource(s)", count);
    }
}

impl Drop for ExternalResourcePool {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for ExternalResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalResourcePool")
            .field("reconstructor", &self.reconstructor)
            .field("entries", &self.entries.len())
            .finish()
    }
}
