// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reconstruction of external textures from captured bytes.
//!
//! A reconstructed texture is a native allocation sized to the captured
//! image, imported into the graphics API as an image handle. Content moves
//! between the flat transport buffer and the allocation with
//! [`copy_rows`], honoring the allocator's row stride.

use crate::error::{ExternalTextureError, Result};
use crate::format::ExternalFormat;
use crate::layout::{copy_rows, strided_extent};
use crate::native::{
    ImportedImage, NativeAllocator, NativeBufferDesc, NativeBufferHandle, NativeUsage,
};
use crate::pool::ExternalTextureResource;

/// Result of [`NativeBufferReconstructor::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructedAllocation {
    pub buffer: NativeBufferHandle,
    pub imported: ImportedImage,
}

/// Row geometry of a locked allocation, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowLayout {
    row_bytes: usize,
    stride_bytes: usize,
    rows: usize,
    mapped_len: usize,
}

impl RowLayout {
    fn new(width: u32, stride: u32, rows: u32, pixel_bytes: u32) -> Option<Self> {
        let pixel_bytes = pixel_bytes as usize;
        let row_bytes = (width as usize).checked_mul(pixel_bytes)?;
        let stride_bytes = (stride as usize).checked_mul(pixel_bytes)?;
        let rows = rows as usize;
        let mapped_len = strided_extent(row_bytes, stride_bytes, rows)?;
        Some(Self {
            row_bytes,
            stride_bytes,
            rows,
            mapped_len,
        })
    }
}

/// Unlocks the allocation when dropped.
struct MappedAllocation<'a> {
    allocator: &'a dyn NativeAllocator,
    buffer: NativeBufferHandle,
    address: *mut u8,
    len: usize,
}

impl<'a> MappedAllocation<'a> {
    fn lock(
        allocator: &'a dyn NativeAllocator,
        buffer: NativeBufferHandle,
        usage: NativeUsage,
        len: usize,
    ) -> Result<Self> {
        let address = allocator.lock(buffer, usage)?;
        Ok(Self {
            allocator,
            buffer,
            address,
            len,
        })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: the allocator contract keeps `len` bytes from `address`
        // valid until unlock, which only happens in Drop.
        unsafe { std::slice::from_raw_parts(self.address, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` makes this the only live view.
        unsafe { std::slice::from_raw_parts_mut(self.address, self.len) }
    }
}

impl Drop for MappedAllocation<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.allocator.unlock(self.buffer) {
            tracing::warn!("Failed to unlock native allocation: {}", e);
        }
    }
}

/// Allocates native backing stores and moves pixel content in and out.
pub struct NativeBufferReconstructor {
    allocator: Box<dyn NativeAllocator>,
}

impl NativeBufferReconstructor {
    pub fn new(allocator: Box<dyn NativeAllocator>) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &dyn NativeAllocator {
        self.allocator.as_ref()
    }

    /// Allocate a CPU-writable, GPU-sampleable allocation and import it.
    ///
    /// On import failure the allocation is released before returning.
    pub fn allocate(
        &self,
        width: u32,
        height: u32,
        format: ExternalFormat,
    ) -> Result<ReconstructedAllocation> {
        self.allocator.ensure_supported()?;

        let native_format = self.allocator.native_format(format).ok_or_else(|| {
            tracing::warn!(
                "{:?} has no {} representation",
                format,
                self.allocator.name()
            );
            ExternalTextureError::UnsupportedFormat(format!(
                "{:?} has no native {} format",
                format,
                self.allocator.name()
            ))
        })?;

        let desc = NativeBufferDesc::new(width, height, native_format, NativeUsage::RECONSTRUCTED);
        let buffer = self.allocator.allocate(&desc)?;

        match self.allocator.import_image(buffer) {
            Ok(imported) => Ok(ReconstructedAllocation { buffer, imported }),
            Err(e) => {
                self.allocator.release(buffer);
                Err(match e {
                    ExternalTextureError::ImportFailed(_) => e,
                    other => ExternalTextureError::ImportFailed(other.to_string()),
                })
            }
        }
    }

    /// Row geometry of `entry`'s allocation, or why rows cannot be copied.
    fn row_layout(&self, entry: &ExternalTextureResource) -> Result<RowLayout> {
        let desc = self.allocator.describe(entry.native_buffer())?;

        let Some(pixel_bytes) = desc.format.bytes_per_pixel() else {
            tracing::warn!(
                "Unknown native format {} for resource {:?}, copying nothing",
                desc.format.0,
                entry.identity()
            );
            return Err(ExternalTextureError::UnsupportedFormat(format!(
                "native format {}",
                desc.format.0
            )));
        };

        let expected = entry.format().bytes_per_pixel();
        if pixel_bytes != expected {
            return Err(ExternalTextureError::InvalidLayout(format!(
                "native pixel size {} does not match {:?} ({} bytes)",
                pixel_bytes,
                entry.format(),
                expected
            )));
        }
        if desc.width < entry.width() || desc.height < entry.height() {
            return Err(ExternalTextureError::InvalidLayout(format!(
                "allocation {}x{} smaller than resource {}x{}",
                desc.width,
                desc.height,
                entry.width(),
                entry.height()
            )));
        }
        if desc.stride < entry.width() {
            return Err(ExternalTextureError::InvalidLayout(format!(
                "stride {} smaller than width {}",
                desc.stride,
                entry.width()
            )));
        }

        RowLayout::new(entry.width(), desc.stride, entry.height(), pixel_bytes).ok_or_else(|| {
            ExternalTextureError::InvalidLayout(format!(
                "stride {} x {} rows exceeds addressable memory",
                desc.stride,
                entry.height()
            ))
        })
    }

    /// Overwrite `entry`'s content with tightly packed `bytes`.
    pub fn write(&self, entry: &ExternalTextureResource, bytes: &[u8]) -> Result<()> {
        self.allocator.ensure_supported()?;

        let expected = entry.byte_len();
        if bytes.len() != expected {
            return Err(ExternalTextureError::InvalidArgument(format!(
                "write of {} bytes to {}x{} {:?} resource, expected {}",
                bytes.len(),
                entry.width(),
                entry.height(),
                entry.format(),
                expected
            )));
        }

        let layout = self.row_layout(entry)?;
        let mut mapped = MappedAllocation::lock(
            self.allocator(),
            entry.native_buffer(),
            NativeUsage::CPU_WRITE_RARELY,
            layout.mapped_len,
        )?;

        copy_rows(
            bytes,
            mapped.as_mut_slice(),
            layout.row_bytes,
            layout.row_bytes,
            layout.stride_bytes,
            layout.rows,
        )?;

        tracing::trace!(
            "Wrote {} bytes into {:?} (row {} / stride {})",
            bytes.len(),
            entry.identity(),
            layout.row_bytes,
            layout.stride_bytes
        );
        Ok(())
    }

    /// Read `entry`'s content back as tightly packed rows.
    pub fn read(&self, entry: &ExternalTextureResource) -> Result<Vec<u8>> {
        self.allocator.ensure_supported()?;

        let layout = self.row_layout(entry)?;
        let mapped = MappedAllocation::lock(
            self.allocator(),
            entry.native_buffer(),
            NativeUsage::CPU_READ_RARELY,
            layout.mapped_len,
        )?;

        let mut bytes = vec![0u8; entry.byte_len()];
        copy_rows(
            mapped.as_slice(),
            &mut bytes,
            layout.row_bytes,
            layout.stride_bytes,
            layout.row_bytes,
            layout.rows,
        )?;
        Ok(bytes)
    }

    /// Destroy the image and release the allocation.
    pub(crate) fn release(&self, entry: &ExternalTextureResource) {
        self.allocator.destroy_image(entry.image());
        self.allocator.release(entry.native_buffer());
    }
}

impl std::fmt::Debug for NativeBufferReconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBufferReconstructor")
            .field("allocator", &self.allocator.name())
            .finish()
    }
}
