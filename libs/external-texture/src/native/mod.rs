// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Platform-native image allocations and their import into the graphics API.
//!
//! [`NativeAllocator`] is the capability the reconstructor depends on. Each
//! platform with an opaque-buffer allocator has one implementation; every
//! other platform gets [`UnsupportedAllocator`], which reports
//! [`ExternalTextureError::UnsupportedPlatform`] for everything.
//!
//! - Android: `AHardwareBuffer` → `EGLClientBuffer` → `EGLImageKHR`
//! - Everything else: unsupported

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::HardwareBufferAllocator;

use std::ffi::c_void;

use bitflags::bitflags;

use crate::config::{ExternalTextureConfig, NativeAllocatorMode};
use crate::error::{ExternalTextureError, Result};
use crate::format::ExternalFormat;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*mut c_void);

        impl $name {
            pub const fn from_raw(raw: *mut c_void) -> Self {
                Self(raw)
            }

            pub const fn as_raw(&self) -> *mut c_void {
                self.0
            }

            pub fn is_null(&self) -> bool {
                self.0.is_null()
            }
        }

        // SAFETY: an opaque handle value; all calls through it happen on the
        // thread owning the graphics context.
        unsafe impl Send for $name {}
    };
}

opaque_handle!(
    /// Platform allocation (`AHardwareBuffer*` on Android).
    NativeBufferHandle
);
opaque_handle!(
    /// Intermediate client-buffer descriptor used for import (`EGLClientBuffer`).
    ClientBufferHandle
);
opaque_handle!(
    /// Graphics-API image created from a native allocation (`EGLImageKHR`).
    ImageHandle
);

/// Platform pixel format of a native allocation.
///
/// Values are `AHARDWAREBUFFER_FORMAT_*` constants; allocators for other
/// platforms translate at their boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeFormat(pub u32);

impl NativeFormat {
    pub const R8G8B8A8_UNORM: Self = Self(1);
    pub const R8G8B8X8_UNORM: Self = Self(2);
    pub const R8G8B8_UNORM: Self = Self(3);

    /// Bytes per pixel, or `None` for formats rows cannot be copied for.
    pub const fn bytes_per_pixel(&self) -> Option<u32> {
        match *self {
            Self::R8G8B8A8_UNORM | Self::R8G8B8X8_UNORM => Some(4),
            Self::R8G8B8_UNORM => Some(3),
            _ => None,
        }
    }
}

bitflags! {
    /// `AHARDWAREBUFFER_USAGE_*` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NativeUsage: u64 {
        const CPU_READ_RARELY = 0x2;
        const CPU_READ_OFTEN = 0x3;
        const CPU_WRITE_RARELY = 0x20;
        const CPU_WRITE_OFTEN = 0x30;
        const GPU_SAMPLED_IMAGE = 0x100;
    }
}

impl NativeUsage {
    /// Usage requested for reconstructed external textures.
    pub const RECONSTRUCTED: Self = Self::CPU_WRITE_RARELY
        .union(Self::CPU_READ_RARELY)
        .union(Self::GPU_SAMPLED_IMAGE);
}

/// Allocation request / description. `stride` is in pixels and is filled in
/// by the allocator on describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBufferDesc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: NativeFormat,
    pub usage: NativeUsage,
    pub stride: u32,
}

impl NativeBufferDesc {
    pub fn new(width: u32, height: u32, format: NativeFormat, usage: NativeUsage) -> Self {
        Self {
            width,
            height,
            layers: 1,
            format,
            usage,
            stride: 0,
        }
    }
}

/// Client buffer and image produced by importing a native allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportedImage {
    pub client_buffer: ClientBufferHandle,
    pub image: ImageHandle,
}

/// Platform allocator plus graphics-API import bridge.
///
/// # Safety
///
/// A pointer returned by [`lock`](NativeAllocator::lock) must stay valid for
/// reads and writes of `stride * (height - 1) + width` pixels of the
/// described format until the matching [`unlock`](NativeAllocator::unlock).
pub unsafe trait NativeAllocator {
    /// Short platform name for logs.
    fn name(&self) -> &'static str;

    /// `Err(UnsupportedPlatform)` when this allocator cannot do anything.
    fn ensure_supported(&self) -> Result<()> {
        Ok(())
    }

    /// Native representation of `format`, if the platform has one.
    fn native_format(&self, format: ExternalFormat) -> Option<NativeFormat> {
        match format {
            ExternalFormat::Rgb8 => Some(NativeFormat::R8G8B8_UNORM),
            ExternalFormat::Rgba8 => Some(NativeFormat::R8G8B8A8_UNORM),
            _ => None,
        }
    }

    fn allocate(&self, desc: &NativeBufferDesc) -> Result<NativeBufferHandle>;

    /// Actual description, including the row stride chosen by the allocator.
    fn describe(&self, buffer: NativeBufferHandle) -> Result<NativeBufferDesc>;

    /// Map the allocation for CPU access with `usage` (a CPU usage bit).
    fn lock(&self, buffer: NativeBufferHandle, usage: NativeUsage) -> Result<*mut u8>;

    fn unlock(&self, buffer: NativeBufferHandle) -> Result<()>;

    fn release(&self, buffer: NativeBufferHandle);

    /// Wrap `buffer` as a client buffer and import it as an image.
    fn import_image(&self, buffer: NativeBufferHandle) -> Result<ImportedImage>;

    /// Destroy an imported image. No-op on a null handle.
    fn destroy_image(&self, image: ImageHandle);
}

/// Null capability for platforms without a native opaque-buffer allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedAllocator;

impl UnsupportedAllocator {
    fn unsupported<T>(&self, operation: &str) -> Result<T> {
        Err(ExternalTextureError::UnsupportedPlatform(format!(
            "{} requires a native buffer allocator ({})",
            operation,
            std::env::consts::OS
        )))
    }
}

// SAFETY: `lock` never returns a pointer.
unsafe impl NativeAllocator for UnsupportedAllocator {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn ensure_supported(&self) -> Result<()> {
        self.unsupported("external texture reconstruction")
    }

    fn native_format(&self, _format: ExternalFormat) -> Option<NativeFormat> {
        None
    }

    fn allocate(&self, _desc: &NativeBufferDesc) -> Result<NativeBufferHandle> {
        self.unsupported("allocate")
    }

    fn describe(&self, _buffer: NativeBufferHandle) -> Result<NativeBufferDesc> {
        self.unsupported("describe")
    }

    fn lock(&self, _buffer: NativeBufferHandle, _usage: NativeUsage) -> Result<*mut u8> {
        self.unsupported("lock")
    }

    fn unlock(&self, _buffer: NativeBufferHandle) -> Result<()> {
        self.unsupported("unlock")
    }

    fn release(&self, _buffer: NativeBufferHandle) {}

    fn import_image(&self, _buffer: NativeBufferHandle) -> Result<ImportedImage> {
        self.unsupported("import_image")
    }

    fn destroy_image(&self, _image: ImageHandle) {}
}

/// The allocator for this build target, honoring
/// [`ExternalTextureConfig::native_allocator`].
pub fn platform_allocator(config: &ExternalTextureConfig) -> Result<Box<dyn NativeAllocator>> {
    if config.native_allocator == NativeAllocatorMode::Disabled {
        tracing::info!("Native allocator disabled by configuration");
        return Ok(Box::new(UnsupportedAllocator));
    }

    #[cfg(target_os = "android")]
    {
        let allocator = HardwareBufferAllocator::new(&config.egl_library)?;
        Ok(Box::new(allocator))
    }
    #[cfg(not(target_os = "android"))]
    {
        tracing::debug!(
            "No native buffer allocator on {}, reconstruction unsupported",
            std::env::consts::OS
        );
        Ok(Box::new(UnsupportedAllocator))
    }
}
