// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! # external-texture
//!
//! Capture and replay of opaque `GL_TEXTURE_EXTERNAL_OES` textures.
//!
//! External images (camera and decoder surfaces) cannot be read, written or
//! recreated through the ordinary texture API. This crate:
//!
//! - **captures** their content by attaching them to a transient read
//!   framebuffer and reading the pixels back ([`readback`]);
//! - **reconstructs** them at replay time as a platform-native allocation
//!   imported into the graphics API as an image ([`reconstructor`]), filled
//!   with the captured bytes honoring the allocator's row stride;
//! - **pools** reconstructed textures per `(identity, width, height, format)`
//!   until context teardown ([`pool`]).
//!
//! All operations run synchronously on the thread owning the graphics
//! context. The GLES entry points and the native allocator are explicit
//! capability tables ([`gles::GlesApi`], [`native::NativeAllocator`]); on a
//! platform without a native allocator every reconstruction reports
//! [`ExternalTextureError::UnsupportedPlatform`].
//!
//! ```ignore
//! let mut manager = ExternalTextureManager::load(ExternalTextureConfig::default())?;
//!
//! // capture
//! let captured = manager.capture(texture_name)?;
//!
//! // replay
//! let resource = manager.restore(ResourceId(42), &captured)?;
//! bind_egl_image(resource.image());
//! ```

pub mod captured;
pub mod config;
pub mod error;
pub mod format;
pub mod gles;
pub mod layout;
pub mod manager;
pub mod native;
pub mod pool;
pub mod readback;
pub mod reconstructor;

pub use captured::CapturedTexture;
pub use config::{ExternalTextureConfig, NativeAllocatorMode, ReadbackConfig};
pub use error::{ExternalTextureError, Result};
pub use format::{resolve, ExternalFormat, PixelFormatDescriptor};
pub use gles::{with_restored_state, GlStateGuard, GlesApi, GlesDispatch};
pub use layout::copy_rows;
pub use manager::ExternalTextureManager;
pub use native::{platform_allocator, NativeAllocator, UnsupportedAllocator};
pub use pool::{ExternalResourcePool, ExternalTextureResource, ResourceId, ResourceKey};
pub use readback::read_external_texture;
pub use reconstructor::NativeBufferReconstructor;
