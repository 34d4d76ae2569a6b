// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Internal-format resolution for external textures.
//!
//! An external image reports its internal format through
//! `glGetTexLevelParameteriv(GL_TEXTURE_INTERNAL_FORMAT)`. Only a small set of
//! 8-bit-per-channel formats is supported; everything else is rejected with
//! [`ExternalTextureError::UnsupportedFormat`]. Data is always single-level,
//! single-layer and uncompressed, so the byte size of an image is
//! `width * height * bytes_per_pixel`.

use gl::types::GLenum;

use crate::error::{ExternalTextureError, Result};

/// GLES / OES constants that are not part of the desktop core profile
/// exposed by the `gl` crate.
pub mod gl_constants {
    use gl::types::GLenum;

    /// GL_TEXTURE_EXTERNAL_OES - binding target for external images.
    pub const GL_TEXTURE_EXTERNAL_OES: GLenum = 0x8D65;
    /// GL_TEXTURE_BINDING_EXTERNAL_OES - query for the bound external texture.
    pub const GL_TEXTURE_BINDING_EXTERNAL_OES: GLenum = 0x8D67;
    pub const GL_ALPHA: GLenum = 0x1906;
    pub const GL_LUMINANCE: GLenum = 0x1909;
    pub const GL_LUMINANCE_ALPHA: GLenum = 0x190A;
    pub const GL_ALPHA8: GLenum = 0x803C;
    pub const GL_LUMINANCE8: GLenum = 0x8040;
    pub const GL_LUMINANCE8_ALPHA8: GLenum = 0x8045;
}

use gl_constants::*;

/// The enumerated set of formats an external texture can be captured and
/// reconstructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExternalFormat {
    /// One 8-bit channel (`GL_R8` / `GL_RED`).
    R8,
    /// Two 8-bit channels (`GL_RG8` / `GL_RG`).
    Rg8,
    Rgb8,
    Rgba8,
    /// Legacy single-channel luminance (or alpha-only).
    Luminance8,
    /// Legacy dual-channel luminance + alpha.
    LuminanceAlpha8,
}

impl ExternalFormat {
    /// Map a GL internal format (sized or unsized) to an external format.
    pub fn from_gl_internal_format(internal_format: GLenum) -> Option<Self> {
        match internal_format {
            gl::R8 | gl::RED => Some(Self::R8),
            gl::RG8 | gl::RG => Some(Self::Rg8),
            gl::RGB8 | gl::RGB => Some(Self::Rgb8),
            gl::RGBA8 | gl::RGBA => Some(Self::Rgba8),
            GL_LUMINANCE8 | GL_LUMINANCE | GL_ALPHA8 | GL_ALPHA => Some(Self::Luminance8),
            GL_LUMINANCE8_ALPHA8 | GL_LUMINANCE_ALPHA => Some(Self::LuminanceAlpha8),
            _ => None,
        }
    }

    /// Base channel layout, i.e. the `format` argument for `glReadPixels`.
    pub const fn base_layout(&self) -> GLenum {
        match self {
            Self::R8 => gl::RED,
            Self::Rg8 => gl::RG,
            Self::Rgb8 => gl::RGB,
            Self::Rgba8 => gl::RGBA,
            Self::Luminance8 => GL_LUMINANCE,
            Self::LuminanceAlpha8 => GL_LUMINANCE_ALPHA,
        }
    }

    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::R8 | Self::Luminance8 => 1,
            Self::Rg8 | Self::LuminanceAlpha8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    pub const fn descriptor(&self) -> PixelFormatDescriptor {
        PixelFormatDescriptor {
            base_layout: self.base_layout(),
            bytes_per_pixel: self.bytes_per_pixel(),
        }
    }
}

/// Derived description of a resolved format. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    pub base_layout: GLenum,
    pub bytes_per_pixel: u32,
}

impl PixelFormatDescriptor {
    /// Bytes in one tightly packed row, or `None` if that overflows `usize`.
    pub fn row_bytes(&self, width: u32) -> Option<usize> {
        usize::try_from(width)
            .ok()?
            .checked_mul(self.bytes_per_pixel as usize)
    }

    /// Bytes in a tightly packed single-level, single-layer image, or `None`
    /// if no allocation can hold that many bytes (over `isize::MAX`).
    pub fn image_bytes(&self, width: u32, height: u32) -> Option<usize> {
        self.row_bytes(width)?
            .checked_mul(usize::try_from(height).ok()?)
            .filter(|&bytes| isize::try_from(bytes).is_ok())
    }

    /// [`image_bytes`](Self::image_bytes), failing with `InvalidArgument`
    /// when the size is not addressable.
    pub fn checked_image_bytes(&self, width: u32, height: u32) -> Result<usize> {
        self.image_bytes(width, height).ok_or_else(|| {
            ExternalTextureError::InvalidArgument(format!(
                "{}x{} image of {}-byte pixels exceeds addressable memory",
                width, height, self.bytes_per_pixel
            ))
        })
    }
}

/// Resolve a GL internal format to its base layout and pixel size.
pub fn resolve(internal_format: GLenum) -> Result<PixelFormatDescriptor> {
    resolve_external(internal_format).map(|format| format.descriptor())
}

/// Resolve a GL internal format to the typed [`ExternalFormat`].
pub fn resolve_external(internal_format: GLenum) -> Result<ExternalFormat> {
    ExternalFormat::from_gl_internal_format(internal_format).ok_or_else(|| {
        ExternalTextureError::UnsupportedFormat(format!(
            "GL internal format 0x{:04X}",
            internal_format
        ))
    })
}
