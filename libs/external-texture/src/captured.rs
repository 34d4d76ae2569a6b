// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Captured pixel content of an external texture.

use gl::types::GLenum;
use serde::{Deserialize, Serialize};

use crate::error::{ExternalTextureError, Result};
use crate::format::{resolve_external, ExternalFormat};

/// Tightly packed rows, no header. The byte length is implied by
/// `width * height * bytes_per_pixel` of `internal_format`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedTexture {
    pub width: u32,
    pub height: u32,
    /// GL internal format reported by the source texture.
    pub internal_format: GLenum,
    pub pixels: Vec<u8>,
}

impl CapturedTexture {
    pub fn format(&self) -> Result<ExternalFormat> {
        resolve_external(self.internal_format)
    }

    /// Bytes the pixel payload must hold for the declared size and format.
    pub fn expected_len(&self) -> Result<usize> {
        self.format()?
            .descriptor()
            .checked_image_bytes(self.width, self.height)
    }

    /// Check dimensions, format and payload length agree.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ExternalTextureError::InvalidArgument(format!(
                "captured texture has empty extent {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.expected_len()?;
        if self.pixels.len() != expected {
            return Err(ExternalTextureError::InvalidArgument(format!(
                "captured {}x{} {:?} holds {} bytes, expected {}",
                self.width,
                self.height,
                self.format()?,
                self.pixels.len(),
                expected
            )));
        }
        Ok(())
    }
}
