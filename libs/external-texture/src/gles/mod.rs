// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GLES capability table.
//!
//! Every GL call this crate makes goes through [`GlesApi`]. The table is
//! resolved once ([`GlesDispatch::load`]) and passed by reference into the
//! readback path; there are no process-global function pointers.
//!
//! All methods must be called on the thread that owns the current context.

mod dispatch;
mod state_guard;

pub use dispatch::GlesDispatch;
pub use state_guard::{with_restored_state, BindingState, GlStateGuard};

use gl::types::{GLenum, GLint, GLsizei, GLuint};

use crate::error::{ExternalTextureError, Result};
use crate::format::gl_constants::{GL_ALPHA, GL_LUMINANCE, GL_LUMINANCE_ALPHA};

/// GLES entry points used to read back external textures.
pub trait GlesApi {
    /// `glGetIntegerv` for a single-valued parameter.
    fn get_integer(&self, pname: GLenum) -> GLint;

    fn bind_texture(&self, target: GLenum, texture: GLuint);

    /// `glGetTexLevelParameteriv` for a single-valued parameter.
    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, pname: GLenum) -> GLint;

    fn bind_buffer(&self, target: GLenum, buffer: GLuint);

    /// `glGenFramebuffers(1, ..)`.
    fn gen_framebuffer(&self) -> GLuint;

    /// `glDeleteFramebuffers(1, ..)`.
    fn delete_framebuffer(&self, framebuffer: GLuint);

    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint);

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture_target: GLenum,
        texture: GLuint,
        level: GLint,
    );

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum;

    /// `glPixelStorei`.
    fn pixel_store(&self, pname: GLenum, param: GLint);

    /// `glReadPixels` into client memory.
    ///
    /// Implementations must refuse (without issuing the call) when `pixels`
    /// is smaller than the region under the current pack alignment.
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        pixels: &mut [u8],
    ) -> Result<()>;

    /// `glFinish` - blocks until all previously issued commands complete.
    fn finish(&self);

    fn get_error(&self) -> GLenum;
}

/// Bytes per pixel for a `glReadPixels` format with `GL_UNSIGNED_BYTE`.
pub fn packed_pixel_bytes(format: GLenum, ty: GLenum) -> Option<usize> {
    if ty != gl::UNSIGNED_BYTE {
        return None;
    }
    match format {
        gl::RED | GL_LUMINANCE | GL_ALPHA => Some(1),
        gl::RG | GL_LUMINANCE_ALPHA => Some(2),
        gl::RGB => Some(3),
        gl::RGBA => Some(4),
        _ => None,
    }
}

/// Client-memory bytes `glReadPixels` writes for a `width` x `height` region
/// under pack alignment `alignment`. `None` for formats outside
/// [`packed_pixel_bytes`] or sizes that overflow `usize`.
pub fn packed_image_bytes(
    format: GLenum,
    ty: GLenum,
    width: usize,
    height: usize,
    alignment: usize,
) -> Option<usize> {
    let pixel = packed_pixel_bytes(format, ty)?;
    let row = width.checked_mul(pixel)?;
    let alignment = alignment.max(1);
    let stride = row.div_ceil(alignment).checked_mul(alignment)?;
    crate::layout::strided_extent(row, stride, height)
}

/// Validate a client-memory `glReadPixels` target before the call is issued.
///
/// `available` is the length of the destination slice; `pixel_pack_buffer`
/// is the current `GL_PIXEL_PACK_BUFFER_BINDING`, which must be 0 or the
/// driver would treat the destination pointer as a buffer offset.
pub fn check_read_target(
    format: GLenum,
    ty: GLenum,
    width: GLsizei,
    height: GLsizei,
    alignment: GLint,
    pixel_pack_buffer: GLuint,
    available: usize,
) -> Result<()> {
    let (Ok(w), Ok(h)) = (usize::try_from(width), usize::try_from(height)) else {
        return Err(ExternalTextureError::InvalidArgument(format!(
            "negative read region {}x{}",
            width, height
        )));
    };
    if packed_pixel_bytes(format, ty).is_none() {
        return Err(ExternalTextureError::UnsupportedFormat(format!(
            "readback format 0x{:04X} / type 0x{:04X}",
            format, ty
        )));
    }
    let alignment = usize::try_from(alignment).unwrap_or(1);
    let required = packed_image_bytes(format, ty, w, h, alignment).ok_or_else(|| {
        ExternalTextureError::InvalidArgument(format!(
            "read region {}x{} exceeds addressable memory",
            width, height
        ))
    })?;
    if available < required {
        return Err(ExternalTextureError::InvalidArgument(format!(
            "readback needs {} bytes, buffer has {}",
            required, available
        )));
    }
    if pixel_pack_buffer != 0 {
        return Err(ExternalTextureError::InvalidArgument(format!(
            "pixel-pack buffer {} bound during client-memory readback",
            pixel_pack_buffer
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_image_bytes_alignment() {
        // RGB 3x2: 9-byte rows.
        assert_eq!(packed_image_bytes(gl::RGB, gl::UNSIGNED_BYTE, 3, 2, 1), Some(18));
        // Default alignment of 4 pads the first row to 12.
        assert_eq!(packed_image_bytes(gl::RGB, gl::UNSIGNED_BYTE, 3, 2, 4), Some(21));
        assert_eq!(packed_image_bytes(gl::RGBA, gl::UNSIGNED_BYTE, 3, 2, 4), Some(24));
    }

    #[test]
    fn test_packed_pixel_bytes_rejects_other_types() {
        assert_eq!(packed_pixel_bytes(gl::RGBA, gl::FLOAT), None);
        assert_eq!(packed_pixel_bytes(gl::DEPTH_COMPONENT, gl::UNSIGNED_BYTE), None);
    }

    #[test]
    fn test_packed_image_bytes_overflow() {
        let huge = usize::MAX / 2;
        assert_eq!(packed_image_bytes(gl::RGBA, gl::UNSIGNED_BYTE, huge, 2, 1), None);
        assert_eq!(packed_image_bytes(gl::RGB, gl::UNSIGNED_BYTE, 1, usize::MAX, 8), None);
    }

    #[test]
    fn test_check_read_target_accepts_exact_buffer() {
        check_read_target(gl::RGB, gl::UNSIGNED_BYTE, 3, 2, 1, 0, 18).unwrap();
        check_read_target(gl::RGB, gl::UNSIGNED_BYTE, 3, 2, 4, 0, 21).unwrap();
        check_read_target(gl::RGBA, gl::UNSIGNED_BYTE, 0, 0, 4, 0, 0).unwrap();
    }

    #[test]
    fn test_check_read_target_rejects_short_buffer_under_alignment() {
        // Tight 18 bytes is not enough once rows are padded to 4.
        let err = check_read_target(gl::RGB, gl::UNSIGNED_BYTE, 3, 2, 4, 0, 18).unwrap_err();
        assert!(matches!(err, ExternalTextureError::InvalidArgument(_)));
    }

    #[test]
    fn test_check_read_target_rejects_bound_pack_buffer() {
        let err = check_read_target(gl::RGBA, gl::UNSIGNED_BYTE, 2, 2, 1, 7, 16).unwrap_err();
        assert!(matches!(err, ExternalTextureError::InvalidArgument(_)));
    }

    #[test]
    fn test_check_read_target_rejects_negative_and_unknown() {
        let err = check_read_target(gl::RGBA, gl::UNSIGNED_BYTE, -1, 2, 1, 0, 64).unwrap_err();
        assert!(matches!(err, ExternalTextureError::InvalidArgument(_)));

        let err = check_read_target(gl::RGBA, gl::FLOAT, 2, 2, 1, 0, 64).unwrap_err();
        assert!(matches!(err, ExternalTextureError::UnsupportedFormat(_)));
    }
}
