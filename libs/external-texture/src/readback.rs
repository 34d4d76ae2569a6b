// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pixel readback from opaque external textures.
//!
//! `GL_TEXTURE_EXTERNAL_OES` images cannot be downloaded through the texture
//! API. Attaching one as the color target of a transient read framebuffer
//! and issuing `glReadPixels` works on every driver we care about. The read
//! is followed by `glFinish` so the returned bytes are complete.

use gl::types::{GLenum, GLint, GLuint};

use crate::captured::CapturedTexture;
use crate::config::ReadbackConfig;
use crate::error::{ExternalTextureError, Result};
use crate::format::gl_constants::GL_TEXTURE_EXTERNAL_OES;
use crate::format::{resolve_external, PixelFormatDescriptor};
use crate::gles::{GlStateGuard, GlesApi};

/// Pop pending GL errors, at most `limit` of them.
pub fn drain_errors<G: GlesApi + ?Sized>(gl: &G, limit: u32) -> Vec<GLenum> {
    let mut errors = Vec::new();
    for _ in 0..limit {
        match gl.get_error() {
            gl::NO_ERROR => break,
            error => errors.push(error),
        }
    }
    errors
}

fn format_errors(errors: &[GLenum]) -> String {
    errors
        .iter()
        .map(|e| format!("0x{:04X}", e))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read the current content of external texture `texture`.
///
/// Ambient bindings (external texture, read framebuffer, pixel-pack buffer,
/// pack alignment) are identical before and after the call, on success and
/// on failure.
pub fn read_external_texture<G: GlesApi + ?Sized>(
    gl: &G,
    texture: GLuint,
    config: &ReadbackConfig,
) -> Result<CapturedTexture> {
    if texture == 0 {
        return Err(ExternalTextureError::InvalidArgument(
            "texture name 0 is not an external texture".into(),
        ));
    }

    if config.drain_stale_errors {
        let stale = drain_errors(gl, config.max_error_drain);
        if !stale.is_empty() {
            tracing::warn!(
                "Discarding {} GL error(s) pending before readback of texture {}: {}",
                stale.len(),
                texture,
                format_errors(&stale)
            );
        }
    }

    let guard = GlStateGuard::new(gl);

    gl.bind_texture(GL_TEXTURE_EXTERNAL_OES, texture);
    let width = gl.get_tex_level_parameter(GL_TEXTURE_EXTERNAL_OES, 0, gl::TEXTURE_WIDTH);
    let height = gl.get_tex_level_parameter(GL_TEXTURE_EXTERNAL_OES, 0, gl::TEXTURE_HEIGHT);
    let internal_format =
        gl.get_tex_level_parameter(GL_TEXTURE_EXTERNAL_OES, 0, gl::TEXTURE_INTERNAL_FORMAT)
            as GLenum;

    let format = resolve_external(internal_format).inspect_err(|e| {
        tracing::warn!("Cannot read back external texture {}: {}", texture, e);
    })?;

    if width <= 0 || height <= 0 {
        return Err(ExternalTextureError::InvalidArgument(format!(
            "external texture {} has no storage ({}x{})",
            texture, width, height
        )));
    }
    let (width, height) = (width as u32, height as u32);
    let descriptor = format.descriptor();
    let mut pixels = vec![0u8; descriptor.checked_image_bytes(width, height)?];

    gl.bind_buffer(gl::PIXEL_PACK_BUFFER, 0);

    let framebuffer = gl.gen_framebuffer();
    if framebuffer == 0 {
        return Err(ExternalTextureError::GpuOperationFailed(
            "glGenFramebuffers returned no name".into(),
        ));
    }
    let blit = blit_to_client(gl, framebuffer, texture, width, height, descriptor, &mut pixels);
    gl.delete_framebuffer(framebuffer);

    let errors = drain_errors(gl, config.max_error_drain.max(1));
    drop(guard);
    blit?;

    if !errors.is_empty() {
        return Err(ExternalTextureError::GpuOperationFailed(format!(
            "GL error(s) during readback of texture {}: {}",
            texture,
            format_errors(&errors)
        )));
    }

    tracing::debug!(
        "Read back external texture {} ({}x{} {:?}, {} bytes)",
        texture,
        width,
        height,
        format,
        pixels.len()
    );

    Ok(CapturedTexture {
        width,
        height,
        internal_format,
        pixels,
    })
}

fn blit_to_client<G: GlesApi + ?Sized>(
    gl: &G,
    framebuffer: GLuint,
    texture: GLuint,
    width: u32,
    height: u32,
    descriptor: PixelFormatDescriptor,
    pixels: &mut [u8],
) -> Result<()> {
    gl.bind_framebuffer(gl::READ_FRAMEBUFFER, framebuffer);
    gl.framebuffer_texture_2d(
        gl::READ_FRAMEBUFFER,
        gl::COLOR_ATTACHMENT0,
        GL_TEXTURE_EXTERNAL_OES,
        texture,
        0,
    );

    let status = gl.check_framebuffer_status(gl::READ_FRAMEBUFFER);
    if status != gl::FRAMEBUFFER_COMPLETE {
        return Err(ExternalTextureError::GpuOperationFailed(format!(
            "read framebuffer for texture {} incomplete (status 0x{:04X})",
            texture, status
        )));
    }

    gl.pixel_store(gl::PACK_ALIGNMENT, 1);
    gl.read_pixels(
        0,
        0,
        width as GLint,
        height as GLint,
        descriptor.base_layout,
        gl::UNSIGNED_BYTE,
        pixels,
    )?;
    gl.finish();
    Ok(())
}
