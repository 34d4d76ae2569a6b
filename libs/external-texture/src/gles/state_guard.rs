// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scoped save/restore of the ambient bindings the readback path touches.

use gl::types::{GLint, GLuint};

use super::GlesApi;
use crate::format::gl_constants::{GL_TEXTURE_BINDING_EXTERNAL_OES, GL_TEXTURE_EXTERNAL_OES};

/// Ambient binding state that readback temporarily overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingState {
    /// External texture bound on the active unit.
    pub external_texture: GLuint,
    pub read_framebuffer: GLuint,
    pub pixel_pack_buffer: GLuint,
    pub pack_alignment: GLint,
}

impl BindingState {
    /// Query the current bindings.
    pub fn capture<G: GlesApi + ?Sized>(gl: &G) -> Self {
        Self {
            external_texture: gl.get_integer(GL_TEXTURE_BINDING_EXTERNAL_OES) as GLuint,
            read_framebuffer: gl.get_integer(gl::READ_FRAMEBUFFER_BINDING) as GLuint,
            pixel_pack_buffer: gl.get_integer(gl::PIXEL_PACK_BUFFER_BINDING) as GLuint,
            pack_alignment: gl.get_integer(gl::PACK_ALIGNMENT),
        }
    }

    /// Rebind everything to the captured values.
    pub fn apply<G: GlesApi + ?Sized>(&self, gl: &G) {
        gl.pixel_store(gl::PACK_ALIGNMENT, self.pack_alignment);
        gl.bind_buffer(gl::PIXEL_PACK_BUFFER, self.pixel_pack_buffer);
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, self.read_framebuffer);
        gl.bind_texture(GL_TEXTURE_EXTERNAL_OES, self.external_texture);
    }
}

/// Restores the captured [`BindingState`] when dropped, including on early
/// `?` returns from the guarded scope.
pub struct GlStateGuard<'a, G: GlesApi + ?Sized> {
    gl: &'a G,
    saved: BindingState,
}

impl<'a, G: GlesApi + ?Sized> GlStateGuard<'a, G> {
    pub fn new(gl: &'a G) -> Self {
        let saved = BindingState::capture(gl);
        tracing::trace!("Saved GL binding state: {:?}", saved);
        Self { gl, saved }
    }

    pub fn saved(&self) -> &BindingState {
        &self.saved
    }
}

impl<G: GlesApi + ?Sized> Drop for GlStateGuard<'_, G> {
    fn drop(&mut self) {
        self.saved.apply(self.gl);
        tracing::trace!("Restored GL binding state: {:?}", self.saved);
    }
}

/// Run `operation` with the ambient bindings restored afterwards, whatever
/// `operation` returns.
pub fn with_restored_state<G, T, F>(gl: &G, operation: F) -> T
where
    G: GlesApi + ?Sized,
    F: FnOnce(&G) -> T,
{
    let _guard = GlStateGuard::new(gl);
    operation(gl)
}
