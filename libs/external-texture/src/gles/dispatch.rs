// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! [`GlesApi`] backed by entry points resolved from the system GLES library.

use gl::types::{GLenum, GLint, GLsizei, GLuint};
use libloading::Library;

use super::{check_read_target, GlesApi};
use crate::error::{ExternalTextureError, Result};

type GetIntegervFn = unsafe extern "system" fn(GLenum, *mut GLint);
type BindTextureFn = unsafe extern "system" fn(GLenum, GLuint);
type GetTexLevelParameterivFn = unsafe extern "system" fn(GLenum, GLint, GLenum, *mut GLint);
type BindBufferFn = unsafe extern "system" fn(GLenum, GLuint);
type GenFramebuffersFn = unsafe extern "system" fn(GLsizei, *mut GLuint);
type DeleteFramebuffersFn = unsafe extern "system" fn(GLsizei, *const GLuint);
type BindFramebufferFn = unsafe extern "system" fn(GLenum, GLuint);
type FramebufferTexture2DFn = unsafe extern "system" fn(GLenum, GLenum, GLenum, GLuint, GLint);
type CheckFramebufferStatusFn = unsafe extern "system" fn(GLenum) -> GLenum;
type PixelStoreiFn = unsafe extern "system" fn(GLenum, GLint);
type ReadPixelsFn = unsafe extern "system" fn(
    GLint,
    GLint,
    GLsizei,
    GLsizei,
    GLenum,
    GLenum,
    *mut std::ffi::c_void,
);
type FinishFn = unsafe extern "system" fn();
type GetErrorFn = unsafe extern "system" fn() -> GLenum;

/// Resolved GLES function table.
///
/// Holds the library open for as long as the table lives, so the resolved
/// pointers never dangle.
pub struct GlesDispatch {
    get_integerv: GetIntegervFn,
    bind_texture: BindTextureFn,
    get_tex_level_parameteriv: GetTexLevelParameterivFn,
    bind_buffer: BindBufferFn,
    gen_framebuffers: GenFramebuffersFn,
    delete_framebuffers: DeleteFramebuffersFn,
    bind_framebuffer: BindFramebufferFn,
    framebuffer_texture_2d: FramebufferTexture2DFn,
    check_framebuffer_status: CheckFramebufferStatusFn,
    pixel_storei: PixelStoreiFn,
    read_pixels: ReadPixelsFn,
    finish: FinishFn,
    get_error: GetErrorFn,
    _library: Library,
}

fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let symbol = format!("{}\0", name);
    // SAFETY: every `T` this is instantiated with is the documented GLES
    // signature of `name`.
    let function = unsafe { library.get::<T>(symbol.as_bytes()) }
        .map_err(|e| ExternalTextureError::Loader(format!("{}: {}", name, e)))?;
    Ok(*function)
}

impl GlesDispatch {
    /// Open `library_path` (e.g. `libGLESv2.so`) and resolve every entry point.
    pub fn load(library_path: &str) -> Result<Self> {
        // SAFETY: loading the platform GLES library runs no initialisers
        // beyond the driver's own.
        let library = unsafe { Library::new(library_path) }.map_err(|e| {
            ExternalTextureError::Loader(format!("Failed to open {}: {}", library_path, e))
        })?;
        let table = Self::from_library(library)?;
        tracing::info!("Resolved GLES entry points from {}", library_path);
        Ok(table)
    }

    fn from_library(library: Library) -> Result<Self> {
        let get_integerv = resolve(&library, "glGetIntegerv")?;
        let bind_texture = resolve(&library, "glBindTexture")?;
        let get_tex_level_parameteriv = resolve(&library, "glGetTexLevelParameteriv")?;
        let bind_buffer = resolve(&library, "glBindBuffer")?;
        let gen_framebuffers = resolve(&library, "glGenFramebuffers")?;
        let delete_framebuffers = resolve(&library, "glDeleteFramebuffers")?;
        let bind_framebuffer = resolve(&library, "glBindFramebuffer")?;
        let framebuffer_texture_2d = resolve(&library, "glFramebufferTexture2D")?;
        let check_framebuffer_status = resolve(&library, "glCheckFramebufferStatus")?;
        let pixel_storei = resolve(&library, "glPixelStorei")?;
        let read_pixels = resolve(&library, "glReadPixels")?;
        let finish = resolve(&library, "glFinish")?;
        let get_error = resolve(&library, "glGetError")?;

        Ok(Self {
            get_integerv,
            bind_texture,
            get_tex_level_parameteriv,
            bind_buffer,
            gen_framebuffers,
            delete_framebuffers,
            bind_framebuffer,
            framebuffer_texture_2d,
            check_framebuffer_status,
            pixel_storei,
            read_pixels,
            finish,
            get_error,
            _library: library,
        })
    }
}

// SAFETY (all methods): the pointers were resolved from the GLES library with
// their documented signatures, and callers hold a current context on this
// thread.
impl GlesApi for GlesDispatch {
    fn get_integer(&self, pname: GLenum) -> GLint {
        let mut value: GLint = 0;
        unsafe { (self.get_integerv)(pname, &mut value) };
        value
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        unsafe { (self.bind_texture)(target, texture) }
    }

    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, pname: GLenum) -> GLint {
        let mut value: GLint = 0;
        unsafe { (self.get_tex_level_parameteriv)(target, level, pname, &mut value) };
        value
    }

    fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
        unsafe { (self.bind_buffer)(target, buffer) }
    }

    fn gen_framebuffer(&self) -> GLuint {
        let mut framebuffer: GLuint = 0;
        unsafe { (self.gen_framebuffers)(1, &mut framebuffer) };
        framebuffer
    }

    fn delete_framebuffer(&self, framebuffer: GLuint) {
        unsafe { (self.delete_framebuffers)(1, &framebuffer) }
    }

    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint) {
        unsafe { (self.bind_framebuffer)(target, framebuffer) }
    }

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture_target: GLenum,
        texture: GLuint,
        level: GLint,
    ) {
        unsafe { (self.framebuffer_texture_2d)(target, attachment, texture_target, texture, level) }
    }

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
        unsafe { (self.check_framebuffer_status)(target) }
    }

    fn pixel_store(&self, pname: GLenum, param: GLint) {
        unsafe { (self.pixel_storei)(pname, param) }
    }

    fn read_pixels(
        &self,
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        ty: GLenum,
        pixels: &mut [u8],
    ) -> Result<()> {
        check_read_target(
            format,
            ty,
            width,
            height,
            self.get_integer(gl::PACK_ALIGNMENT),
            self.get_integer(gl::PIXEL_PACK_BUFFER_BINDING) as GLuint,
            pixels.len(),
        )?;
        unsafe {
            (self.read_pixels)(
                x,
                y,
                width,
                height,
                format,
                ty,
                pixels.as_mut_ptr().cast(),
            )
        };
        Ok(())
    }

    fn finish(&self) {
        unsafe { (self.finish)() }
    }

    fn get_error(&self) -> GLenum {
        unsafe { (self.get_error)() }
    }
}

impl std::fmt::Debug for GlesDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlesDispatch").finish()
    }
}
