// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Recording fakes for the GLES table and the native allocator.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::c_void;
use std::rc::Rc;

use external_texture::error::{ExternalTextureError, Result};
use external_texture::format::gl_constants::{
    GL_TEXTURE_BINDING_EXTERNAL_OES, GL_TEXTURE_EXTERNAL_OES,
};
use external_texture::gles::{check_read_target, BindingState, GlesApi};
use external_texture::native::{
    ClientBufferHandle, ImageHandle, ImportedImage, NativeAllocator, NativeBufferDesc,
    NativeBufferHandle, NativeFormat, NativeUsage,
};
use gl::types::{GLenum, GLint, GLsizei, GLuint};

pub const GL_INVALID_OPERATION: GLenum = 0x0502;
pub const GL_OUT_OF_MEMORY: GLenum = 0x0505;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("external_texture=trace")
        .with_test_writer()
        .try_init();
}

/// `[0, 1, 2, ...]` wrapping at 256.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

// =============================================================================
// Fake GLES
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeTexture {
    pub width: GLint,
    pub height: GLint,
    pub internal_format: GLenum,
    /// Tightly packed rows at the texture's native pixel size.
    pub pixels: Vec<u8>,
    pub bytes_per_pixel: usize,
}

#[derive(Debug, Default)]
pub struct GlState {
    pub external_texture: GLuint,
    pub read_framebuffer: GLuint,
    pub pixel_pack_buffer: GLuint,
    pub pack_alignment: GLint,

    pub textures: HashMap<GLuint, FakeTexture>,
    pub live_framebuffers: HashSet<GLuint>,
    pub attachments: HashMap<GLuint, GLuint>,
    next_framebuffer: GLuint,

    pub errors: VecDeque<GLenum>,
    pub calls: Vec<&'static str>,
    pub read_pixels_calls: usize,
    pub finish_calls: usize,

    pub fail_gen_framebuffer: bool,
    pub force_incomplete: bool,
    pub error_on_read: Option<GLenum>,
}

#[derive(Clone)]
pub struct FakeGles {
    pub state: Rc<RefCell<GlState>>,
}

impl FakeGles {
    pub fn new() -> Self {
        let state = GlState {
            pack_alignment: 4,
            next_framebuffer: 100,
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn add_texture(&self, name: GLuint, width: GLint, height: GLint, internal_format: GLenum) {
        let bytes_per_pixel = match internal_format {
            gl::RGBA8 | gl::RGBA => 4,
            gl::RGB8 | gl::RGB => 3,
            gl::RG8 | gl::RG => 2,
            gl::RGBA16F => 8,
            _ => 1,
        };
        let len = width.max(0) as usize * height.max(0) as usize * bytes_per_pixel;
        self.state.borrow_mut().textures.insert(
            name,
            FakeTexture {
                width,
                height,
                internal_format,
                pixels: pattern(len),
                bytes_per_pixel,
            },
        );
    }

    /// Ambient bindings as the fake sees them.
    pub fn bindings(&self) -> BindingState {
        let state = self.state.borrow();
        BindingState {
            external_texture: state.external_texture,
            read_framebuffer: state.read_framebuffer,
            pixel_pack_buffer: state.pixel_pack_buffer,
            pack_alignment: state.pack_alignment,
        }
    }

    pub fn set_bindings(&self, bindings: BindingState) {
        let mut state = self.state.borrow_mut();
        state.external_texture = bindings.external_texture;
        state.read_framebuffer = bindings.read_framebuffer;
        state.pixel_pack_buffer = bindings.pixel_pack_buffer;
        state.pack_alignment = bindings.pack_alignment;
    }

    fn log(&self, call: &'static str) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl GlesApi for FakeGles {
    fn get_integer(&self, pname: GLenum) -> GLint {
        self.log("glGetIntegerv");
        let state = self.state.borrow();
        match pname {
            GL_TEXTURE_BINDING_EXTERNAL_OES => state.external_texture as GLint,
            gl::READ_FRAMEBUFFER_BINDING => state.read_framebuffer as GLint,
            gl::PIXEL_PACK_BUFFER_BINDING => state.pixel_pack_buffer as GLint,
            gl::PACK_ALIGNMENT => state.pack_alignment,
            _ => 0,
        }
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        self.log("glBindTexture");
        if target == GL_TEXTURE_EXTERNAL_OES {
            self.state.borrow_mut().external_texture = texture;
        }
    }

    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, pname: GLenum) -> GLint {
        self.log("glGetTexLevelParameteriv");
        let state = self.state.borrow();
        if target != GL_TEXTURE_EXTERNAL_OES || level != 0 {
            return 0;
        }
        let Some(texture) = state.textures.get(&state.external_texture) else {
            return 0;
        };
        match pname {
            gl::TEXTURE_WIDTH => texture.width,
            gl::TEXTURE_HEIGHT => texture.height,
            gl::TEXTURE_INTERNAL_FORMAT => texture.internal_format as GLint,
            _ => 0,
        }
    }

    fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
        self.log("glBindBuffer");
        if target == gl::PIXEL_PACK_BUFFER {
            self.state.borrow_mut().pixel_pack_buffer = buffer;
        }
    }

    fn gen_framebuffer(&self) -> GLuint {
        self.log("glGenFramebuffers");
        let mut state = self.state.borrow_mut();
        if state.fail_gen_framebuffer {
            return 0;
        }
        state.next_framebuffer += 1;
        let name = state.next_framebuffer;
        state.live_framebuffers.insert(name);
        name
    }

    fn delete_framebuffer(&self, framebuffer: GLuint) {
        self.log("glDeleteFramebuffers");
        let mut state = self.state.borrow_mut();
        state.live_framebuffers.remove(&framebuffer);
        state.attachments.remove(&framebuffer);
        if state.read_framebuffer == framebuffer {
            state.read_framebuffer = 0;
        }
    }

    fn bind_framebuffer(&self, target: GLenum, framebuffer: GLuint) {
        self.log("glBindFramebuffer");
        if target == gl::READ_FRAMEBUFFER {
            self.state.borrow_mut().read_framebuffer = framebuffer;
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture_target: GLenum,
        texture: GLuint,
        _level: GLint,
    ) {
        self.log("glFramebufferTexture2D");
        let mut state = self.state.borrow_mut();
        if target != gl::READ_FRAMEBUFFER
            || attachment != gl::COLOR_ATTACHMENT0
            || texture_target != GL_TEXTURE_EXTERNAL_OES
        {
            state.errors.push_back(GL_INVALID_OPERATION);
            return;
        }
        let framebuffer = state.read_framebuffer;
        state.attachments.insert(framebuffer, texture);
    }

    fn check_framebuffer_status(&self, _target: GLenum) -> GLenum {
        self.log("glCheckFramebufferStatus");
        let state = self.state.borrow();
        if state.force_incomplete {
            return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
        }
        match state.attachments.get(&state.read_framebuffer) {
            Some(texture) if state.textures.contains_key(texture) => gl::FRAMEBUFFER_COMPLETE,
            _ => gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
        }
    }

    fn pixel_store(&self, pname: GLenum, param: GLint) {
        self.log("glPixelStorei");
        if pname == gl::PACK_ALIGNMENT {
            self.state.borrow_mut().pack_alignment = param;
        }
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
        self.log("glReadPixels");
        let mut state = self.state.borrow_mut();
        state.read_pixels_calls += 1;

        // A bound pack buffer is emulated below as a GL error, like a driver.
        check_read_target(
            format,
            ty,
            width,
            height,
            state.pack_alignment,
            0,
            pixels.len(),
        )?;
        let alignment = state.pack_alignment.max(1) as usize;
        if let Some(error) = state.error_on_read {
            state.errors.push_back(error);
            return Ok(());
        }
        if state.pixel_pack_buffer != 0 {
            state.errors.push_back(GL_INVALID_OPERATION);
            return Ok(());
        }
        let Some(texture) = state
            .attachments
            .get(&state.read_framebuffer)
            .and_then(|name| state.textures.get(name))
            .cloned()
        else {
            state.errors.push_back(GL_INVALID_OPERATION);
            return Ok(());
        };

        let pixel = texture.bytes_per_pixel;
        let row = width as usize * pixel;
        let stride = row.div_ceil(alignment) * alignment;
        let src_stride = texture.width as usize * pixel;
        for r in 0..height as usize {
            let src = (y as usize + r) * src_stride + x as usize * pixel;
            pixels[r * stride..r * stride + row].copy_from_slice(&texture.pixels[src..src + row]);
        }
        Ok(())
    }

    fn finish(&self) {
        self.log("glFinish");
        self.state.borrow_mut().finish_calls += 1;
    }

    fn get_error(&self) -> GLenum {
        self.state
            .borrow_mut()
            .errors
            .pop_front()
            .unwrap_or(gl::NO_ERROR)
    }
}

// =============================================================================
// Fake native allocator
// =============================================================================

#[derive(Debug)]
pub struct FakeBuffer {
    pub desc: NativeBufferDesc,
    pub memory: Vec<u8>,
    pub locked: bool,
}

#[derive(Debug, Default)]
pub struct AllocState {
    /// Stride is `width` rounded up to this many pixels.
    pub stride_alignment: u32,
    pub buffers: HashMap<usize, FakeBuffer>,
    pub images: HashMap<usize, usize>,
    next_handle: usize,

    pub allocations: usize,
    pub releases: usize,
    pub imports: usize,
    pub image_destroys: usize,
    pub locks: usize,
    pub unlocks: usize,

    pub fail_allocate: bool,
    pub fail_import: bool,
    pub fail_lock: bool,
    /// Reported by describe instead of the allocated format.
    pub describe_format_override: Option<NativeFormat>,
}

#[derive(Clone)]
pub struct FakeAllocator {
    pub state: Rc<RefCell<AllocState>>,
}

impl FakeAllocator {
    pub fn with_stride_alignment(stride_alignment: u32) -> Self {
        let state = AllocState {
            stride_alignment: stride_alignment.max(1),
            next_handle: 0x1000,
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.state.borrow().images.len()
    }

    /// Raw memory behind `buffer`.
    pub fn memory(&self, buffer: NativeBufferHandle) -> Vec<u8> {
        self.state.borrow().buffers[&(buffer.as_raw() as usize)]
            .memory
            .clone()
    }

    pub fn stride_of(&self, buffer: NativeBufferHandle) -> u32 {
        self.state.borrow().buffers[&(buffer.as_raw() as usize)]
            .desc
            .stride
    }
}

fn key(buffer: NativeBufferHandle) -> usize {
    buffer.as_raw() as usize
}

// SAFETY: lock hands out the start of a Vec sized `stride * height` pixels
// that is neither resized nor dropped while the buffer is live.
unsafe impl NativeAllocator for FakeAllocator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn allocate(&self, desc: &NativeBufferDesc) -> Result<NativeBufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_allocate {
            return Err(ExternalTextureError::AllocationFailed("injected".into()));
        }
        let pixel = desc.format.bytes_per_pixel().ok_or_else(|| {
            ExternalTextureError::AllocationFailed(format!("fake format {}", desc.format.0))
        })?;
        let stride = desc.width.div_ceil(state.stride_alignment) * state.stride_alignment;
        let len = (stride * desc.height * pixel) as usize;

        state.next_handle += 0x10;
        let handle = state.next_handle;
        state.buffers.insert(
            handle,
            FakeBuffer {
                desc: NativeBufferDesc { stride, ..*desc },
                memory: vec![0xEE; len],
                locked: false,
            },
        );
        state.allocations += 1;
        Ok(NativeBufferHandle::from_raw(handle as *mut c_void))
    }

    fn describe(&self, buffer: NativeBufferHandle) -> Result<NativeBufferDesc> {
        let state = self.state.borrow();
        let fake = state.buffers.get(&key(buffer)).ok_or_else(|| {
            ExternalTextureError::InvalidArgument("describe on unknown buffer".into())
        })?;
        let mut desc = fake.desc;
        if let Some(format) = state.describe_format_override {
            desc.format = format;
        }
        Ok(desc)
    }

    fn lock(&self, buffer: NativeBufferHandle, _usage: NativeUsage) -> Result<*mut u8> {
        let mut state = self.state.borrow_mut();
        if state.fail_lock {
            return Err(ExternalTextureError::LockFailed("injected".into()));
        }
        state.locks += 1;
        let fake = state.buffers.get_mut(&key(buffer)).ok_or_else(|| {
            ExternalTextureError::LockFailed("lock on unknown buffer".into())
        })?;
        assert!(!fake.locked, "buffer locked twice");
        fake.locked = true;
        Ok(fake.memory.as_mut_ptr())
    }

    fn unlock(&self, buffer: NativeBufferHandle) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.unlocks += 1;
        let fake = state.buffers.get_mut(&key(buffer)).ok_or_else(|| {
            ExternalTextureError::LockFailed("unlock on unknown buffer".into())
        })?;
        fake.locked = false;
        Ok(())
    }

    fn release(&self, buffer: NativeBufferHandle) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&key(buffer)).is_some() {
            state.releases += 1;
        }
    }

    fn import_image(&self, buffer: NativeBufferHandle) -> Result<ImportedImage> {
        let mut state = self.state.borrow_mut();
        if state.fail_import {
            return Err(ExternalTextureError::ImportFailed("injected".into()));
        }
        if !state.buffers.contains_key(&key(buffer)) {
            return Err(ExternalTextureError::ImportFailed("unknown buffer".into()));
        }
        state.imports += 1;
        state.next_handle += 0x10;
        let image = state.next_handle;
        state.images.insert(image, key(buffer));
        Ok(ImportedImage {
            client_buffer: ClientBufferHandle::from_raw((key(buffer) + 1) as *mut c_void),
            image: ImageHandle::from_raw(image as *mut c_void),
        })
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state.borrow_mut();
        if state.images.remove(&(image.as_raw() as usize)).is_some() {
            state.image_destroys += 1;
        }
    }
}
