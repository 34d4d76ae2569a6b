// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Android implementation: `AHardwareBuffer` allocations imported as
//! `EGLImageKHR` through `EGL_ANDROID_get_native_client_buffer`.

use std::ffi::c_void;

use khronos_egl as egl;

use super::{
    ClientBufferHandle, ImageHandle, ImportedImage, NativeAllocator, NativeBufferDesc,
    NativeBufferHandle, NativeFormat, NativeUsage,
};
use crate::error::{ExternalTextureError, Result};

// =============================================================================
// FFI Bindings
// =============================================================================

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct AHardwareBufferDesc {
    width: u32,
    height: u32,
    layers: u32,
    format: u32,
    usage: u64,
    stride: u32,
    rfu0: u32,
    rfu1: u64,
}

#[repr(C)]
struct ARect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

// AHardwareBuffer_* live in libnativewindow (API 26+), not libandroid.
#[link(name = "nativewindow")]
unsafe extern "C" {
    fn AHardwareBuffer_allocate(desc: *const AHardwareBufferDesc, out: *mut *mut c_void) -> i32;
    fn AHardwareBuffer_describe(buffer: *const c_void, out: *mut AHardwareBufferDesc);
    fn AHardwareBuffer_lock(
        buffer: *mut c_void,
        usage: u64,
        fence: i32,
        rect: *const ARect,
        out_virtual_address: *mut *mut c_void,
    ) -> i32;
    fn AHardwareBuffer_unlock(buffer: *mut c_void, fence: *mut i32) -> i32;
    fn AHardwareBuffer_release(buffer: *mut c_void);
}

// EGL extension entry points, resolved through eglGetProcAddress.
type GetNativeClientBufferFn = unsafe extern "system" fn(*const c_void) -> *mut c_void;
type CreateImageKhrFn = unsafe extern "system" fn(
    egl::EGLDisplay,
    egl::EGLContext,
    egl::Enum,
    egl::EGLClientBuffer,
    *const egl::Int,
) -> egl::EGLImage;
type DestroyImageKhrFn = unsafe extern "system" fn(egl::EGLDisplay, egl::EGLImage) -> egl::Boolean;

const EGL_NATIVE_BUFFER_ANDROID: egl::Enum = 0x3140;

// =============================================================================
// EGL import bridge
// =============================================================================

struct EglImageBridge {
    egl: egl::DynamicInstance<egl::EGL1_4>,
    get_native_client_buffer: GetNativeClientBufferFn,
    create_image: CreateImageKhrFn,
    destroy_image: DestroyImageKhrFn,
}

impl EglImageBridge {
    fn load(library_path: &str) -> Result<Self> {
        // SAFETY: loads the platform EGL library; no initialisers beyond the
        // driver's own.
        let egl = unsafe {
            egl::DynamicInstance::<egl::EGL1_4>::load_required_from_filename(library_path)
        }
        .map_err(|e| {
            ExternalTextureError::Loader(format!("Failed to load {}: {}", library_path, e))
        })?;

        let proc = |name: &str| {
            egl.get_proc_address(name)
                .ok_or_else(|| ExternalTextureError::Loader(format!("{} not available", name)))
        };

        // SAFETY: each entry point is transmuted to its documented signature.
        let (get_native_client_buffer, create_image, destroy_image) = unsafe {
            (
                std::mem::transmute::<extern "system" fn(), GetNativeClientBufferFn>(proc(
                    "eglGetNativeClientBufferANDROID",
                )?),
                std::mem::transmute::<extern "system" fn(), CreateImageKhrFn>(proc(
                    "eglCreateImageKHR",
                )?),
                std::mem::transmute::<extern "system" fn(), DestroyImageKhrFn>(proc(
                    "eglDestroyImageKHR",
                )?),
            )
        };

        Ok(Self {
            egl,
            get_native_client_buffer,
            create_image,
            destroy_image,
        })
    }

    fn current_display(&self) -> Result<egl::EGLDisplay> {
        self.egl
            .get_current_display()
            .map(|display| display.as_ptr())
            .ok_or_else(|| {
                ExternalTextureError::ImportFailed("no EGL display is current".into())
            })
    }

    fn import(&self, buffer: NativeBufferHandle) -> Result<ImportedImage> {
        let display = self.current_display()?;

        // SAFETY: `buffer` is a live AHardwareBuffer owned by the caller.
        let client_buffer = unsafe { (self.get_native_client_buffer)(buffer.as_raw()) };
        if client_buffer.is_null() {
            return Err(ExternalTextureError::ImportFailed(
                "eglGetNativeClientBufferANDROID returned null".into(),
            ));
        }

        let attributes = [egl::NONE];
        // SAFETY: display is current; attribute list is EGL_NONE-terminated.
        let image = unsafe {
            (self.create_image)(
                display,
                egl::NO_CONTEXT,
                EGL_NATIVE_BUFFER_ANDROID,
                client_buffer,
                attributes.as_ptr(),
            )
        };
        if image.is_null() {
            let error = self.egl.get_error();
            return Err(ExternalTextureError::ImportFailed(format!(
                "eglCreateImageKHR failed: {:?}",
                error
            )));
        }

        Ok(ImportedImage {
            client_buffer: ClientBufferHandle::from_raw(client_buffer),
            image: ImageHandle::from_raw(image),
        })
    }

    fn destroy(&self, image: ImageHandle) {
        if image.is_null() {
            return;
        }
        let Ok(display) = self.current_display() else {
            tracing::warn!("No current EGL display, leaking EGLImage {:?}", image.as_raw());
            return;
        };
        // SAFETY: `image` was created by `import` on this display.
        let ok = unsafe { (self.destroy_image)(display, image.as_raw()) };
        if ok == egl::FALSE {
            tracing::warn!("eglDestroyImageKHR failed for {:?}", image.as_raw());
        }
    }
}

// =============================================================================
// AHardwareBuffer allocator
// =============================================================================

/// `AHardwareBuffer` allocator with EGL image import.
pub struct HardwareBufferAllocator {
    bridge: EglImageBridge,
}

impl HardwareBufferAllocator {
    pub fn new(egl_library: &str) -> Result<Self> {
        let bridge = EglImageBridge::load(egl_library)?;
        tracing::info!("AHardwareBuffer allocator ready (EGL from {})", egl_library);
        Ok(Self { bridge })
    }
}

// SAFETY: AHardwareBuffer_lock maps the whole buffer, which spans
// `stride * height` pixels.
unsafe impl NativeAllocator for HardwareBufferAllocator {
    fn name(&self) -> &'static str {
        "ahardwarebuffer"
    }

    fn allocate(&self, desc: &NativeBufferDesc) -> Result<NativeBufferHandle> {
        let request = AHardwareBufferDesc {
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            format: desc.format.0,
            usage: desc.usage.bits(),
            ..Default::default()
        };
        let mut buffer: *mut c_void = std::ptr::null_mut();
        // SAFETY: request is fully initialised; out-pointer is valid.
        let status = unsafe { AHardwareBuffer_allocate(&request, &mut buffer) };
        if status != 0 || buffer.is_null() {
            return Err(ExternalTextureError::AllocationFailed(format!(
                "AHardwareBuffer_allocate({}x{} format {}) failed with {}",
                desc.width, desc.height, desc.format.0, status
            )));
        }
        Ok(NativeBufferHandle::from_raw(buffer))
    }

    fn describe(&self, buffer: NativeBufferHandle) -> Result<NativeBufferDesc> {
        if buffer.is_null() {
            return Err(ExternalTextureError::InvalidArgument(
                "describe on null AHardwareBuffer".into(),
            ));
        }
        let mut out = AHardwareBufferDesc::default();
        // SAFETY: buffer is live; out is a valid descriptor.
        unsafe { AHardwareBuffer_describe(buffer.as_raw(), &mut out) };
        Ok(NativeBufferDesc {
            width: out.width,
            height: out.height,
            layers: out.layers,
            format: NativeFormat(out.format),
            usage: NativeUsage::from_bits_retain(out.usage),
            stride: out.stride,
        })
    }

    fn lock(&self, buffer: NativeBufferHandle, usage: NativeUsage) -> Result<*mut u8> {
        let mut address: *mut c_void = std::ptr::null_mut();
        // SAFETY: buffer is live; no fence, whole-buffer rect.
        let status = unsafe {
            AHardwareBuffer_lock(
                buffer.as_raw(),
                usage.bits(),
                -1,
                std::ptr::null(),
                &mut address,
            )
        };
        if status != 0 || address.is_null() {
            return Err(ExternalTextureError::LockFailed(format!(
                "AHardwareBuffer_lock failed with {}",
                status
            )));
        }
        Ok(address.cast())
    }

    fn unlock(&self, buffer: NativeBufferHandle) -> Result<()> {
        // SAFETY: buffer is live and locked by this thread.
        let status = unsafe { AHardwareBuffer_unlock(buffer.as_raw(), std::ptr::null_mut()) };
        if status != 0 {
            return Err(ExternalTextureError::LockFailed(format!(
                "AHardwareBuffer_unlock failed with {}",
                status
            )));
        }
        Ok(())
    }

    fn release(&self, buffer: NativeBufferHandle) {
        if buffer.is_null() {
            return;
        }
        // SAFETY: drops the reference taken by AHardwareBuffer_allocate.
        unsafe { AHardwareBuffer_release(buffer.as_raw()) };
    }

    fn import_image(&self, buffer: NativeBufferHandle) -> Result<ImportedImage> {
        self.bridge.import(buffer)
    }

    fn destroy_image(&self, image: ImageHandle) {
        self.bridge.destroy(image);
    }
}
