// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalTextureError {
    /// Internal or native pixel format outside the supported set.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Rejected before any native call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Native allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Image import failed: {0}")]
    ImportFailed(String),

    #[error("GPU operation failed: {0}")]
    GpuOperationFailed(String),

    /// No native allocator exists for this build target (or it was disabled).
    #[error("Operation not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to lock native allocation for CPU access: {0}")]
    LockFailed(String),

    #[error("Invalid memory layout: {0}")]
    InvalidLayout(String),

    /// A shared library or entry point could not be resolved.
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ExternalTextureError>;
