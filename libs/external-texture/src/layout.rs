// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stride-aware row copies between tightly packed buffers and padded native
//! allocations.

use crate::error::{ExternalTextureError, Result};

/// Bytes a strided region of `row_count` rows spans, or `None` if that
/// overflows `usize`. The last row is not required to carry trailing padding.
pub fn strided_extent(row_bytes: usize, stride: usize, row_count: usize) -> Option<usize> {
    match row_count {
        0 => Some(0),
        n => stride.checked_mul(n - 1)?.checked_add(row_bytes),
    }
}

/// Copy `row_count` rows of `row_bytes` each from `src` to `dst`.
///
/// Rows start every `src_stride` bytes in `src` and every `dst_stride` bytes
/// in `dst`. When both strides equal `row_bytes` the copy is a single pass.
/// Padding bytes in `dst` are left untouched.
pub fn copy_rows(
    src: &[u8],
    dst: &mut [u8],
    row_bytes: usize,
    src_stride: usize,
    dst_stride: usize,
    row_count: usize,
) -> Result<()> {
    if src_stride < row_bytes || dst_stride < row_bytes {
        return Err(ExternalTextureError::InvalidLayout(format!(
            "stride smaller than row (row={}, src_stride={}, dst_stride={})",
            row_bytes, src_stride, dst_stride
        )));
    }

    let extents = strided_extent(row_bytes, src_stride, row_count)
        .zip(strided_extent(row_bytes, dst_stride, row_count));
    let Some((src_extent, dst_extent)) = extents else {
        return Err(ExternalTextureError::InvalidLayout(format!(
            "{} rows of stride {}/{} exceed addressable memory",
            row_count, src_stride, dst_stride
        )));
    };
    if src.len() < src_extent || dst.len() < dst_extent {
        return Err(ExternalTextureError::InvalidLayout(format!(
            "{} rows need {} source / {} destination bytes, have {} / {}",
            row_count,
            src_extent,
            dst_extent,
            src.len(),
            dst.len()
        )));
    }

    if src_stride == row_bytes && dst_stride == row_bytes {
        dst[..dst_extent].copy_from_slice(&src[..src_extent]);
        return Ok(());
    }

    for row in 0..row_count {
        let s = row * src_stride;
        let d = row * dst_stride;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
    Ok(())
}
