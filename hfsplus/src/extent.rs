//! Maps a logical byte offset within a forked file to an image offset, by
//! walking an ordered extent list.

use crate::error::{HfsPlusError, Result};
use crate::volume::ExtentDescriptor;

/// Locate the image byte offset for `logical_offset` bytes into a fork whose
/// allocation blocks are `block_size` bytes each and whose extents are given
/// in `extents` (inline extents followed by any resolved overflow extents).
///
/// Returns `(image_offset, extent_remaining)`: the absolute byte offset in
/// the image, and the number of bytes left in the extent that covers it.
/// Zero-length extents are skipped. Fails with `OutOfRange` once
/// `logical_offset` exceeds the sum of all extent sizes.
pub fn locate(
    logical_offset: u64,
    extents: &[ExtentDescriptor],
    block_size: u32,
) -> Result<(u64, u64)> {
    let block_size = block_size as u64;
    let mut remaining = logical_offset;

    for extent in extents {
        if extent.block_count == 0 {
            continue;
        }
        let extent_bytes = extent.block_count as u64 * block_size;
        if remaining < extent_bytes {
            let blocks_in = remaining / block_size;
            let offset_in_block = remaining % block_size;
            let absolute_block = extent.start_block as u64 + blocks_in;
            let image_offset = absolute_block
                .checked_mul(block_size)
                .and_then(|v| v.checked_add(offset_in_block))
                .ok_or_else(|| HfsPlusError::OutOfRange("image offset overflow".to_string()))?;
            if image_offset > i64::MAX as u64 {
                return Err(HfsPlusError::OutOfRange(
                    "image offset exceeds i64::MAX".to_string(),
                ));
            }
            return Ok((image_offset, extent_bytes - remaining));
        }
        remaining -= extent_bytes;
    }

    Err(HfsPlusError::OutOfRange(format!(
        "logical offset {logical_offset} exceeds extent capacity"
    )))
}
