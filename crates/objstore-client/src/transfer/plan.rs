//! Part planning.

/// Largest part count a multipart upload may have.
pub const MAX_PARTS: u64 = 10_000;

/// One planned part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    /// 1-based part number.
    pub number: u32,
    /// Offset of the first byte in the source.
    pub offset: u64,
    /// Length in bytes.
    pub length: u64,
}

/// Split `size` bytes into parts.
///
/// The part size is `max(min_part_size, ceil(size / 10000))`, the count is
/// `max(1, size / part_size)` and the last part absorbs the remainder, so no part is
/// ever smaller than the minimum except a lone part of a small object.
///
/// # Examples
///
/// ```
/// use objstore_client::transfer::plan_parts;
///
/// let parts = plan_parts(50 * 1024 * 1024, 5 * 1024 * 1024);
/// assert_eq!(parts.len(), 10);
/// assert_eq!(parts[0].number, 1);
/// assert_eq!(parts[9].offset, 45 * 1024 * 1024);
/// ```
#[must_use]
pub fn plan_parts(size: u64, min_part_size: u64) -> Vec<PartPlan> {
    let part_size = min_part_size.max(size.div_ceil(MAX_PARTS)).max(1);
    let count = (size / part_size).max(1);

    (0..count)
        .map(|i| {
            let offset = i * part_size;
            let length = if i + 1 == count {
                size - offset
            } else {
                part_size
            };
            PartPlan {
                // count <= MAX_PARTS, so the number fits.
                number: u32::try_from(i + 1).unwrap_or(u32::MAX),
                offset,
                length,
            }
        })
        .collect()
}
