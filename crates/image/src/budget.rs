//! Target byte-size budget derived from the quality setting.

const MIB: f64 = 1024.0 * 1024.0;

/// Smallest budget handed to the search, 0.01 MiB.
pub const MIN_TARGET_BYTES: u64 = (0.01 * MIB) as u64;

/// Fraction of the original size the output should aim for.
///
/// Lower quality asks for a smaller file, in steps.
pub fn target_ratio(quality: u8) -> f64 {
    match quality {
        0..=30 => 0.1,
        31..=50 => 0.2,
        51..=70 => 0.4,
        71..=85 => 0.6,
        _ => 0.8,
    }
}

/// Byte budget for an original of `original_len` bytes at `quality`.
///
/// # Example
/// ```
/// use slimsnap_image::budget::{target_size_bytes, MIN_TARGET_BYTES};
///
/// assert_eq!(target_size_bytes(1_000_000, 60), 400_000);
/// // Tiny inputs never get a degenerate budget
/// assert_eq!(target_size_bytes(2_000, 20), MIN_TARGET_BYTES);
/// ```
pub fn target_size_bytes(original_len: usize, quality: u8) -> u64 {
    let target = (original_len as f64 * target_ratio(quality)).floor() as u64;
    target.max(MIN_TARGET_BYTES)
}
