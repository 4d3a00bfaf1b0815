//! Boundary addressing shared by the pipeline stages.
//!
//! Two policies are in use:
//! - Distance resolves the offset sample `p+q` by reflecting around the last
//!   valid index (`mirror_index`).
//! - The summation passes replicate the edge sample (`clamp_index`).
//!
//! Both are total for any coordinate, so no stage ever reads out of bounds.

/// Reflect `coord` into `[0, dim)` around the first and last valid index.
///
/// For `coord` in `[0, 2·dim − 2]` this is `dim − 1 − |coord − (dim − 1)|`.
/// Negative coordinates reflect around 0, and the pattern repeats with period
/// `2·(dim − 1)` so offsets larger than the frame stay in range.
/// `dim` must be non-zero.
#[inline]
pub fn mirror_index(coord: isize, dim: usize) -> usize {
    if dim <= 1 {
        return 0;
    }
    let last = (dim - 1) as isize;
    let folded = coord.rem_euclid(2 * last);
    (last - (folded - last).abs()) as usize
}

/// Clamp `coord` into `[0, dim)`, replicating the edge sample.
/// `dim` must be non-zero.
#[inline]
pub fn clamp_index(coord: isize, dim: usize) -> usize {
    coord.clamp(0, dim as isize - 1) as usize
}

/// Return `coord` as an index if it lies inside `[0, dim)`.
#[inline]
pub fn checked_index(coord: isize, dim: usize) -> Option<usize> {
    if coord >= 0 && (coord as usize) < dim {
        Some(coord as usize)
    } else {
        None
    }
}
