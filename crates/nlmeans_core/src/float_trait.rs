//! Float trait abstraction for f32/f64 support.
//!
//! Every pipeline stage is generic over the sample type, so the same code
//! serves the bit-compatible f32 path and an f64 path for reference runs.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;

/// Floating point types supported by the NLM pipeline.
///
/// Combines the bounds every stage needs:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Thread safety for rayon dispatches (Send + Sync)
pub trait NlmFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Widen to f64 for integer conversion.
    fn as_f64(self) -> f64;

    /// Narrow to f32 for float plane output.
    fn as_f32(self) -> f32;
}

impl NlmFloat for f32 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self
    }
}

impl NlmFloat for f64 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self as f32
    }
}
