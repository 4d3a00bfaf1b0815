//! NLM Core Algorithm Library
//!
//! Non-Local Means denoising for single frames and short temporal stacks.
//! Patch distances are accumulated with a separable box filter, so the cost
//! per search offset is independent of the patch size.
//!
//! A pass runs Pack, then Distance, Horizontal Sum, Vertical Sum and
//! Accumulate for every search offset, then Finish and Unpack.

pub mod accumulation;
pub mod box_filter;
pub mod distance;
pub mod error;
pub mod float_trait;
pub mod format;
pub mod orchestration;
pub mod packing;
pub mod utils;
pub mod weighting;

// Re-export commonly used types at the crate root
pub use accumulation::Accumulators;
pub use box_filter::BoxFilter;
pub use distance::{compute_distance, pixel_distance, Offset};
pub use error::{NlmError, Result};
pub use float_trait::NlmFloat;
pub use format::{HostFrame, PixelEncoding, PlaneBuffer, ReferenceSpace};
pub use orchestration::{denoise_frames, denoise_packed, search_offsets, NlmConfig, NlmPass};
pub use packing::{pack_frame, pack_frames, unpack_frame, PackedFrames};
pub use weighting::{WeightKernel, WeightingFunction};
