//! NLM pass driver
//!
//! Runs one denoising pass over a temporal stack:
//! - Pack host frames (source and optional guide)
//! - For each search offset: Distance → Horizontal → Vertical → Accumulate
//! - Finish and unpack into the centre frame's encoding
//!
//! Every non-zero offset of the `(2D+1) × (2S_search+1)²` window is visited
//! exactly once: only the lexicographically negative half is enumerated and
//! each offset `q` also feeds its mirror `-q` through the backward weight
//! field.

use std::time::Instant;

use ndarray::{Array2, Array3};
use tracing::{debug, info, trace};

use crate::accumulation::Accumulators;
use crate::box_filter::BoxFilter;
use crate::distance::{compute_distance, Offset};
use crate::error::{NlmError, Result};
use crate::float_trait::NlmFloat;
use crate::format::{HostFrame, ReferenceSpace};
use crate::packing::{pack_frames, unpack_frame, PackedFrames};
use crate::weighting::{WeightKernel, WeightingFunction};

// =============================================================================
// Constants
// =============================================================================

/// Default temporal radius D (frames on each side of the centre).
const DEFAULT_TEMPORAL_RADIUS: usize = 1;

/// Default spatial search radius.
const DEFAULT_SEARCH_RADIUS: usize = 2;

/// Default patch radius S.
const DEFAULT_PATCH_RADIUS: usize = 4;

/// Default filter strength h.
const DEFAULT_STRENGTH: f64 = 1.2;

/// Default weight of the centre pixel relative to the best match.
const DEFAULT_REFERENCE_WEIGHT: f64 = 1.0;

const PROFILE_TIMING_ENV: &str = "NLM_PROFILE_TIMING";

// =============================================================================
// Configuration
// =============================================================================

/// Parameters of one denoising pass.
#[derive(Debug, Clone)]
pub struct NlmConfig<F: NlmFloat> {
    /// Temporal radius D; the stack holds `2D+1` frames. Default: 1
    pub temporal_radius: usize,
    /// Spatial search radius. Default: 2
    pub search_radius: usize,
    /// Patch radius S. Default: 4
    pub patch_radius: usize,
    /// Filter strength h. Default: 1.2
    pub strength: F,
    /// Default: Welsch
    pub weighting: WeightingFunction,
    /// Centre pixel weight W_ref, as a multiple of the best match. Default: 1.0
    pub reference_weight: F,
}

impl<F: NlmFloat> Default for NlmConfig<F> {
    fn default() -> Self {
        Self {
            temporal_radius: DEFAULT_TEMPORAL_RADIUS,
            search_radius: DEFAULT_SEARCH_RADIUS,
            patch_radius: DEFAULT_PATCH_RADIUS,
            strength: F::from_f64_c(DEFAULT_STRENGTH),
            weighting: WeightingFunction::default(),
            reference_weight: F::from_f64_c(DEFAULT_REFERENCE_WEIGHT),
        }
    }
}

impl<F: NlmFloat> NlmConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames a pass expects: `2D+1`.
    pub fn num_frames(&self) -> usize {
        2 * self.temporal_radius + 1
    }

    pub fn validate(&self) -> Result<()> {
        if !self.strength.is_finite() || self.strength <= F::zero() {
            return Err(NlmError::InvalidConfig(format!(
                "strength must be finite and > 0, got {:?}",
                self.strength
            )));
        }
        if !self.reference_weight.is_finite() || self.reference_weight <= F::zero() {
            return Err(NlmError::InvalidConfig(format!(
                "reference_weight must be finite and > 0, got {:?}",
                self.reference_weight
            )));
        }
        let kernel = WeightKernel::new(self.weighting, self.strength, self.patch_radius);
        if !kernel.scale.is_finite() {
            return Err(NlmError::InvalidConfig(format!(
                "strength {:?} is too small for patch radius {}",
                self.strength, self.patch_radius
            )));
        }
        Ok(())
    }
}

/// Enumerate the offsets a pass processes, ordered by `dt`, `dy`, `dx`.
///
/// Returns the strictly negative half of the search window; the zero
/// offset and the mirror images are left out.
pub fn search_offsets(temporal_radius: usize, search_radius: usize) -> Vec<Offset> {
    let d = temporal_radius as isize;
    let a = search_radius as isize;
    let mut offsets = Vec::new();
    for dt in -d..=0 {
        for dy in -a..=a {
            for dx in -a..=a {
                if (dt, dy, dx) < (0, 0, 0) {
                    offsets.push(Offset::new(dx, dy, dt));
                }
            }
        }
    }
    offsets
}

// =============================================================================
// Profiling
// =============================================================================

fn resolve_profile_timing() -> bool {
    std::env::var(PROFILE_TIMING_ENV)
        .ok()
        .map(|value| {
            let v = value.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

#[derive(Default, Clone, Copy)]
struct StageStats {
    enabled: bool,
    offsets: u64,
    distance_ns: u128,
    horizontal_ns: u128,
    vertical_ns: u128,
    accumulate_ns: u128,
    finish_ns: u128,
}

/// Run `f`, adding its wall time to `slot` when profiling is on.
fn timed<R>(enabled: bool, slot: &mut u128, f: impl FnOnce() -> R) -> R {
    let started = enabled.then(Instant::now);
    let result = f();
    if let Some(started) = started {
        *slot += started.elapsed().as_nanos();
    }
    result
}

// =============================================================================
// Pass
// =============================================================================

/// Intermediate planes of the distance → weight chain.
struct WeightScratch<F: NlmFloat> {
    distance: Array2<F>,
    partial: Array2<F>,
}

impl<F: NlmFloat> WeightScratch<F> {
    /// Weight field of offset `q` measured on frame `t` of `guide`.
    fn weigh(
        &mut self,
        guide: &PackedFrames<F>,
        t: usize,
        q: Offset,
        filter: &BoxFilter<F>,
        out: &mut Array2<F>,
        stats: &mut StageStats,
    ) {
        let enabled = stats.enabled;
        timed(enabled, &mut stats.distance_ns, || {
            compute_distance(guide, t, q, &mut self.distance)
        });
        timed(enabled, &mut stats.horizontal_ns, || {
            filter.horizontal(self.distance.view(), &mut self.partial)
        });
        timed(enabled, &mut stats.vertical_ns, || {
            filter.vertical(self.partial.view(), out)
        });
    }
}

/// One denoising pass over a `2D+1` frame stack.
///
/// Owns the accumulator arena and all per-offset planes; offsets are fed
/// one at a time with [`NlmPass::process_offset`].
pub struct NlmPass<'a, F: NlmFloat> {
    source: &'a PackedFrames<F>,
    guide: &'a PackedFrames<F>,
    center: usize,
    filter: BoxFilter<F>,
    scratch: WeightScratch<F>,
    forward: Array2<F>,
    backward: Array2<F>,
    accumulators: Accumulators<F>,
    stats: StageStats,
    started: Instant,
}

impl<'a, F: NlmFloat> NlmPass<'a, F> {
    /// Validate the inputs and allocate the pass.
    ///
    /// Distances are measured on `guide` when given, on `source` otherwise.
    pub fn new(
        source: &'a PackedFrames<F>,
        guide: Option<&'a PackedFrames<F>>,
        config: &NlmConfig<F>,
    ) -> Result<Self> {
        config.validate()?;

        if source.num_frames() != config.num_frames() {
            return Err(NlmError::FrameCountMismatch {
                expected: config.num_frames(),
                found: source.num_frames(),
            });
        }

        let guide = guide.unwrap_or(source);
        if guide.num_frames() != source.num_frames() {
            return Err(NlmError::FrameCountMismatch {
                expected: source.num_frames(),
                found: guide.num_frames(),
            });
        }
        if guide.dim() != source.dim() {
            return Err(NlmError::DimensionMismatch {
                expected: source.dim(),
                found: guide.dim(),
            });
        }
        if guide.space() != source.space() {
            return Err(NlmError::UnsupportedFormat(format!(
                "guide space {:?} differs from source space {:?}",
                guide.space(),
                source.space()
            )));
        }

        let (rows, cols) = source.dim();
        let kernel = WeightKernel::new(config.weighting, config.strength, config.patch_radius);
        let stats = StageStats {
            enabled: resolve_profile_timing(),
            ..StageStats::default()
        };

        debug!(
            rows,
            cols,
            frames = source.num_frames(),
            space = ?source.space(),
            patch_radius = config.patch_radius,
            search_radius = config.search_radius,
            weighting = ?config.weighting,
            "starting NLM pass"
        );

        Ok(Self {
            source,
            guide,
            center: config.temporal_radius,
            filter: BoxFilter::new(config.patch_radius, kernel),
            scratch: WeightScratch {
                distance: Array2::zeros((rows, cols)),
                partial: Array2::zeros((rows, cols)),
            },
            forward: Array2::zeros((rows, cols)),
            backward: Array2::zeros((rows, cols)),
            accumulators: Accumulators::new(
                rows,
                cols,
                source.channels(),
                config.reference_weight,
            ),
            stats,
            started: Instant::now(),
        })
    }

    /// Accumulate the pair `(q, -q)`.
    ///
    /// # Panics
    ///
    /// Panics if `q` is the zero offset or if `q.dt` reaches outside the
    /// stack.
    pub fn process_offset(&mut self, q: Offset) {
        assert!(!q.is_zero(), "zero offset is covered by the centre weight");
        assert!(
            q.dt.unsigned_abs() <= self.center,
            "offset frame {} outside temporal radius {}",
            q.dt,
            self.center
        );
        trace!(dx = q.dx, dy = q.dy, dt = q.dt, "processing offset");
        self.stats.offsets += 1;

        self.scratch.weigh(
            self.guide,
            self.center,
            q,
            &self.filter,
            &mut self.forward,
            &mut self.stats,
        );

        // A spatial offset's backward field is measured on the same frame.
        let backward = if q.dt == 0 {
            &self.forward
        } else {
            let t = (self.center as isize - q.dt) as usize;
            self.scratch.weigh(
                self.guide,
                t,
                q,
                &self.filter,
                &mut self.backward,
                &mut self.stats,
            );
            &self.backward
        };

        let (source, center, forward) = (self.source, self.center, &self.forward);
        let accumulators = &mut self.accumulators;
        timed(self.stats.enabled, &mut self.stats.accumulate_ns, || {
            accumulators.accumulate(source, center, forward.view(), backward.view(), q)
        });
    }

    /// Normalize and return the denoised centre frame.
    pub fn finish(mut self) -> Array3<F> {
        let source = self.source;
        let center = source.frame(self.center);
        let accumulators = self.accumulators;
        let output = timed(self.stats.enabled, &mut self.stats.finish_ns, || {
            accumulators.finish(center)
        });

        let stats = self.stats;
        if stats.enabled {
            let ms = |ns: u128| ns as f64 / 1_000_000.0;
            info!(
                offsets = stats.offsets,
                wall_ms = ms(self.started.elapsed().as_nanos()),
                distance_ms = ms(stats.distance_ns),
                horizontal_ms = ms(stats.horizontal_ns),
                vertical_ms = ms(stats.vertical_ns),
                accumulate_ms = ms(stats.accumulate_ns),
                finish_ms = ms(stats.finish_ns),
                "nlm_profile"
            );
        }
        debug!(offsets = stats.offsets, "finished NLM pass");

        output
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Denoise the centre frame of an already packed stack.
pub fn denoise_packed<F: NlmFloat>(
    source: &PackedFrames<F>,
    guide: Option<&PackedFrames<F>>,
    config: &NlmConfig<F>,
) -> Result<Array3<F>> {
    let mut pass = NlmPass::new(source, guide, config)?;
    for q in search_offsets(config.temporal_radius, config.search_radius) {
        pass.process_offset(q);
    }
    Ok(pass.finish())
}

/// Pack, denoise and unpack the centre frame of a host frame stack.
///
/// The output uses the centre frame's encoding.
pub fn denoise_frames<F: NlmFloat>(
    frames: &[HostFrame],
    guide: Option<&[HostFrame]>,
    space: ReferenceSpace,
    config: &NlmConfig<F>,
) -> Result<HostFrame> {
    config.validate()?;
    if frames.len() != config.num_frames() {
        return Err(NlmError::FrameCountMismatch {
            expected: config.num_frames(),
            found: frames.len(),
        });
    }
    let encoding = frames[config.temporal_radius].encoding;

    let source = pack_frames::<F>(frames, space)?;
    let guide = guide
        .map(|guide| pack_frames::<F>(guide, space))
        .transpose()?;

    let output = denoise_packed(&source, guide.as_ref(), config)?;
    unpack_frame(output.view(), encoding)
}
