//! Separable box filter: horizontal and vertical patch summation.
//!
//! The two passes turn the per-pixel distance term into the sum over a
//! `(2S+1) x (2S+1)` patch in O(S) work per pixel. The vertical pass also
//! converts the sum into a similarity weight.
//!
//! Each work group stages its input line segment, with an `S`-wide apron on
//! either side, into a private scratch buffer before any window is summed.
//! `TileScratch::stage` is the fill phase; the returned `StagedTile` borrow
//! is the only way to read the buffer, so reads cannot precede the fill.
//! Window lookups outside the frame replicate the edge sample.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::float_trait::NlmFloat;
use crate::utils::clamp_index;
use crate::weighting::{bisquare1, bisquare2, bisquare8, welsch, WeightKernel, WeightingFunction};

/// Outputs produced per staged tile.
const SUM_TILE_LEN: usize = 128;
const SUM_TILE_LEN_ENV: &str = "NLM_SUM_TILE_LEN";

/// Resolve the summation tile length from environment with a safe fallback.
fn resolve_sum_tile_len() -> usize {
    std::env::var(SUM_TILE_LEN_ENV)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(SUM_TILE_LEN)
}

/// Fixed-size scratch owned by one work group.
#[derive(Debug)]
pub struct TileScratch<F: NlmFloat> {
    samples: Vec<F>,
    tile_len: usize,
    radius: usize,
}

/// A filled tile. Holds the scratch borrow for the whole read phase.
#[derive(Debug)]
pub struct StagedTile<'a, F: NlmFloat> {
    samples: &'a [F],
    radius: usize,
}

impl<F: NlmFloat> TileScratch<F> {
    pub fn new(tile_len: usize, radius: usize) -> Self {
        Self {
            samples: vec![F::zero(); tile_len + 2 * radius],
            tile_len,
            radius,
        }
    }

    /// Fill phase: copy line positions `[start - S, start + len + S)` through
    /// `fetch`, which receives the unclamped position.
    pub fn stage<G>(&mut self, start: usize, len: usize, fetch: G) -> StagedTile<'_, F>
    where
        G: Fn(isize) -> F,
    {
        assert!(len <= self.tile_len, "tile of {} exceeds scratch", len);
        let span = len + 2 * self.radius;
        let origin = start as isize - self.radius as isize;
        for (i, slot) in self.samples[..span].iter_mut().enumerate() {
            *slot = fetch(origin + i as isize);
        }
        StagedTile {
            samples: &self.samples[..span],
            radius: self.radius,
        }
    }
}

impl<F: NlmFloat> StagedTile<'_, F> {
    /// Number of outputs this tile covers.
    pub fn len(&self) -> usize {
        self.samples.len() - 2 * self.radius
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the `2S+1` samples centred on tile output `i`.
    #[inline]
    pub fn window_sum(&self, i: usize) -> F {
        self.samples[i..=i + 2 * self.radius]
            .iter()
            .fold(F::zero(), |acc, &v| acc + v)
    }
}

/// Horizontal and vertical summation passes for one patch radius.
#[derive(Debug, Clone, Copy)]
pub struct BoxFilter<F: NlmFloat> {
    radius: usize,
    tile_len: usize,
    kernel: WeightKernel<F>,
}

impl<F: NlmFloat> BoxFilter<F> {
    pub fn new(radius: usize, kernel: WeightKernel<F>) -> Self {
        Self {
            radius,
            tile_len: resolve_sum_tile_len(),
            kernel,
        }
    }

    /// Override the staged tile length (minimum 1).
    pub fn with_tile_len(mut self, tile_len: usize) -> Self {
        self.tile_len = tile_len.max(1);
        self
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn kernel(&self) -> &WeightKernel<F> {
        &self.kernel
    }

    /// Pass 1: each output is the sum of `2S+1` horizontally adjacent inputs.
    pub fn horizontal(&self, input: ArrayView2<F>, out: &mut Array2<F>) {
        assert_eq!(input.dim(), out.dim(), "horizontal pass shape");
        let cols = input.ncols();
        let (tile_len, radius) = (self.tile_len, self.radius);

        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(input.axis_iter(Axis(0)).into_par_iter())
            .for_each_init(
                || TileScratch::new(tile_len, radius),
                |scratch, (mut out_row, in_row)| {
                    for start in (0..cols).step_by(tile_len) {
                        let len = tile_len.min(cols - start);
                        let staged = scratch.stage(start, len, |i| in_row[clamp_index(i, cols)]);
                        for i in 0..staged.len() {
                            out_row[start + i] = staged.window_sum(i);
                        }
                    }
                },
            );
    }

    /// Pass 2: vertical window sum of the pass-1 output, mapped to a weight.
    pub fn vertical(&self, input: ArrayView2<F>, out: &mut Array2<F>) {
        let scale = self.kernel.scale;
        match self.kernel.function {
            WeightingFunction::Welsch => self.vertical_pass(input, out, move |s| welsch(s * scale)),
            WeightingFunction::Bisquare1 => {
                self.vertical_pass(input, out, move |s| bisquare1(s * scale))
            }
            WeightingFunction::Bisquare2 => {
                self.vertical_pass(input, out, move |s| bisquare2(s * scale))
            }
            WeightingFunction::Bisquare8 => {
                self.vertical_pass(input, out, move |s| bisquare8(s * scale))
            }
        }
    }

    /// Pass 2 without the weighting function: the raw patch distance sum.
    pub fn vertical_patch_sum(&self, input: ArrayView2<F>, out: &mut Array2<F>) {
        self.vertical_pass(input, out, |s| s);
    }

    fn vertical_pass<M>(&self, input: ArrayView2<F>, out: &mut Array2<F>, map: M)
    where
        M: Fn(F) -> F + Sync,
    {
        assert_eq!(input.dim(), out.dim(), "vertical pass shape");
        let (rows, cols) = input.dim();
        let (tile_len, radius) = (self.tile_len, self.radius);

        out.axis_chunks_iter_mut(Axis(0), tile_len)
            .into_par_iter()
            .enumerate()
            .for_each_init(
                || TileScratch::new(tile_len, radius),
                |scratch, (band_idx, mut band)| {
                    let start = band_idx * tile_len;
                    let len = band.nrows();
                    for x in 0..cols {
                        let column = input.column(x);
                        let staged = scratch.stage(start, len, |i| column[clamp_index(i, rows)]);
                        for i in 0..staged.len() {
                            band[[i, x]] = map(staged.window_sum(i));
                        }
                    }
                },
            );
    }
}
