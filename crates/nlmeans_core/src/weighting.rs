//! Weighting functions mapping a patch distance sum to a similarity weight.

use crate::float_trait::NlmFloat;

/// Rescale applied to patch sums of normalized samples so that the filter
/// strength behaves as on an 8-bit scale.
const WEIGHT_NORM: f64 = 255.0 * 255.0;

/// Similarity kernel applied after the vertical summation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeightingFunction {
    /// `exp(-x)`
    #[default]
    Welsch,
    /// `max(0, 1 - x)`
    Bisquare1,
    /// `max(0, 1 - x)^2`
    Bisquare2,
    /// `max(0, 1 - x)^8`
    Bisquare8,
}

/// A weighting function bound to its normalization for one pass.
///
/// `x = sum * scale` with `scale = 255² / (h² · (2S+1)²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightKernel<F: NlmFloat> {
    pub function: WeightingFunction,
    pub scale: F,
}

impl<F: NlmFloat> WeightKernel<F> {
    pub fn new(function: WeightingFunction, strength: F, patch_radius: usize) -> Self {
        let side = 2 * patch_radius + 1;
        let patch_area = F::usize_as(side * side);
        Self {
            function,
            scale: F::from_f64_c(WEIGHT_NORM) / (strength * strength * patch_area),
        }
    }

    /// Weight for a single patch sum.
    #[inline]
    pub fn weight(&self, sum: F) -> F {
        let x = sum * self.scale;
        match self.function {
            WeightingFunction::Welsch => welsch(x),
            WeightingFunction::Bisquare1 => bisquare1(x),
            WeightingFunction::Bisquare2 => bisquare2(x),
            WeightingFunction::Bisquare8 => bisquare8(x),
        }
    }
}

/// `max(1 - x, 0)`.
#[inline(always)]
fn fdim_one<F: NlmFloat>(x: F) -> F {
    (F::one() - x).max(F::zero())
}

#[inline(always)]
pub(crate) fn welsch<F: NlmFloat>(x: F) -> F {
    (-x).exp()
}

#[inline(always)]
pub(crate) fn bisquare1<F: NlmFloat>(x: F) -> F {
    fdim_one(x)
}

#[inline(always)]
pub(crate) fn bisquare2<F: NlmFloat>(x: F) -> F {
    fdim_one(x).powi(2)
}

#[inline(always)]
pub(crate) fn bisquare8<F: NlmFloat>(x: F) -> F {
    fdim_one(x).powi(8)
}
