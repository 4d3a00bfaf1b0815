//! Distance stage: per-pixel squared difference between `p` and `p+q`.
//!
//! The value written here is the single-pixel term only. The summation
//! passes in `box_filter` turn it into a patch distance.

use ndarray::{Array2, ArrayView3, Zip};
use std::ops::Neg;

use crate::float_trait::NlmFloat;
use crate::format::ReferenceSpace;
use crate::packing::PackedFrames;
use crate::utils::mirror_index;

/// One search-window displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    pub dx: isize,
    pub dy: isize,
    /// Frame displacement, 0 for spatial-only offsets.
    pub dt: isize,
}

impl Offset {
    pub const fn new(dx: isize, dy: isize, dt: isize) -> Self {
        Self { dx, dy, dt }
    }

    pub const fn spatial(dx: isize, dy: isize) -> Self {
        Self { dx, dy, dt: 0 }
    }

    pub const fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0 && self.dt == 0
    }
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        Offset::new(-self.dx, -self.dy, -self.dt)
    }
}

/// Up to three channels of one pixel, unused channels left at zero.
pub type Pixel<F> = [F; 3];

#[inline(always)]
fn load<F: NlmFloat>(frame: &ArrayView3<F>, y: usize, x: usize, channels: usize) -> Pixel<F> {
    let mut px = [F::zero(); 3];
    for (c, v) in px.iter_mut().enumerate().take(channels) {
        *v = frame[[y, x, c]];
    }
    px
}

#[inline(always)]
fn sq<F: NlmFloat>(v: F) -> F {
    v * v
}

/// Reference-space weighted squared difference of two pixels.
///
/// Symmetric in its arguments for every space.
#[inline]
pub fn pixel_distance<F: NlmFloat>(space: ReferenceSpace, a: &Pixel<F>, b: &Pixel<F>) -> F {
    match space {
        ReferenceSpace::Luma => luma_distance(a, b),
        ReferenceSpace::Chroma => chroma_distance(a, b),
        ReferenceSpace::Yuv => yuv_distance(a, b),
        ReferenceSpace::Rgb => rgb_distance(a, b),
    }
}

#[inline(always)]
fn luma_distance<F: NlmFloat>(a: &Pixel<F>, b: &Pixel<F>) -> F {
    F::from_f64_c(3.0) * sq(a[0] - b[0])
}

#[inline(always)]
fn chroma_distance<F: NlmFloat>(a: &Pixel<F>, b: &Pixel<F>) -> F {
    F::from_f64_c(1.5) * (sq(a[0] - b[0]) + sq(a[1] - b[1]))
}

#[inline(always)]
fn yuv_distance<F: NlmFloat>(a: &Pixel<F>, b: &Pixel<F>) -> F {
    sq(a[0] - b[0]) + sq(a[1] - b[1]) + sq(a[2] - b[2])
}

/// Red-mean weighted RGB distance. `m` is the pair's red sum over six.
#[inline(always)]
fn rgb_distance<F: NlmFloat>(a: &Pixel<F>, b: &Pixel<F>) -> F {
    let m_red = (a[0] + b[0]) / F::from_f64_c(6.0);
    let dst_r = (F::from_f64_c(2.0 / 3.0) + m_red) * sq(a[0] - b[0]);
    let dst_g = F::from_f64_c(4.0 / 3.0) * sq(a[1] - b[1]);
    let dst_b = (F::one() - m_red) * sq(a[2] - b[2]);
    dst_r + dst_g + dst_b
}

/// Fill `out` with the distance term between every pixel of frame `t` and
/// its partner at `p+q` in frame `t + q.dt` of `guide`.
///
/// Spatial partner coordinates are mirror addressed per axis.
///
/// # Panics
///
/// Panics if `t` or `t + q.dt` is not a frame of `guide`, or if `out` is not
/// shaped like one frame.
pub fn compute_distance<F: NlmFloat>(
    guide: &PackedFrames<F>,
    t: usize,
    q: Offset,
    out: &mut Array2<F>,
) {
    let target_t = t as isize + q.dt;
    assert!(
        target_t >= 0 && (target_t as usize) < guide.num_frames(),
        "offset frame {} outside stack of {}",
        target_t,
        guide.num_frames()
    );
    assert_eq!(out.dim(), guide.dim(), "distance field shape");

    let current = guide.frame(t);
    let target = guide.frame(target_t as usize);

    // Resolve the space once; each arm is a separate monomorphised loop.
    match guide.space() {
        ReferenceSpace::Luma => distance_dispatch(&current, &target, q, 1, out, luma_distance),
        ReferenceSpace::Chroma => distance_dispatch(&current, &target, q, 2, out, chroma_distance),
        ReferenceSpace::Yuv => distance_dispatch(&current, &target, q, 3, out, yuv_distance),
        ReferenceSpace::Rgb => distance_dispatch(&current, &target, q, 3, out, rgb_distance),
    }
}

fn distance_dispatch<F, K>(
    current: &ArrayView3<F>,
    target: &ArrayView3<F>,
    q: Offset,
    channels: usize,
    out: &mut Array2<F>,
    kernel: K,
) where
    F: NlmFloat,
    K: Fn(&Pixel<F>, &Pixel<F>) -> F + Sync,
{
    let (rows, cols) = out.dim();
    Zip::indexed(out).par_for_each(|(y, x), d| {
        let y_pq = mirror_index(y as isize + q.dy, rows);
        let x_pq = mirror_index(x as isize + q.dx, cols);
        let p = load(current, y, x, channels);
        let p_pq = load(target, y_pq, x_pq, channels);
        *d = kernel(&p, &p_pq);
    });
}
