//! Accumulate and Finish over a pass-owned accumulator arena.
//!
//! The numerator/denominator pair and the running maximum weight are the
//! only state that lives across offsets. They are allocated when a pass
//! starts and consumed by `finish`, which reuses the numerator storage for
//! the output image.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::distance::Offset;
use crate::float_trait::NlmFloat;
use crate::packing::PackedFrames;
use crate::utils::{checked_index, mirror_index};

/// Running per-pixel sums for one denoising pass.
#[derive(Debug, Clone)]
pub struct Accumulators<F: NlmFloat> {
    /// `(rows, cols, channels)`
    numerator: Array3<F>,
    denominator: Array2<F>,
    max_weight: Array2<F>,
    reference_weight: F,
}

impl<F: NlmFloat> Accumulators<F> {
    /// Zeroed sums. The maximum weight starts at machine epsilon so the
    /// center contribution in `finish` is never zero.
    pub fn new(rows: usize, cols: usize, channels: usize, reference_weight: F) -> Self {
        Self {
            numerator: Array3::zeros((rows, cols, channels)),
            denominator: Array2::zeros((rows, cols)),
            max_weight: Array2::from_elem((rows, cols), F::epsilon()),
            reference_weight,
        }
    }

    pub fn numerator(&self) -> ArrayView3<'_, F> {
        self.numerator.view()
    }

    pub fn denominator(&self) -> ArrayView2<'_, F> {
        self.denominator.view()
    }

    pub fn max_weight(&self) -> ArrayView2<'_, F> {
        self.max_weight.view()
    }

    /// Add the contributions of the symmetric pair `(+q, -q)`.
    ///
    /// `forward[p]` is the weight of `distance(p, p+q)` measured on frame
    /// `center`. `backward` is the weight field measured with the same `q` on
    /// frame `center - q.dt`, so `backward[p-q]` weighs `distance(p-q, p)`.
    /// `p+q` is mirror addressed like in the distance stage; a `p-q` outside
    /// the frame contributes nothing.
    ///
    /// # Panics
    ///
    /// Panics if `center ± q.dt` is not a frame of `source`, or if a weight
    /// field is not shaped like one frame.
    pub fn accumulate(
        &mut self,
        source: &PackedFrames<F>,
        center: usize,
        forward: ArrayView2<F>,
        backward: ArrayView2<F>,
        q: Offset,
    ) {
        let (rows, cols) = self.denominator.dim();
        assert_eq!(source.dim(), (rows, cols), "source frame shape");
        assert_eq!(forward.dim(), (rows, cols), "forward weight shape");
        assert_eq!(backward.dim(), (rows, cols), "backward weight shape");

        let frames = source.num_frames() as isize;
        let plus_t = center as isize + q.dt;
        let minus_t = center as isize - q.dt;
        assert!(
            (0..frames).contains(&plus_t) && (0..frames).contains(&minus_t),
            "offset pair {:?} outside stack of {} around frame {}",
            q,
            frames,
            center
        );

        let plus = source.frame(plus_t as usize);
        let minus = source.frame(minus_t as usize);

        Zip::indexed(&mut self.denominator)
            .and(&mut self.max_weight)
            .and(self.numerator.lanes_mut(Axis(2)))
            .par_for_each(|(y, x), den, max_w, mut num| {
                let w_pq = forward[[y, x]];
                let y_pq = mirror_index(y as isize + q.dy, rows);
                let x_pq = mirror_index(x as isize + q.dx, cols);

                let y_mq = checked_index(y as isize - q.dy, rows);
                let x_mq = checked_index(x as isize - q.dx, cols);
                let mq = y_mq.zip(x_mq);
                let w_mq = mq.map_or(F::zero(), |(ym, xm)| backward[[ym, xm]]);

                *max_w = max_w.max(w_pq.max(w_mq));
                for (c, acc) in num.iter_mut().enumerate() {
                    let u_pq = plus[[y_pq, x_pq, c]];
                    let u_mq = mq.map_or(F::zero(), |(ym, xm)| minus[[ym, xm, c]]);
                    *acc += w_pq * u_pq + w_mq * u_mq;
                }
                *den += w_pq + w_mq;
            });
    }

    /// Normalize the sums, injecting the center pixel with weight
    /// `W_ref * max_weight`.
    pub fn finish(self, center: ArrayView3<F>) -> Array3<F> {
        let Accumulators {
            mut numerator,
            denominator,
            max_weight,
            reference_weight,
        } = self;
        assert_eq!(center.dim(), numerator.dim(), "centre frame shape");

        Zip::from(numerator.lanes_mut(Axis(2)))
            .and(&denominator)
            .and(&max_weight)
            .and(center.lanes(Axis(2)))
            .par_for_each(|mut num, &den, &max_w, pixel| {
                let w_m = reference_weight * max_w;
                let den = den + w_m;
                for (acc, &u) in num.iter_mut().zip(pixel.iter()) {
                    *acc = (*acc + w_m * u) / den;
                }
            });

        numerator
    }
}
