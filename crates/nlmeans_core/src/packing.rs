//! Pack / Unpack: host plane encodings <-> unified internal float image.
//!
//! The internal image is `(rows, cols, channels)` with samples normalized
//! to `[0, 1]`. Every conversion is a pure per-sample map with no
//! neighborhood reads.

use ndarray::{Array2, Array3, Array4, ArrayView3, Axis, Zip};

use crate::error::{NlmError, Result};
use crate::float_trait::NlmFloat;
use crate::format::{HostFrame, PixelEncoding, PlaneBuffer, ReferenceSpace};

/// Weight of the high byte when rebuilding a stacked 16-bit sample.
///
/// Must stay `256 / (257 * 255)`, not a `msb << 8 | lsb` recombination:
/// existing stacked-format consumers depend on these exact values.
const STACKED_MSB_WEIGHT: f64 = 256.0 / (257.0 * 255.0);

/// Weight of the low byte when rebuilding a stacked 16-bit sample.
const STACKED_LSB_WEIGHT: f64 = 1.0 / (257.0 * 255.0);

/// A temporal stack of packed frames sharing one reference space.
///
/// Shape is `(frames, rows, cols, channels)`.
#[derive(Debug, Clone)]
pub struct PackedFrames<F: NlmFloat> {
    data: Array4<F>,
    space: ReferenceSpace,
}

impl<F: NlmFloat> PackedFrames<F> {
    /// Stack already packed images. All images must share a shape whose
    /// channel count matches `space`.
    pub fn from_images(images: &[Array3<F>], space: ReferenceSpace) -> Result<Self> {
        let first = images.first().ok_or(NlmError::FrameCountMismatch {
            expected: 1,
            found: 0,
        })?;
        let (rows, cols, channels) = first.dim();
        if channels != space.channels() {
            return Err(NlmError::PlaneCountMismatch {
                expected: space.channels(),
                found: channels,
            });
        }
        if rows == 0 || cols == 0 {
            return Err(NlmError::UnsupportedFormat(format!(
                "empty image of shape {:?}",
                (rows, cols)
            )));
        }

        let mut data = Array4::zeros((images.len(), rows, cols, channels));
        for (t, image) in images.iter().enumerate() {
            if image.dim() != (rows, cols, channels) {
                return Err(NlmError::DimensionMismatch {
                    expected: (rows, cols),
                    found: (image.dim().0, image.dim().1),
                });
            }
            data.index_axis_mut(Axis(0), t).assign(image);
        }
        Ok(Self { data, space })
    }

    pub fn space(&self) -> ReferenceSpace {
        self.space
    }

    pub fn num_frames(&self) -> usize {
        self.data.dim().0
    }

    /// Spatial shape as `(rows, cols)`.
    pub fn dim(&self) -> (usize, usize) {
        let (_, rows, cols, _) = self.data.dim();
        (rows, cols)
    }

    pub fn channels(&self) -> usize {
        self.data.dim().3
    }

    /// View of frame `t` as `(rows, cols, channels)`.
    pub fn frame(&self, t: usize) -> ArrayView3<'_, F> {
        self.data.index_axis(Axis(0), t)
    }
}

/// Convert one host frame into a `(rows, cols, channels)` float image.
pub fn pack_frame<F: NlmFloat>(frame: &HostFrame, space: ReferenceSpace) -> Result<Array3<F>> {
    frame.validate(space)?;

    let (rows, cols) = frame.dim();
    let mut packed = Array3::<F>::zeros((rows, cols, space.channels()));

    for (c, plane) in frame.planes.iter().enumerate() {
        let mut channel = packed.index_axis_mut(Axis(2), c);
        match plane {
            PlaneBuffer::Float(src) => {
                Zip::from(&mut channel)
                    .and(src)
                    .par_for_each(|dst, &v| *dst = F::from_f64_c(v as f64));
            }
            PlaneBuffer::Unsigned(src) => {
                let max_code = F::from_f64_c(frame.encoding.max_code().unwrap_or(1) as f64);
                Zip::from(&mut channel)
                    .and(src)
                    .par_for_each(|dst, &v| *dst = F::from_f64_c(v as f64) / max_code);
            }
            PlaneBuffer::Stacked { msb, lsb } => {
                let msb_weight = F::from_f64_c(STACKED_MSB_WEIGHT);
                let lsb_weight = F::from_f64_c(STACKED_LSB_WEIGHT);
                Zip::from(&mut channel)
                    .and(msb)
                    .and(lsb)
                    .par_for_each(|dst, &hi, &lo| {
                        *dst = msb_weight * F::usize_as(hi as usize)
                            + lsb_weight * F::usize_as(lo as usize);
                    });
            }
        }
    }

    Ok(packed)
}

/// Pack a temporal stack of host frames.
pub fn pack_frames<F: NlmFloat>(
    frames: &[HostFrame],
    space: ReferenceSpace,
) -> Result<PackedFrames<F>> {
    let images = frames
        .iter()
        .map(|frame| pack_frame::<F>(frame, space))
        .collect::<Result<Vec<_>>>()?;
    PackedFrames::from_images(&images, space)
}

/// Round to the nearest code and saturate into `[0, max_code]`.
#[inline]
fn quantize<F: NlmFloat>(value: F, max_code: u32) -> u32 {
    let scaled = (value * F::from_f64_c(max_code as f64)).round().as_f64();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= max_code as f64 {
        max_code
    } else {
        scaled as u32
    }
}

/// Convert a `(rows, cols, channels)` float image back into host planes.
pub fn unpack_frame<F: NlmFloat>(image: ArrayView3<F>, encoding: PixelEncoding) -> Result<HostFrame> {
    encoding.validate()?;

    let planes = image
        .axis_iter(Axis(2))
        .map(|channel| match encoding {
            PixelEncoding::Float => {
                PlaneBuffer::Float(Zip::from(&channel).par_map_collect(|&v| v.as_f32()))
            }
            PixelEncoding::Unsigned { bits } => {
                let max_code = (1u32 << bits) - 1;
                PlaneBuffer::Unsigned(
                    Zip::from(&channel).par_map_collect(|&v| quantize(v, max_code) as u16),
                )
            }
            PixelEncoding::Stacked => {
                let words: Array2<u16> = Zip::from(&channel)
                    .par_map_collect(|&v| quantize(v, u16::MAX as u32) as u16);
                PlaneBuffer::Stacked {
                    msb: words.mapv(|w| (w >> 8) as u8),
                    lsb: words.mapv(|w| (w & 0xFF) as u8),
                }
            }
        })
        .collect();

    Ok(HostFrame::new(encoding, planes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            self.state
        }

        fn next_below(&mut self, bound: u32) -> u32 {
            ((self.next_u64() >> 33) % bound as u64) as u32
        }
    }

    fn unsigned_plane(rows: usize, cols: usize, bits: u8, rng: &mut SimpleLcg) -> PlaneBuffer {
        let bound = 1u32 << bits;
        PlaneBuffer::Unsigned(Array2::from_shape_fn((rows, cols), |_| {
            rng.next_below(bound) as u16
        }))
    }

    fn stacked_plane(rows: usize, cols: usize, rng: &mut SimpleLcg) -> PlaneBuffer {
        PlaneBuffer::Stacked {
            msb: Array2::from_shape_fn((rows, cols), |_| rng.next_below(256) as u8),
            lsb: Array2::from_shape_fn((rows, cols), |_| rng.next_below(256) as u8),
        }
    }

    fn float_plane(rows: usize, cols: usize, rng: &mut SimpleLcg) -> PlaneBuffer {
        PlaneBuffer::Float(Array2::from_shape_fn((rows, cols), |_| {
            rng.next_below(1 << 20) as f32 / (1 << 20) as f32
        }))
    }

    fn frame_for(encoding: PixelEncoding, space: ReferenceSpace, seed: u64) -> HostFrame {
        let mut rng = SimpleLcg::new(seed);
        let planes = (0..space.channels())
            .map(|_| match encoding {
                PixelEncoding::Float => float_plane(7, 9, &mut rng),
                PixelEncoding::Unsigned { bits } => unsigned_plane(7, 9, bits, &mut rng),
                PixelEncoding::Stacked => stacked_plane(7, 9, &mut rng),
            })
            .collect();
        HostFrame::new(encoding, planes)
    }

    const ALL_SPACES: [ReferenceSpace; 4] = [
        ReferenceSpace::Luma,
        ReferenceSpace::Chroma,
        ReferenceSpace::Yuv,
        ReferenceSpace::Rgb,
    ];

    // ==================== Pack Tests ====================

    #[test]
    fn test_pack_float_passthrough() {
        let plane = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32 / 16.0);
        let frame = HostFrame::new(PixelEncoding::Float, vec![PlaneBuffer::Float(plane.clone())]);
        let packed: Array3<f32> = pack_frame(&frame, ReferenceSpace::Luma).unwrap();
        assert_eq!(packed.dim(), (3, 4, 1));
        for ((r, c), &v) in plane.indexed_iter() {
            assert_eq!(packed[[r, c, 0]], v);
        }
    }

    #[test]
    fn test_pack_unsigned_divides_by_max_code() {
        let plane = Array2::from_shape_vec((1, 3), vec![0u16, 1023, 512]).unwrap();
        let frame = HostFrame::new(
            PixelEncoding::Unsigned { bits: 10 },
            vec![PlaneBuffer::Unsigned(plane)],
        );
        let packed: Array3<f32> = pack_frame(&frame, ReferenceSpace::Luma).unwrap();
        assert_eq!(packed[[0, 0, 0]], 0.0);
        assert_eq!(packed[[0, 1, 0]], 1.0);
        assert_eq!(packed[[0, 2, 0]], 512.0 / 1023.0);
    }

    #[test]
    fn test_pack_stacked_constants() {
        let msb = Array2::from_shape_vec((1, 3), vec![0u8, 255, 18]).unwrap();
        let lsb = Array2::from_shape_vec((1, 3), vec![0u8, 255, 52]).unwrap();
        let frame = HostFrame::new(PixelEncoding::Stacked, vec![PlaneBuffer::Stacked { msb, lsb }]);
        let packed: Array3<f64> = pack_frame(&frame, ReferenceSpace::Luma).unwrap();

        assert_eq!(packed[[0, 0, 0]], 0.0);
        assert!((packed[[0, 1, 0]] - 1.0).abs() < 1e-12);
        let expected = 18.0 * (256.0 / (257.0 * 255.0)) + 52.0 * (1.0 / (257.0 * 255.0));
        assert_eq!(packed[[0, 2, 0]], expected);
    }

    #[test]
    fn test_pack_stacked_uses_65535_scale() {
        let msb = Array2::from_elem((1, 1), 128u8);
        let lsb = Array2::from_elem((1, 1), 0u8);
        let frame = HostFrame::new(PixelEncoding::Stacked, vec![PlaneBuffer::Stacked { msb, lsb }]);
        let packed: Array3<f64> = pack_frame(&frame, ReferenceSpace::Luma).unwrap();
        assert!((packed[[0, 0, 0]] - 32768.0 / 65535.0).abs() < 1e-12);
        assert!((packed[[0, 0, 0]] - 0.5).abs() > 1e-6);
    }

    #[test]
    fn test_pack_rejects_invalid_frame() {
        let frame = HostFrame::new(PixelEncoding::Float, vec![]);
        let result = pack_frame::<f32>(&frame, ReferenceSpace::Luma);
        assert!(result.is_err());
    }

    // ==================== Unpack Tests ====================

    #[test]
    fn test_unpack_unsigned_saturates() {
        let image = Array3::from_shape_vec((1, 4, 1), vec![-0.5f32, 1.7, f32::NAN, 0.5]).unwrap();
        let frame = unpack_frame(image.view(), PixelEncoding::Unsigned { bits: 8 }).unwrap();
        match &frame.planes[0] {
            PlaneBuffer::Unsigned(plane) => {
                assert_eq!(plane.as_slice().unwrap(), &[0, 255, 0, 128]);
            }
            other => panic!("unexpected plane {:?}", other),
        }
    }

    #[test]
    fn test_unpack_stacked_splits_bytes() {
        let image = Array3::from_elem((1, 1, 1), 0x1234 as f64 / 65535.0);
        let frame = unpack_frame(image.view(), PixelEncoding::Stacked).unwrap();
        match &frame.planes[0] {
            PlaneBuffer::Stacked { msb, lsb } => {
                assert_eq!(msb[[0, 0]], 0x12);
                assert_eq!(lsb[[0, 0]], 0x34);
            }
            other => panic!("unexpected plane {:?}", other),
        }
    }

    #[test]
    fn test_unpack_stacked_saturates_above_one() {
        let image = Array3::from_elem((1, 1, 1), 1.25f32);
        let frame = unpack_frame(image.view(), PixelEncoding::Stacked).unwrap();
        match &frame.planes[0] {
            PlaneBuffer::Stacked { msb, lsb } => {
                assert_eq!((msb[[0, 0]], lsb[[0, 0]]), (0xFF, 0xFF));
            }
            other => panic!("unexpected plane {:?}", other),
        }
    }

    #[test]
    fn test_unpack_channel_count_follows_image() {
        let image = Array3::<f32>::zeros((2, 2, 3));
        let frame = unpack_frame(image.view(), PixelEncoding::Float).unwrap();
        assert_eq!(frame.planes.len(), 3);
        assert_eq!(frame.dim(), (2, 2));
    }

    // ==================== Round Trip ====================

    #[test]
    fn test_round_trip_all_encodings_and_spaces() {
        let encodings = [
            PixelEncoding::Float,
            PixelEncoding::Unsigned { bits: 8 },
            PixelEncoding::Unsigned { bits: 10 },
            PixelEncoding::Stacked,
        ];
        for (i, &encoding) in encodings.iter().enumerate() {
            for (j, &space) in ALL_SPACES.iter().enumerate() {
                let frame = frame_for(encoding, space, (i * 10 + j) as u64 + 1);
                let packed: Array3<f32> = pack_frame(&frame, space).unwrap();
                let restored = unpack_frame(packed.view(), encoding).unwrap();
                assert_eq!(restored, frame, "{:?} / {:?}", encoding, space);
            }
        }
    }

    #[test]
    fn test_round_trip_every_stacked_code() {
        let codes: Vec<u16> = (0..=u16::MAX).collect();
        let msb = Array2::from_shape_fn((256, 256), |(r, c)| (codes[r * 256 + c] >> 8) as u8);
        let lsb = Array2::from_shape_fn((256, 256), |(r, c)| (codes[r * 256 + c] & 0xFF) as u8);
        let frame = HostFrame::new(PixelEncoding::Stacked, vec![PlaneBuffer::Stacked { msb, lsb }]);
        let packed: Array3<f32> = pack_frame(&frame, ReferenceSpace::Luma).unwrap();
        let restored = unpack_frame(packed.view(), PixelEncoding::Stacked).unwrap();
        assert_eq!(restored, frame);
    }

    // ==================== PackedFrames ====================

    #[test]
    fn test_packed_frames_stack() {
        let a = Array3::<f32>::zeros((4, 5, 2));
        let b = Array3::<f32>::from_elem((4, 5, 2), 0.5);
        let stack = PackedFrames::from_images(&[a, b], ReferenceSpace::Chroma).unwrap();
        assert_eq!(stack.num_frames(), 2);
        assert_eq!(stack.dim(), (4, 5));
        assert_eq!(stack.channels(), 2);
        assert_eq!(stack.frame(1)[[3, 4, 1]], 0.5);
    }

    #[test]
    fn test_packed_frames_shape_mismatch() {
        let a = Array3::<f32>::zeros((4, 5, 1));
        let b = Array3::<f32>::zeros((4, 6, 1));
        assert!(PackedFrames::from_images(&[a, b], ReferenceSpace::Luma).is_err());
    }

    #[test]
    fn test_packed_frames_channel_mismatch() {
        let a = Array3::<f32>::zeros((4, 5, 1));
        assert!(PackedFrames::from_images(&[a], ReferenceSpace::Rgb).is_err());
    }

    #[test]
    fn test_pack_frames_stack_of_host_frames() {
        let frames: Vec<HostFrame> = (0..3)
            .map(|seed| frame_for(PixelEncoding::Stacked, ReferenceSpace::Yuv, seed))
            .collect();
        let stack: PackedFrames<f32> = pack_frames(&frames, ReferenceSpace::Yuv).unwrap();
        assert_eq!(stack.num_frames(), 3);
        assert_eq!(stack.channels(), 3);
    }
}
