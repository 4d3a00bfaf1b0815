//! Host frame formats: reference spaces, pixel encodings and plane buffers.

use ndarray::Array2;

use crate::error::{NlmError, Result};

/// Smallest supported integer bit depth.
const MIN_UNSIGNED_BITS: u8 = 8;

/// Largest supported integer bit depth (samples are carried in `u16`).
const MAX_UNSIGNED_BITS: u8 = 16;

/// Channel semantics of the frame being denoised.
///
/// Fixed for a whole pass. Selects the channel count, the per-channel
/// distance weighting and the accumulator layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpace {
    /// Single luma plane.
    Luma,
    /// Two chroma planes (U, V) processed without luma.
    Chroma,
    /// Three planes Y, U, V.
    Yuv,
    /// Three planes R, G, B.
    Rgb,
}

impl ReferenceSpace {
    /// Number of channels packed for this space.
    pub const fn channels(self) -> usize {
        match self {
            ReferenceSpace::Luma => 1,
            ReferenceSpace::Chroma => 2,
            ReferenceSpace::Yuv | ReferenceSpace::Rgb => 3,
        }
    }
}

/// Physical representation of host samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEncoding {
    /// Normalized float samples in `[0, 1]`.
    Float,
    /// Unsigned integers of `bits` significant bits (8 and 10 in practice).
    Unsigned { bits: u8 },
    /// 16-bit samples split into a high-byte and a low-byte 8-bit plane.
    Stacked,
}

impl PixelEncoding {
    /// Largest raw integer sample for integer encodings.
    pub fn max_code(self) -> Option<u32> {
        match self {
            PixelEncoding::Float => None,
            PixelEncoding::Unsigned { bits } => Some((1u32 << bits) - 1),
            PixelEncoding::Stacked => Some(u16::MAX as u32),
        }
    }

    pub fn validate(self) -> Result<()> {
        if let PixelEncoding::Unsigned { bits } = self {
            if !(MIN_UNSIGNED_BITS..=MAX_UNSIGNED_BITS).contains(&bits) {
                return Err(NlmError::UnsupportedFormat(format!(
                    "unsigned bit depth {} outside {}..={}",
                    bits, MIN_UNSIGNED_BITS, MAX_UNSIGNED_BITS
                )));
            }
        }
        Ok(())
    }
}

/// One logical host plane.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaneBuffer {
    Float(Array2<f32>),
    Unsigned(Array2<u16>),
    /// High and low bytes of a 16-bit plane, co-located sample for sample.
    Stacked { msb: Array2<u8>, lsb: Array2<u8> },
}

impl PlaneBuffer {
    /// Plane shape as `(rows, cols)`.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            PlaneBuffer::Float(plane) => plane.dim(),
            PlaneBuffer::Unsigned(plane) => plane.dim(),
            PlaneBuffer::Stacked { msb, .. } => msb.dim(),
        }
    }

    fn matches(&self, encoding: PixelEncoding) -> bool {
        matches!(
            (self, encoding),
            (PlaneBuffer::Float(_), PixelEncoding::Float)
                | (PlaneBuffer::Unsigned(_), PixelEncoding::Unsigned { .. })
                | (PlaneBuffer::Stacked { .. }, PixelEncoding::Stacked)
        )
    }
}

/// A host-supplied frame: one to three planes sharing an encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct HostFrame {
    pub encoding: PixelEncoding,
    pub planes: Vec<PlaneBuffer>,
}

impl HostFrame {
    pub fn new(encoding: PixelEncoding, planes: Vec<PlaneBuffer>) -> Self {
        Self { encoding, planes }
    }

    /// Shape of the first plane, `(0, 0)` for a frame without planes.
    pub fn dim(&self) -> (usize, usize) {
        self.planes.first().map(PlaneBuffer::dim).unwrap_or((0, 0))
    }

    /// Check that this frame can be packed into `space`.
    pub fn validate(&self, space: ReferenceSpace) -> Result<()> {
        self.encoding.validate()?;

        let expected = space.channels();
        if self.planes.len() != expected {
            return Err(NlmError::PlaneCountMismatch {
                expected,
                found: self.planes.len(),
            });
        }

        let dim = self.dim();
        if dim.0 == 0 || dim.1 == 0 {
            return Err(NlmError::UnsupportedFormat(format!(
                "empty plane of shape {:?}",
                dim
            )));
        }

        for plane in &self.planes {
            if !plane.matches(self.encoding) {
                return Err(NlmError::UnsupportedFormat(format!(
                    "plane kind does not match encoding {:?}",
                    self.encoding
                )));
            }
            if plane.dim() != dim {
                return Err(NlmError::DimensionMismatch {
                    expected: dim,
                    found: plane.dim(),
                });
            }
            if let PlaneBuffer::Stacked { msb, lsb } = plane {
                if lsb.dim() != msb.dim() {
                    return Err(NlmError::DimensionMismatch {
                        expected: msb.dim(),
                        found: lsb.dim(),
                    });
                }
            }
        }
        Ok(())
    }
}
