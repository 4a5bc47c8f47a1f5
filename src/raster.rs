use crate::{
    frame::Frame,
    image::Image,
    parameters::FrameFormat,
    result::{Result, SaneError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    Gray,
    LinearRgb,
    /// One bit per pixel, black and white.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterLayout {
    /// One plane per colour component in red, green, blue order, all
    /// with the same stride.
    Banded { samples_per_pixel: usize },

    /// A single plane with the components of each pixel side by side.
    Interleaved {
        samples_per_pixel: usize,
        bytes_per_pixel: usize,
    },

    /// A single plane packing one pixel per bit, MSB first.
    PackedBits,
}

/// Uniform description of an assembled scan: the sample buffers plus
/// the geometry needed to address them. 16-bit samples are big endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    planes: Vec<Vec<u8>>,
    width: usize,
    height: usize,
    depth: usize,
    stride: usize,
    color: ColorKind,
    layout: RasterLayout,
}

impl Raster {
    pub fn from_image(image: Image) -> Result<Self> {
        let width = image.width();
        let height = image.height();
        let depth = image.depth();
        let stride = image.bytes_per_line();
        let frames = image.into_frames();

        let (color, layout) = match (frames.len(), frames[0].format(), depth) {
            (3, _, 8 | 16) => (
                ColorKind::LinearRgb,
                RasterLayout::Banded {
                    samples_per_pixel: 3,
                },
            ),
            (1, _, 1) => (ColorKind::Binary, RasterLayout::PackedBits),
            (1, FrameFormat::Gray, 8 | 16) => (
                ColorKind::Gray,
                RasterLayout::Interleaved {
                    samples_per_pixel: 1,
                    bytes_per_pixel: depth / 8,
                },
            ),
            (1, FrameFormat::RGB, 8 | 16) => (
                ColorKind::LinearRgb,
                RasterLayout::Interleaved {
                    samples_per_pixel: 3,
                    bytes_per_pixel: 3 * depth / 8,
                },
            ),
            _ => return Err(SaneError::UnsupportedImageLayout),
        };

        Ok(Self {
            planes: frames.into_iter().map(Frame::into_data).collect(),
            width,
            height,
            depth,
            stride,
            color,
            layout,
        })
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes per row within each plane.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn color(&self) -> ColorKind {
        self.color
    }

    pub fn layout(&self) -> RasterLayout {
        self.layout
    }

    pub fn samples_per_pixel(&self) -> usize {
        match self.layout {
            RasterLayout::Banded { samples_per_pixel }
            | RasterLayout::Interleaved {
                samples_per_pixel, ..
            } => samples_per_pixel,
            RasterLayout::PackedBits => 1,
        }
    }

    /// Maps a sample position to `(plane index, byte offset)`.
    ///
    /// For [`RasterLayout::PackedBits`] the offset addresses the byte
    /// holding the pixel; its bit is `7 - x % 8` counting from the
    /// least significant bit.
    ///
    /// # Panics
    ///
    /// Panics if `x`, `y` or `channel` are out of range.
    pub fn sample_offset(&self, x: usize, y: usize, channel: usize) -> (usize, usize) {
        assert!(x < self.width, "x out of range");
        assert!(y < self.height, "y out of range");
        assert!(channel < self.samples_per_pixel(), "channel out of range");

        match self.layout {
            RasterLayout::Banded { .. } => {
                (channel, y * self.stride + x * (self.depth / 8))
            }
            RasterLayout::Interleaved {
                bytes_per_pixel, ..
            } => {
                let bytes_per_sample = self.depth / 8;
                (0, y * self.stride + x * bytes_per_pixel + channel * bytes_per_sample)
            }
            RasterLayout::PackedBits => (0, y * self.stride + x / 8),
        }
    }
}
