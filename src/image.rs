use crate::{
    frame::Frame,
    raster::Raster,
    result::{Result, SaneError},
};

/// Collects the frames of one scan and checks they describe a single
/// coherent image before assembly.
///
/// Exactly two configurations can be built: one singleton frame (GRAY
/// or RGB), or one each of RED, GREEN and BLUE in any arrival order.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    frames: Vec<Frame>,
    depth: Option<usize>,
    width: Option<usize>,
    height: Option<usize>,
    bytes_per_line: Option<usize>,
}

// The four geometry scalars are write-once: the first frame locks
// them in, later frames must agree.
fn set_or_check(slot: &mut Option<usize>, value: usize, mismatch: &'static str) -> Result<()> {
    match *slot {
        None => {
            *slot = Some(value);
            Ok(())
        }
        Some(existing) if existing == value => Ok(()),
        Some(_) => Err(SaneError::InvalidArgument(mismatch)),
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self, frame: Frame) -> Result<()> {
        if self.frames.iter().any(|f| f.format() == frame.format()) {
            return Err(SaneError::InvalidArgument(
                "image already contains a frame of this type",
            ));
        }

        if !self.frames.is_empty() && frame.format().is_singleton() {
            return Err(SaneError::InvalidArgument(
                "a singleton frame cannot join other frames",
            ));
        }

        if self.frames.iter().any(|f| f.format().is_singleton()) {
            return Err(SaneError::InvalidArgument(
                "image already contains a singleton frame",
            ));
        }

        if let Some(first) = self.frames.first() {
            if first.data().len() != frame.data().len() {
                return Err(SaneError::InvalidArgument(
                    "new frame has an inconsistent size",
                ));
            }
        }

        set_or_check(
            &mut self.depth,
            frame.depth(),
            "frame depth differs from earlier frames",
        )?;
        set_or_check(
            &mut self.width,
            frame.width(),
            "frame width differs from earlier frames",
        )?;
        set_or_check(
            &mut self.height,
            frame.height(),
            "frame height differs from earlier frames",
        )?;
        set_or_check(
            &mut self.bytes_per_line,
            frame.bytes_per_line(),
            "frame stride differs from earlier frames",
        )?;

        self.frames.push(frame);
        Ok(())
    }

    pub fn build(mut self) -> Result<Image> {
        let (Some(depth), Some(width), Some(height), Some(bytes_per_line)) =
            (self.depth, self.width, self.height, self.bytes_per_line)
        else {
            return Err(SaneError::IncompleteImage);
        };

        // add_frame already guarantees distinct types and no mixing
        // with singletons, so three frames are exactly one trio.
        let singleton = self.frames.len() == 1 && self.frames[0].format().is_singleton();
        let trio = self.frames.len() == 3;

        if !singleton && !trio {
            return Err(SaneError::IncompleteImage);
        }

        // Planes keep the canonical red, green, blue order regardless
        // of how the daemon delivered them.
        self.frames.sort_by_key(|frame| frame.format().plane_rank());

        Ok(Image {
            frames: self.frames,
            depth,
            width,
            height,
            bytes_per_line,
        })
    }
}

/// A fully assembled scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    frames: Vec<Frame>,
    depth: usize,
    width: usize,
    height: usize,
    bytes_per_line: usize,
}

impl Image {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    pub fn into_raster(self) -> Result<Raster> {
        Raster::from_image(self)
    }
}
