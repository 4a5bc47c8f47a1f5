use crate::result::{Result, SaneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    pub format: FrameFormat,
    pub last_frame: bool,
    pub bytes_per_line: usize,
    pub pixels_per_line: usize,
    pub lines: usize,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    Gray,
    RGB,
    Red,
    Green,
    Blue,
}

impl FrameFormat {
    /// A singleton frame is a complete image on its own.
    pub fn is_singleton(self) -> bool {
        matches!(self, Self::Gray | Self::RGB)
    }

    // Sort key giving the canonical red, green, blue plane order.
    pub(crate) fn plane_rank(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::RGB => 3,
            Self::Gray => 4,
        }
    }
}

impl TryFrom<i32> for FrameFormat {
    type Error = SaneError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Gray),
            1 => Ok(Self::RGB),
            2 => Ok(Self::Red),
            3 => Ok(Self::Green),
            4 => Ok(Self::Blue),
            _ => Err(SaneError::InvalidArgument("unknown frame format word")),
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameFormat::Gray => write!(f, "gray"),
            FrameFormat::RGB => write!(f, "RGB"),
            FrameFormat::Red => write!(f, "red"),
            FrameFormat::Green => write!(f, "green"),
            FrameFormat::Blue => write!(f, "blue"),
        }
    }
}

impl Parameters {
    /// Builds parameters from the six words of a GET_PARAMETERS reply.
    pub fn from_words(
        format: i32,
        last_frame: i32,
        bytes_per_line: i32,
        pixels_per_line: i32,
        lines: i32,
        depth: i32,
    ) -> Result<Self> {
        let format = FrameFormat::try_from(format)?;

        let last_frame = match last_frame {
            0 => false,
            1 => true,
            _ => return Err(SaneError::InvalidArgument("last frame word is not 0 or 1")),
        };

        if bytes_per_line <= 0 {
            return Err(SaneError::InvalidArgument("bytes_per_line is not positive"));
        }
        if pixels_per_line <= 0 {
            return Err(SaneError::InvalidArgument(
                "pixels_per_line is not positive",
            ));
        }
        if lines <= 0 {
            return Err(SaneError::InvalidArgument("lines is not positive"));
        }
        if !matches!(depth, 1 | 8 | 16) {
            return Err(SaneError::InvalidArgument("depth is not 1, 8 or 16"));
        }

        Ok(Self {
            format,
            last_frame,
            bytes_per_line: bytes_per_line as usize,
            pixels_per_line: pixels_per_line as usize,
            lines: lines as usize,
            depth: depth as usize,
        })
    }

    /// Total payload size of one frame with these parameters.
    pub fn frame_len(&self) -> Result<usize> {
        self.bytes_per_line
            .checked_mul(self.lines)
            .filter(|len| *len <= i32::MAX as usize)
            .ok_or(SaneError::ProtocolOverflow)
    }
}

impl std::fmt::Display for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "resolution {width}x{height}, depth {depth}, format '{format}'{last}",
            width = self.pixels_per_line,
            height = self.lines,
            depth = self.depth,
            format = self.format,
            last = if self.last_frame { " (last frame)" } else { "" },
        )
    }
}
