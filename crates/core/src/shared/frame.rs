use crate::shared::error::DetectionError;

/// Pixel layout of a host camera buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Gray8,
    /// Full-resolution Y plane followed by interleaved U/V at half resolution.
    Nv12,
    /// Same as `Nv12` with V/U interleaved.
    Nv21,
    /// A format tag the pipeline does not know how to convert.
    Other(String),
}

impl PixelFormat {
    /// Bytes per pixel of the first (or only) plane.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Rgb8 | Self::Bgr8 => Some(3),
            Self::Rgba8 | Self::Bgra8 => Some(4),
            Self::Gray8 | Self::Nv12 | Self::Nv21 => Some(1),
            Self::Other(_) => None,
        }
    }

    pub fn is_biplanar(&self) -> bool {
        matches!(self, Self::Nv12 | Self::Nv21)
    }
}

impl From<&str> for PixelFormat {
    fn from(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "rgb" | "rgb8" => Self::Rgb8,
            "bgr" | "bgr8" => Self::Bgr8,
            "rgba" | "rgba8" => Self::Rgba8,
            "bgra" | "bgra8" | "32bgra" => Self::Bgra8,
            "gray" | "grey" | "gray8" | "luma" => Self::Gray8,
            "nv12" | "420f" | "420v" => Self::Nv12,
            "nv21" | "yuv" => Self::Nv21,
            _ => Self::Other(tag.to_string()),
        }
    }
}

/// Clockwise rotation that brings the buffer upright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub fn from_degrees(degrees: i32) -> Result<Self, DetectionError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Up),
            90 => Ok(Self::Right),
            180 => Ok(Self::Down),
            270 => Ok(Self::Left),
            _ => Err(DetectionError::UnsupportedFormat(format!(
                "orientation of {degrees} degrees is not a right angle"
            ))),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Up => 0,
            Self::Right => 90,
            Self::Down => 180,
            Self::Left => 270,
        }
    }

    /// Whether width and height swap once the buffer is upright.
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }
}

/// A camera frame borrowed from the host for the duration of one call.
///
/// Rows may be padded: `bytes_per_row` is the stride of the first plane and,
/// for NV12/NV21, of the chroma plane as well.
#[derive(Clone, Debug)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    orientation: Orientation,
    timestamp_ns: u64,
}

impl<'a> RawFrame<'a> {
    /// Tightly packed frame, upright, timestamp 0.
    pub fn new(data: &'a [u8], width: u32, height: u32, format: PixelFormat) -> Self {
        let bytes_per_row = format.bytes_per_pixel().unwrap_or(0) * width as usize;
        Self {
            data,
            width,
            height,
            bytes_per_row,
            format,
            orientation: Orientation::Up,
            timestamp_ns: 0,
        }
    }

    pub fn with_stride(mut self, bytes_per_row: usize) -> Self {
        self.bytes_per_row = bytes_per_row;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }
}
