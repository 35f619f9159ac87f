//! Image processing collaborator interface.
//!
//! An [`ImageBackend`] receives the ordered queue of pending modifications of an
//! [`ImageHandle`](crate::image::ImageHandle) and produces the output file.
//! Format sniffing and dimension reading are backend independent and only look
//! at file headers.

use crate::error::{FsError, Result};
use crate::image::pnm::parse_header;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Bytes read to sniff formats and parse simple headers.
const HEADER_LEN: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Gif,
    Jpeg,
    Png,
    /// Binary netpbm graymap (`P5`).
    Pgm,
    /// Binary netpbm pixmap (`P6`).
    Ppm,
}

impl ImageType {
    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Gif => "gif",
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Pgm => "pgm",
            ImageType::Ppm => "ppm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(ImageType::Gif),
            "jpg" | "jpeg" => Some(ImageType::Jpeg),
            "png" => Some(ImageType::Png),
            "pgm" => Some(ImageType::Pgm),
            "ppm" => Some(ImageType::Ppm),
            _ => None,
        }
    }

    fn sniff(head: &[u8]) -> Option<Self> {
        match head {
            [0x89, b'P', b'N', b'G', ..] => Some(ImageType::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageType::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => Some(ImageType::Gif),
            [b'P', b'5', ..] => Some(ImageType::Pgm),
            [b'P', b'6', ..] => Some(ImageType::Ppm),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A queued, not yet applied transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Resize { width: u32, height: u32 },
    Crop { x: u32, y: u32, width: u32, height: u32 },
    Desaturate,
    /// Clockwise rotation by 90, 180 or 270 degrees.
    Rotate { degrees: u32 },
}

impl Modification {
    /// Dimensions after applying this modification to an image of size `input`.
    pub fn apply(&self, input: Dimensions) -> Dimensions {
        match *self {
            Modification::Resize { width, height } | Modification::Crop { width, height, .. } => {
                Dimensions::new(width, height)
            }
            Modification::Desaturate => input,
            Modification::Rotate { degrees: 90 | 270 } => Dimensions::new(input.height, input.width),
            Modification::Rotate { .. } => input,
        }
    }
}

/// Everything a backend needs to produce one output image.
#[derive(Debug)]
pub struct ProcessRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub format: ImageType,
    pub quality: u8,
    pub modifications: &'a [Modification],
}

/// Pixel transformation backend.
pub trait ImageBackend {
    fn name(&self) -> &'static str;

    fn image_type(&self, path: &Path) -> Result<Option<ImageType>> {
        detect_image_type(path)
    }

    fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        read_dimensions(path)
    }

    /// Reads `request.source`, applies the modifications in order and writes
    /// `request.output` in `request.format`. Failures are
    /// [`FsError::Environment`].
    fn process(&self, request: &ProcessRequest<'_>) -> Result<()>;
}

fn read_head(path: &Path) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(HEADER_LEN as usize);
    File::open(path)?.take(HEADER_LEN).read_to_end(&mut head)?;
    Ok(head)
}

/// Sniffs the image format from magic bytes. `None` for non-images.
pub fn detect_image_type(path: &Path) -> Result<Option<ImageType>> {
    Ok(ImageType::sniff(&read_head(path)?))
}

/// Reads width and height from the file header.
pub fn read_dimensions(path: &Path) -> Result<Dimensions> {
    let head = read_head(path)?;
    let corrupt = || FsError::environment(format!("Unable to read the dimensions of {}", path.display()));

    match ImageType::sniff(&head).ok_or_else(corrupt)? {
        ImageType::Png => {
            let bytes = head.get(16..24).ok_or_else(corrupt)?;
            Ok(Dimensions::new(
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ))
        }
        ImageType::Gif => {
            let bytes = head.get(6..10).ok_or_else(corrupt)?;
            Ok(Dimensions::new(
                u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
                u16::from_le_bytes([bytes[2], bytes[3]]) as u32,
            ))
        }
        ImageType::Pgm | ImageType::Ppm => {
            let header = parse_header(&head)?;
            Ok(Dimensions::new(header.width, header.height))
        }
        ImageType::Jpeg => jpeg_dimensions(path)?.ok_or_else(corrupt),
    }
}

/// Walks JPEG segments up to the first start-of-frame marker.
fn jpeg_dimensions(path: &Path) -> Result<Option<Dimensions>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut soi = [0u8; 2];
    reader.read_exact(&mut soi)?;

    loop {
        let mut marker = [0u8; 2];
        if reader.read_exact(&mut marker).is_err() {
            return Ok(None);
        }
        if marker[0] != 0xFF {
            return Ok(None);
        }
        // Fill bytes
        if marker[1] == 0xFF {
            reader.seek_relative(-1)?;
            continue;
        }

        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let len = u16::from_be_bytes(len) as i64;

        let is_sof = matches!(marker[1], 0xC0..=0xCF) && !matches!(marker[1], 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let mut frame = [0u8; 5];
            reader.read_exact(&mut frame)?;
            let height = u16::from_be_bytes([frame[1], frame[2]]) as u32;
            let width = u16::from_be_bytes([frame[3], frame[4]]) as u32;
            return Ok(Some(Dimensions::new(width, height)));
        }

        reader.seek_relative(len - 2)?;
    }
}
