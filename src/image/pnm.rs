//! Built-in backend for binary netpbm images (`P5` graymaps, `P6` pixmaps).
//!
//! Pixels are held as 8-bit RGB in memory; resizing is nearest-neighbour.
//! Other formats are detected and measured but not processed.

use crate::error::{FsError, Result};
use crate::image::backend::{ImageBackend, ImageType, Modification, ProcessRequest};

use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PnmHeader {
    pub format: ImageType,
    pub width: u32,
    pub height: u32,
    pub maxval: u32,
    pub data_offset: usize,
}

struct HeaderCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl HeaderCursor<'_> {
    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn number(&mut self) -> Result<u32> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }

        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| FsError::environment("Malformed netpbm header"))
    }
}

/// Parses a `P5`/`P6` header.
pub(crate) fn parse_header(bytes: &[u8]) -> Result<PnmHeader> {
    let format = match bytes.get(..2) {
        Some(b"P5") => ImageType::Pgm,
        Some(b"P6") => ImageType::Ppm,
        _ => return Err(FsError::environment("Not a binary netpbm image")),
    };

    let mut cursor = HeaderCursor { bytes, pos: 2 };
    let width = cursor.number()?;
    let height = cursor.number()?;
    let maxval = cursor.number()?;

    if !(1..=255).contains(&maxval) {
        return Err(FsError::environment(format!(
            "Unsupported netpbm maximum value {maxval}"
        )));
    }
    // Exactly one whitespace byte separates the header from the raster
    if !bytes.get(cursor.pos).is_some_and(u8::is_ascii_whitespace) {
        return Err(FsError::environment("Malformed netpbm header"));
    }

    Ok(PnmHeader {
        format,
        width,
        height,
        maxval,
        data_offset: cursor.pos + 1,
    })
}

/// In-memory RGB raster.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Raster {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

fn luma(px: &[u8]) -> u8 {
    let sum = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
    ((sum + 500) / 1000) as u8
}

impl Raster {
    fn decode(bytes: &[u8]) -> Result<Self> {
        let header = parse_header(bytes)?;
        let channels = if header.format == ImageType::Pgm { 1 } else { 3 };
        let end = (header.width as usize)
            .checked_mul(header.height as usize)
            .and_then(|pixels| pixels.checked_mul(channels))
            .and_then(|needed| header.data_offset.checked_add(needed))
            .ok_or_else(|| {
                FsError::environment(format!(
                    "Netpbm raster of {}x{} is too large",
                    header.width, header.height
                ))
            })?;

        let data = bytes
            .get(header.data_offset..end)
            .ok_or_else(|| FsError::environment("Truncated netpbm raster"))?;

        let scale = |v: u8| ((v as u32 * 255) / header.maxval).min(255) as u8;
        let rgb = if channels == 1 {
            data.iter().flat_map(|&g| [scale(g); 3]).collect()
        } else {
            data.iter().map(|&v| scale(v)).collect()
        };

        Ok(Self {
            width: header.width,
            height: header.height,
            rgb,
        })
    }

    fn encode(&self, format: ImageType) -> Result<Vec<u8>> {
        let (magic, body): (&str, Vec<u8>) = match format {
            ImageType::Ppm => ("P6", self.rgb.clone()),
            ImageType::Pgm => ("P5", self.rgb.chunks_exact(3).map(luma).collect()),
            other => {
                return Err(FsError::environment(format!(
                    "The netpbm backend can not write {other} images"
                )));
            }
        };

        let mut out = format!("{magic}\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        &self.rgb[i..i + 3]
    }

    /// Builds a `width`×`height` raster, sourcing each pixel from `src(x, y)`.
    fn remap(&self, width: u32, height: u32, src: impl Fn(u32, u32) -> (u32, u32)) -> Raster {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let (sx, sy) = src(x, y);
                rgb.extend_from_slice(self.pixel(sx, sy));
            }
        }
        Raster { width, height, rgb }
    }

    fn apply(self, modification: &Modification) -> Result<Raster> {
        let (w, h) = (self.width, self.height);
        match *modification {
            Modification::Crop {
                x,
                y,
                width,
                height,
            } => {
                if width == 0
                    || height == 0
                    || x as u64 + width as u64 > w as u64
                    || y as u64 + height as u64 > h as u64
                {
                    return Err(FsError::environment(format!(
                        "Crop {width}x{height}+{x}+{y} is outside of a {w}x{h} image"
                    )));
                }
                Ok(self.remap(width, height, |dx, dy| (x + dx, y + dy)))
            }
            Modification::Resize { width, height } => {
                if width == 0 || height == 0 {
                    return Err(FsError::environment("Can not resize to zero pixels"));
                }
                let (w64, h64) = (w as u64, h as u64);
                Ok(self.remap(width, height, |dx, dy| {
                    (
                        (dx as u64 * w64 / width as u64) as u32,
                        (dy as u64 * h64 / height as u64) as u32,
                    )
                }))
            }
            Modification::Desaturate => {
                let mut out = self;
                for px in out.rgb.chunks_exact_mut(3) {
                    let g = luma(px);
                    px.fill(g);
                }
                Ok(out)
            }
            Modification::Rotate { degrees: 90 } => Ok(self.remap(h, w, |dx, dy| (dy, h - 1 - dx))),
            Modification::Rotate { degrees: 180 } => {
                Ok(self.remap(w, h, |dx, dy| (w - 1 - dx, h - 1 - dy)))
            }
            Modification::Rotate { degrees: 270 } => Ok(self.remap(h, w, |dx, dy| (w - 1 - dy, dx))),
            Modification::Rotate { degrees } => Err(FsError::environment(format!(
                "Can not rotate by {degrees} degrees"
            ))),
        }
    }
}

/// Netpbm backend; the default for a [`FilesystemSession`](crate::FilesystemSession).
#[derive(Debug, Clone, Copy, Default)]
pub struct PnmBackend;

impl ImageBackend for PnmBackend {
    fn name(&self) -> &'static str {
        "netpbm"
    }

    fn process(&self, request: &ProcessRequest<'_>) -> Result<()> {
        let bytes = fs::read(request.source)?;
        let mut raster = Raster::decode(&bytes)?;

        for modification in request.modifications {
            raster = raster.apply(modification)?;
        }

        fs::write(request.output, raster.encode(request.format)?).map_err(|e| {
            FsError::environment(format!(
                "Failed to write {}: {}",
                request.output.display(),
                e
            ))
        })?;

        log::debug!(
            "Processed {} modifications: {} → {}",
            request.modifications.len(),
            request.source.display(),
            request.output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ppm(width: u32, height: u32, pixels: &[[u8; 3]]) -> Vec<u8> {
        let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
        for px in pixels {
            out.extend_from_slice(px);
        }
        out
    }

    #[test]
    fn test_parse_header_with_comment() {
        let header = parse_header(b"P5\n# made by hand\n3 2\n255\n......").unwrap();
        assert_eq!(header.format, ImageType::Pgm);
        assert_eq!((header.width, header.height), (3, 2));
        assert_eq!(header.data_offset, 26);
    }

    #[test]
    fn test_parse_header_rejects_sixteen_bit() {
        assert!(parse_header(b"P6\n1 1\n65535\n").is_err());
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(Raster::decode(b"P6\n2 2\n255\nabc").is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_dimensions() {
        let err = Raster::decode(b"P6\n4294967295 4294967295\n255\n").unwrap_err();
        assert!(matches!(err, FsError::Environment(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_crop_rejects_overflowing_offset() {
        let raster = Raster::decode(&ppm(1, 1, &[[0, 0, 0]])).unwrap();
        let result = raster.apply(&Modification::Crop {
            x: u32::MAX,
            y: 0,
            width: 1,
            height: 1,
        });
        assert!(matches!(result, Err(FsError::Environment(_))));
    }

    #[test]
    fn test_crop_then_rotate() {
        let red = [255, 0, 0];
        let blue = [0, 0, 255];
        let raster = Raster::decode(&ppm(2, 1, &[red, blue])).unwrap();

        let rotated = raster
            .apply(&Modification::Rotate { degrees: 90 })
            .unwrap();
        assert_eq!((rotated.width, rotated.height), (1, 2));
        assert_eq!(rotated.pixel(0, 0), &red);
        assert_eq!(rotated.pixel(0, 1), &blue);

        let cropped = rotated
            .apply(&Modification::Crop {
                x: 0,
                y: 1,
                width: 1,
                height: 1,
            })
            .unwrap();
        assert_eq!(cropped.rgb, blue.to_vec());
    }

    #[test]
    fn test_resize_nearest_neighbour() {
        let raster = Raster::decode(&ppm(1, 1, &[[10, 20, 30]])).unwrap();
        let big = raster
            .apply(&Modification::Resize {
                width: 3,
                height: 2,
            })
            .unwrap();
        assert_eq!(big.rgb.len(), 3 * 2 * 3);
        assert!(big.rgb.chunks_exact(3).all(|px| px == [10, 20, 30]));
    }

    #[test]
    fn test_desaturate_and_encode_graymap() {
        let raster = Raster::decode(&ppm(1, 1, &[[255, 0, 0]])).unwrap();
        let gray = raster.apply(&Modification::Desaturate).unwrap();
        assert_eq!(gray.rgb, vec![76, 76, 76]);

        let encoded = gray.encode(ImageType::Pgm).unwrap();
        assert_eq!(encoded, b"P5\n1 1\n255\n\x4c".to_vec());
    }

    #[test]
    fn test_encode_foreign_format_fails() {
        let raster = Raster::decode(&ppm(1, 1, &[[0, 0, 0]])).unwrap();
        assert!(matches!(
            raster.encode(ImageType::Png),
            Err(FsError::Environment(_))
        ));
    }
}
