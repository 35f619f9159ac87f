use crate::error::Result;
use crate::fs::FilesystemSession;
use crate::image::{HorizontalPosition, ImageType, VerticalPosition};
use clap::Parser;
use std::path::PathBuf;

/// Crop rectangle given as `X,Y,W,H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct ImageArgs {
    /// Image to modify (GIF, JPG, PNG, PGM or PPM)
    pub file: PathBuf,

    /// Crop to the rectangle X,Y,W,H
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_crop)]
    pub crop: Option<CropArea>,

    /// Crop the largest centered area with aspect ratio W:H
    #[arg(long, value_name = "W:H", value_parser = parse_ratio)]
    pub ratio: Option<(u32, u32)>,

    /// Resize to fit WxH; a zero side keeps the aspect ratio
    ///
    /// Examples:
    ///   --resize 640x480
    ///   --resize 50x0      Width 50, height follows
    #[arg(long, value_name = "WxH", value_parser = parse_resize, verbatim_doc_comment)]
    pub resize: Option<(u32, u32)>,

    /// Allow --resize to enlarge the image
    #[arg(long, requires = "resize")]
    pub upsize: bool,

    /// Convert to grayscale
    #[arg(long)]
    pub desaturate: bool,

    /// Rotate clockwise by 90, 180 or 270 degrees
    #[arg(long, value_name = "DEG")]
    pub rotate: Option<u32>,

    /// Save in another format; the original file is removed
    #[arg(long, value_name = "EXT", value_parser = parse_format)]
    pub format: Option<ImageType>,

    /// Output quality, 1-100
    #[arg(long, value_name = "Q", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// With --format, replace an existing file instead of picking a `_copyN` name
    #[arg(long)]
    pub overwrite: bool,
}

/// Queues the requested modifications in a fixed order and saves them.
pub fn execute(session: &FilesystemSession, args: &ImageArgs) -> Result<()> {
    let mut image = session.open_image(&args.file)?;

    if let Some(area) = args.crop {
        image.crop(area.x, area.y, area.width, area.height)?;
    }
    if let Some((width, height)) = args.ratio {
        image.crop_to_ratio(
            width,
            height,
            HorizontalPosition::default(),
            VerticalPosition::default(),
        )?;
    }
    if let Some((width, height)) = args.resize {
        image.resize(width, height, args.upsize)?;
    }
    if let Some(degrees) = args.rotate {
        image.rotate(degrees)?;
    }
    if args.desaturate {
        image.desaturate()?;
    }

    log::debug!(
        "{} pending modifications for {}, result will be {}",
        image.pending().len(),
        image.path().display(),
        image.dimensions()?
    );

    image.save_changes(args.format, args.quality, args.overwrite)?;
    Ok(())
}

fn parse_numbers(value: &str, separator: char, count: usize) -> Option<Vec<u32>> {
    let numbers = value
        .split(separator)
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    (numbers.len() == count).then_some(numbers)
}

fn parse_crop(value: &str) -> std::result::Result<CropArea, String> {
    match parse_numbers(value, ',', 4).as_deref() {
        Some(&[x, y, width, height]) => Ok(CropArea {
            x,
            y,
            width,
            height,
        }),
        _ => Err(format!("expected X,Y,W,H, got '{value}'")),
    }
}

fn parse_resize(value: &str) -> std::result::Result<(u32, u32), String> {
    match parse_numbers(&value.to_ascii_lowercase(), 'x', 2).as_deref() {
        Some(&[width, height]) => Ok((width, height)),
        _ => Err(format!("expected WxH, got '{value}'")),
    }
}

fn parse_ratio(value: &str) -> std::result::Result<(u32, u32), String> {
    match parse_numbers(value, ':', 2).as_deref() {
        Some(&[0, _] | &[_, 0]) => Err("ratio sides must be greater than zero".to_string()),
        Some(&[width, height]) => Ok((width, height)),
        _ => Err(format!("expected W:H, got '{value}'")),
    }
}

fn parse_format(value: &str) -> std::result::Result<ImageType, String> {
    ImageType::from_extension(value.trim_start_matches('.'))
        .ok_or_else(|| format!("unsupported image format '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crop() {
        assert_eq!(
            parse_crop("10,20,30,40").unwrap(),
            CropArea {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
        assert!(parse_crop("10,20,30").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_resize_allows_zero_side() {
        assert_eq!(parse_resize("50x0").unwrap(), (50, 0));
        assert_eq!(parse_resize("640X480").unwrap(), (640, 480));
        assert!(parse_resize("640").is_err());
    }

    #[test]
    fn test_parse_ratio_rejects_zero() {
        assert_eq!(parse_ratio("16:9").unwrap(), (16, 9));
        assert!(parse_ratio("0:9").is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("ppm").unwrap(), ImageType::Ppm);
        assert_eq!(parse_format(".pgm").unwrap(), ImageType::Pgm);
        assert!(parse_format("bmp").is_err());
    }
}
