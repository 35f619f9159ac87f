//! Image handles with lazily applied modifications.
//!
//! Resizes, crops, rotations and desaturation are queued on the handle and
//! validated against the dimensions the image will have once everything queued
//! before them has run. Nothing touches the file until
//! [`ImageHandle::save_changes`], which hands the queue to the session's
//! [`ImageBackend`](backend::ImageBackend).

pub mod backend;
pub mod pnm;

pub use backend::{Dimensions, ImageBackend, ImageType, Modification, ProcessRequest};
pub use pnm::PnmBackend;

use crate::error::{FsError, Result};
use crate::fs::file::FileHandle;
use crate::fs::session::FilesystemSession;
use crate::fs::transaction::Target;
use crate::fs::{is_writable, make_unique_name};

use std::ops::Deref;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalPosition {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalPosition {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// A file handle for an image, plus its queue of pending modifications.
///
/// Dereferences to [`FileHandle`] for everything that is not image specific.
#[derive(Debug)]
pub struct ImageHandle<'s> {
    file: FileHandle<'s>,
    pending: Vec<Modification>,
}

impl<'s> Deref for ImageHandle<'s> {
    type Target = FileHandle<'s>;

    fn deref(&self) -> &Self::Target {
        &self.file
    }
}

fn scaled(value: f64) -> u32 {
    value.round() as u32
}

impl<'s> ImageHandle<'s> {
    pub(crate) fn open(session: &'s FilesystemSession, path: &Path) -> Result<Self> {
        let file = FileHandle::open(session, path)?;
        if session.backend().image_type(&file.path())?.is_none() {
            return Err(FsError::validation(format!(
                "The image specified, {}, is not a GIF, JPG, PNG or netpbm file",
                path.display()
            )));
        }

        Ok(Self {
            file,
            pending: Vec::new(),
        })
    }

    pub fn file(&self) -> FileHandle<'s> {
        self.file
    }

    pub fn pending(&self) -> &[Modification] {
        &self.pending
    }

    /// Format as currently stored on disk.
    pub fn image_type(&self) -> Result<ImageType> {
        let path = self.file.live_path()?;
        self.file.session().backend().image_type(&path)?.ok_or_else(|| {
            FsError::validation(format!("{} is no longer an image", path.display()))
        })
    }

    /// Dimensions of the file on disk, ignoring pending modifications.
    pub fn source_dimensions(&self) -> Result<Dimensions> {
        let path = self.file.live_path()?;
        self.file.session().backend().dimensions(&path)
    }

    /// Dimensions after every pending modification has been applied.
    pub fn dimensions(&self) -> Result<Dimensions> {
        let source = self.source_dimensions()?;
        Ok(self
            .pending
            .iter()
            .fold(source, |dims, modification| modification.apply(dims)))
    }

    /// Queues a proportional resize to fit within `width`×`height`.
    ///
    /// A zero dimension is derived from the other one. Requests that would not
    /// change the size, or would enlarge the image without `allow_upsizing`,
    /// are dropped.
    pub fn resize(&mut self, width: u32, height: u32, allow_upsizing: bool) -> Result<&mut Self> {
        if width == 0 && height == 0 {
            return Err(FsError::validation(
                "The canvas width and height specified are both zero",
            ));
        }

        let current = self.dimensions()?;
        let (orig_w, orig_h) = (current.width as f64, current.height as f64);

        let (new_width, new_height) = if width == 0 {
            (scaled(height as f64 / orig_h * orig_w), height)
        } else if height == 0 {
            (width, scaled(width as f64 / orig_w * orig_h))
        } else {
            let orig_ratio = orig_w / orig_h;
            let canvas_ratio = width as f64 / height as f64;
            if canvas_ratio > orig_ratio {
                (scaled(orig_ratio * height as f64), height)
            } else {
                (width, scaled(width as f64 / orig_ratio))
            }
        };

        if new_width == 0 || new_height == 0 {
            return Err(FsError::validation(format!(
                "Resizing a {current} image to {width}x{height} would leave no pixels"
            )));
        }

        let enlarges = new_width > current.width || new_height > current.height;
        if (new_width == current.width && new_height == current.height)
            || (enlarges && !allow_upsizing)
        {
            log::debug!("Skipping resize of {current} image to {new_width}x{new_height}");
            return Ok(self);
        }

        self.pending.push(Modification::Resize {
            width: new_width,
            height: new_height,
        });
        Ok(self)
    }

    /// Queues a crop of the `width`×`height` rectangle starting at (`x`, `y`).
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<&mut Self> {
        if width == 0 || height == 0 {
            return Err(FsError::validation(format!(
                "The crop size specified, {width}x{height}, must be greater than zero"
            )));
        }

        let current = self.dimensions()?;
        if x >= current.width {
            return Err(FsError::validation(format!(
                "The crop-from x specified, {x}, is beyond the width of the image, {}",
                current.width
            )));
        }
        if y >= current.height {
            return Err(FsError::validation(format!(
                "The crop-from y specified, {y}, is beyond the height of the image, {}",
                current.height
            )));
        }
        if x as u64 + width as u64 > current.width as u64 {
            return Err(FsError::validation(format!(
                "The crop width specified, {width}, is larger than the {} pixels available from x {x}",
                current.width - x
            )));
        }
        if y as u64 + height as u64 > current.height as u64 {
            return Err(FsError::validation(format!(
                "The crop height specified, {height}, is larger than the {} pixels available from y {y}",
                current.height - y
            )));
        }

        if x == 0 && y == 0 && width == current.width && height == current.height {
            log::debug!("Skipping full-frame crop of {current} image");
            return Ok(self);
        }

        self.pending.push(Modification::Crop {
            x,
            y,
            width,
            height,
        });
        Ok(self)
    }

    /// Queues the largest crop with aspect ratio `ratio_width`:`ratio_height`.
    pub fn crop_to_ratio(
        &mut self,
        ratio_width: u32,
        ratio_height: u32,
        horizontal: HorizontalPosition,
        vertical: VerticalPosition,
    ) -> Result<&mut Self> {
        if ratio_width == 0 || ratio_height == 0 {
            return Err(FsError::validation(format!(
                "The ratio specified, {ratio_width}:{ratio_height}, must be greater than zero"
            )));
        }

        let current = self.dimensions()?;
        let ratio = ratio_width as f64 / ratio_height as f64;
        let current_ratio = current.width as f64 / current.height as f64;

        let (width, height) = if current_ratio > ratio {
            (scaled(ratio * current.height as f64).max(1), current.height)
        } else {
            (current.width, scaled(current.width as f64 / ratio).max(1))
        };

        let x = match horizontal {
            HorizontalPosition::Left => 0,
            HorizontalPosition::Center => (current.width - width) / 2,
            HorizontalPosition::Right => current.width - width,
        };
        let y = match vertical {
            VerticalPosition::Top => 0,
            VerticalPosition::Middle => (current.height - height) / 2,
            VerticalPosition::Bottom => current.height - height,
        };

        self.crop(x, y, width, height)
    }

    /// Queues conversion to grayscale.
    pub fn desaturate(&mut self) -> Result<&mut Self> {
        self.file.live_path()?;
        if self.pending.last() != Some(&Modification::Desaturate) {
            self.pending.push(Modification::Desaturate);
        }
        Ok(self)
    }

    /// Queues a clockwise rotation by 90, 180 or 270 degrees.
    pub fn rotate(&mut self, degrees: u32) -> Result<&mut Self> {
        if !matches!(degrees, 90 | 180 | 270) {
            return Err(FsError::validation(format!(
                "The degrees specified, {degrees}, must be 90, 180 or 270"
            )));
        }
        self.file.live_path()?;
        self.pending.push(Modification::Rotate { degrees });
        Ok(self)
    }

    /// Applies pending modifications and writes the result.
    ///
    /// With a `new_format` different from the current one the image is written
    /// next to the original with the new extension (unique unless `overwrite`),
    /// this handle moves to the new file and the original is deleted. Every step
    /// is recorded when a transaction is active.
    pub fn save_changes(
        &mut self,
        new_format: Option<ImageType>,
        quality: Option<u8>,
        overwrite: bool,
    ) -> Result<&mut Self> {
        let session = self.file.session();
        let current = self.file.live_path()?;
        let current_format = self.image_type()?;
        let format = new_format.unwrap_or(current_format);

        let quality = quality.unwrap_or_else(|| session.default_quality());
        if !(1..=100).contains(&quality) {
            return Err(FsError::validation(format!(
                "The quality specified, {quality}, must be between 1 and 100"
            )));
        }

        if self.pending.is_empty() && format == current_format {
            return Ok(self);
        }

        let output = if format == current_format {
            if !is_writable(&current) {
                return Err(FsError::NotWritable(current));
            }
            current.clone()
        } else {
            let candidate = current.with_extension(format.extension());
            if !candidate.exists() {
                candidate
            } else if !overwrite {
                make_unique_name(&candidate, None)
            } else if !is_writable(&candidate) {
                return Err(FsError::NotWritable(candidate));
            } else {
                candidate
            }
        };

        let active = session.is_inside_transaction();
        if active {
            let mut log = session.log();
            if output == current {
                log.record_write(Target::Entry(self.file.id()), &current)?;
            } else if output.exists() {
                log.record_write(Target::Path(output.clone()), &output)?;
            } else {
                log.record_create(Target::Path(output.clone()))?;
            }
        }

        session.backend().process(&ProcessRequest {
            source: &current,
            output: &output,
            format,
            quality,
            modifications: &self.pending,
        })?;

        if output != current {
            session.registry().update_alias(&current, &output);
            if active {
                session.log().record_alias(&output, &current)?;
            }
            // The original gets its own identity so only it is tombstoned
            FileHandle::bind(session, &current).delete()?;
        }

        log::info!(
            "Saved {} image modifications to {}",
            self.pending.len(),
            output.display()
        );
        self.pending.clear();
        Ok(self)
    }
}
