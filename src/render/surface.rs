//! Paint targets the painter blits cached tiles onto

use image::{ImageBuffer, Rgb, RgbImage, imageops};

use super::geometry::RectI;
use super::types::Bitmap;

/// Errors raised by a paint target
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The platform refused to materialize a displayable surface this large
    #[error("no resources for a {width}x{height} surface")]
    ResourceExhausted { width: i32, height: i32 },

    #[error("blit failed: {0}")]
    Blit(String),
}

impl SurfaceError {
    pub fn blit(msg: impl Into<String>) -> Self {
        Self::Blit(msg.into())
    }
}

/// Something a page can be painted onto (a window back buffer, an image)
pub trait PaintTarget {
    /// Copy `src` (bitmap pixels) into `dest` (target pixels), scaling when
    /// the two sizes differ
    fn blit(&mut self, bitmap: &Bitmap, dest: RectI, src: RectI) -> Result<(), SurfaceError>;
}

/// Paint target backed by an in-memory RGB image
pub struct ImageTarget {
    image: RgbImage,
}

impl ImageTarget {
    #[must_use]
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        Self {
            image: ImageBuffer::from_pixel(width, height, Rgb(background)),
        }
    }

    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl PaintTarget for ImageTarget {
    fn blit(&mut self, bitmap: &Bitmap, dest: RectI, src: RectI) -> Result<(), SurfaceError> {
        if dest.is_empty() {
            return Ok(());
        }
        let source: RgbImage =
            ImageBuffer::from_raw(bitmap.width_px, bitmap.height_px, bitmap.pixels.clone())
                .ok_or_else(|| {
                    SurfaceError::blit(format!(
                        "pixel buffer does not match {}x{}",
                        bitmap.width_px, bitmap.height_px
                    ))
                })?;

        let src = src.intersect(&RectI::from_size(bitmap.size()));
        if src.is_empty() {
            return Err(SurfaceError::blit("source rectangle outside bitmap"));
        }
        let piece = imageops::crop_imm(
            &source,
            src.x as u32,
            src.y as u32,
            src.dx as u32,
            src.dy as u32,
        )
        .to_image();

        let piece = if src.size() == dest.size() {
            piece
        } else {
            imageops::resize(
                &piece,
                dest.dx as u32,
                dest.dy as u32,
                imageops::FilterType::Triangle,
            )
        };
        imageops::replace(&mut self.image, &piece, i64::from(dest.x), i64::from(dest.y));
        Ok(())
    }
}
