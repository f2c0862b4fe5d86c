//! Texture atlas: one RGBA image plus the sprites cut from it.
//!
//! The decoded image stays on the CPU; each rendering context uploads its own
//! copy, so a rebuilt context never has to touch the filesystem.

mod location;

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

pub use location::SpriteLocation;

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("failed to load atlas image {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("atlas image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

#[derive(Debug, Clone)]
pub struct Atlas {
    image: RgbaImage,
    sprites: Vec<SpriteLocation>,
}

impl Atlas {
    /// Decodes an image file into a single-sprite atlas.
    ///
    /// Color is premultiplied by alpha on load to match the blend state.
    pub fn load_image(path: impl AsRef<Path>) -> Result<Self, AtlasError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| AtlasError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        log::info!(
            "loaded atlas {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        let mut atlas = Self::from_rgba(image)?;
        premultiply(&mut atlas.image);
        Ok(atlas)
    }

    /// Wraps already premultiplied RGBA pixels as a single-sprite atlas.
    pub fn from_rgba(image: RgbaImage) -> Result<Self, AtlasError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AtlasError::Empty { width, height });
        }
        Ok(Self {
            sprites: vec![SpriteLocation::whole_image(width, height)],
            image,
        })
    }

    /// A soft red disc on a transparent background, `size` pixels square.
    pub fn placeholder(size: u32) -> Self {
        let size = size.max(2);
        let radius = size as f32 * 0.5;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let dx = x as f32 + 0.5 - radius;
            let dy = y as f32 + 0.5 - radius;
            let d = (dx * dx + dy * dy).sqrt() / radius;
            // One-pixel feathered edge, premultiplied.
            let a = ((1.0 - d) * radius).clamp(0.0, 1.0);
            let shade = 1.0 - 0.35 * d.min(1.0);
            let c = |v: f32| (v * a * 255.0).round() as u8;
            Rgba([c(0.85 * shade), c(0.1 * shade), c(0.15 * shade), c(1.0)])
        });
        Self {
            sprites: vec![SpriteLocation::whole_image(size, size)],
            image,
        }
    }

    /// Sprite `index`, or `None` past the last sprite.
    pub fn location(&self, index: usize) -> Option<SpriteLocation> {
        self.sprites.get(index).copied()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

fn premultiply(image: &mut RgbaImage) {
    for Rgba([r, g, b, a]) in image.pixels_mut() {
        let scale = |c: &mut u8| *c = ((u16::from(*c) * u16::from(*a) + 127) / 255) as u8;
        scale(r);
        scale(g);
        scale(b);
    }
}
