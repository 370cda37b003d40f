use anyhow::Result;
use fast_image_resize::images::ImageRef;
use fast_image_resize::PixelType;
use image::RgbImage;

/// A captured RGB frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BvrImage {
    pub image: RgbImage,
}

/// How a source frame was mapped into the model input, so boxes can be mapped back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageTransformInfo {
    pub width_src: u32,
    pub height_src: u32,
    pub width_dst: u32,
    pub height_dst: u32,
    pub ratio: f32,
}

impl std::ops::Deref for BvrImage {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl std::ops::DerefMut for BvrImage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.image
    }
}

impl BvrImage {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Solid-colour frame, mostly useful for tests and warm-up passes.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    /// Packs the pixels as `0RGB` words, the layout window back-ends expect.
    pub fn to_u32s(&self) -> Vec<u32> {
        use rayon::prelude::*;

        self.image
            .as_raw()
            .par_chunks(3)
            .map(|c| ((c[0] as u32) << 16) | ((c[1] as u32) << 8) | (c[2] as u32))
            .collect()
    }

    /// Borrows the pixels as a resizer source image without copying.
    pub fn as_fir_image(&self) -> Result<ImageRef<'_>> {
        let (width, height) = self.image.dimensions();
        Ok(ImageRef::new(width, height, self.image.as_raw(), PixelType::U8x3)?)
    }
}
