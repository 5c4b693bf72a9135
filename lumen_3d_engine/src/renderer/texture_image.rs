/// Decoded texture pixels.
///
/// Image file decoding happens outside the crate; `Renderer::load_texture`
/// takes the raw pixels in a texture format.

use crate::device::Format;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    format: Format,
    pixels: Vec<u8>,
}

impl TextureImage {
    /// Wrap tightly packed rows of `format` pixels.
    ///
    /// # Errors
    ///
    /// `ResourceCreation` if the image is empty, the format is a depth or
    /// unknown format, or `pixels` does not hold exactly
    /// `width * height` pixels.
    pub fn new(width: u32, height: u32, format: Format, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::ResourceCreation(format!(
                "texture image {}x{} is empty", width, height
            )));
        }
        if format == Format::Unknown || format.is_depth() {
            return Err(Error::ResourceCreation(format!(
                "{:?} is not a texture image format", format
            )));
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if pixels.len() != expected {
            return Err(Error::ResourceCreation(format!(
                "texture image has {} bytes, expected {} for {}x{} {:?}",
                pixels.len(), expected, width, height, format
            )));
        }
        Ok(Self { width, height, format, pixels })
    }

    /// 8-bit RGBA image
    pub fn rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        Self::new(width, height, Format::R8G8B8A8_UNORM, pixels)
    }

    /// Single-color 8-bit RGBA image
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        Self::rgba8(width, height, color.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_image_size() {
        let image = TextureImage::solid(4, 2, [255, 0, 0, 255]).unwrap();
        assert_eq!(image.pixels().len(), 32);
        assert_eq!(&image.pixels()[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_rejects_bad_images() {
        assert!(matches!(TextureImage::rgba8(0, 4, Vec::new()), Err(Error::ResourceCreation(_))));
        assert!(matches!(TextureImage::rgba8(2, 2, vec![0; 15]), Err(Error::ResourceCreation(_))));
        assert!(matches!(
            TextureImage::new(1, 1, Format::D24_UNORM_S8_UINT, vec![0; 4]),
            Err(Error::ResourceCreation(_))
        ));
    }
}
