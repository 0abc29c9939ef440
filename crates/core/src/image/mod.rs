use std::path::Path;

use crate::{Result, SonifyError};

/// RGBA pixels for a rectangular region, row major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRegion {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageRegion {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(SonifyError::InvalidInput(
                "pixel buffer length does not match width * height * 4",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniform image filled with one colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Mean of the R, G and B channels scaled to `[0, 1]`.
    pub fn luminance(&self, x: u32, y: u32) -> f32 {
        let offset = 4 * (y as usize * self.width as usize + x as usize);
        let rgb = &self.data[offset..offset + 3];
        rgb.iter().map(|&channel| f32::from(channel) / 255.0).sum::<f32>() / 3.0
    }
}

/// Image the sweep runs across.
pub trait ImageSurface: Send {
    /// Returns the pixels of the requested rectangle.
    fn image_data(&self, x: u32, y: u32, width: u32, height: u32) -> Result<ImageRegion>;
}

/// Decoded RGBA image held in memory.
#[derive(Debug, Clone)]
pub struct RgbaImage {
    region: ImageRegion,
}

impl RgbaImage {
    pub fn from_region(region: ImageRegion) -> Self {
        Self { region }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Ok(Self::from_region(ImageRegion::new(width, height, data)?))
    }

    /// Decodes a PNG, JPEG or PNM file into RGBA.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = ::image::open(path)?.to_rgba8();
        tracing::debug!(?path, width = decoded.width(), height = decoded.height(), "image decoded");
        Self::from_raw(decoded.width(), decoded.height(), decoded.into_raw())
    }

    /// Decodes an encoded image held in memory, guessing the format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = ::image::load_from_memory(bytes)?.to_rgba8();
        Self::from_raw(decoded.width(), decoded.height(), decoded.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.region.width
    }

    pub fn height(&self) -> u32 {
        self.region.height
    }
}

impl ImageSurface for RgbaImage {
    fn image_data(&self, x: u32, y: u32, width: u32, height: u32) -> Result<ImageRegion> {
        let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
        if !fits(x, width, self.region.width) || !fits(y, height, self.region.height) {
            return Err(SonifyError::InvalidInput("requested region exceeds the image"));
        }

        let stride = self.region.width as usize * 4;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..y + height {
            let start = row as usize * stride + x as usize * 4;
            data.extend_from_slice(&self.region.data[start..start + width as usize * 4]);
        }
        ImageRegion::new(width, height, data)
    }
}
