use std::path::Path;

use crate::error::{Error, Result};
use crate::spatial::GeoCoord;

/// Single-channel equirectangular elevation grid covering -180..180 longitude
/// and -90..90 latitude. Row 0 is the north edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationRaster {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl ElevationRaster {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Raster(format!("empty raster {width}x{height}")));
        }
        if data.len() != width * height {
            return Err(Error::Raster(format!(
                "raster {width}x{height} needs {} bytes, got {}",
                width * height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decodes an image file, keeping the red channel.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|err| Error::Raster(format!("{}: {err}", path.display())))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let data = image.pixels().map(|pixel| pixel.0[0]).collect();
        Self::new(width as usize, height as usize, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Nearest-pixel index for a coordinate, clamped onto the grid.
    pub fn pixel(&self, coord: GeoCoord) -> (usize, usize) {
        let w = self.width as f64;
        let h = self.height as f64;
        let x = (w * (coord.lon + 180.0) / 360.0).floor();
        let y = h - (h * (coord.lat + 90.0) / 180.0).floor();
        let x = x.clamp(0.0, w - 1.0) as usize;
        let y = y.clamp(0.0, h - 1.0) as usize;
        (x, y)
    }

    pub fn sample(&self, coord: GeoCoord) -> u8 {
        let (x, y) = self.pixel(coord);
        self.data[y * self.width + x]
    }
}
