//! Raster input and report output.
//!
//! Bands are read through the `image` crate, so any format it decodes
//! (PNG, TIFF, ...) works as a cloud mask. Band indices are 1-based and
//! map onto the image's channels.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use ndarray::Array2;

use crate::error::{Result, ShadowError};
use crate::pipeline::ShadowReport;

fn band_from_raw<T: Copy + Into<f32>>(
    raw: &[T],
    channels: usize,
    channel: usize,
    width: usize,
    height: usize,
) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(r, c)| {
        raw[(r * width + c) * channels + channel].into()
    })
}

/// Read one band of a raster as `f32`, shaped `(height, width)`.
pub fn read_band(path: impl AsRef<Path>, band: usize) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let format_err = |reason: String| ShadowError::Format {
        path: path.to_path_buf(),
        reason,
    };
    let io_err = |source| ShadowError::SourceIo {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(|e| format_err(e.to_string()))?;

    let channels = img.color().channel_count() as usize;
    if band == 0 || band > channels {
        return Err(format_err(format!(
            "band {band} requested but the raster has {channels} band(s)"
        )));
    }
    let (w, h) = (img.width() as usize, img.height() as usize);
    let ch = band - 1;

    let data = match &img {
        DynamicImage::ImageLuma8(b) => band_from_raw(b.as_raw(), 1, ch, w, h),
        DynamicImage::ImageLumaA8(b) => band_from_raw(b.as_raw(), 2, ch, w, h),
        DynamicImage::ImageRgb8(b) => band_from_raw(b.as_raw(), 3, ch, w, h),
        DynamicImage::ImageRgba8(b) => band_from_raw(b.as_raw(), 4, ch, w, h),
        DynamicImage::ImageLuma16(b) => band_from_raw(b.as_raw(), 1, ch, w, h),
        DynamicImage::ImageLumaA16(b) => band_from_raw(b.as_raw(), 2, ch, w, h),
        DynamicImage::ImageRgb16(b) => band_from_raw(b.as_raw(), 3, ch, w, h),
        DynamicImage::ImageRgba16(b) => band_from_raw(b.as_raw(), 4, ch, w, h),
        DynamicImage::ImageRgb32F(b) => band_from_raw(b.as_raw(), 3, ch, w, h),
        DynamicImage::ImageRgba32F(b) => band_from_raw(b.as_raw(), 4, ch, w, h),
        other => {
            return Err(format_err(format!(
                "unsupported pixel layout {:?}",
                other.color()
            )))
        }
    };

    log::debug!("read band {band} of {} ({w}x{h})", path.display());
    Ok(data)
}

/// Write a report as pretty-printed JSON.
pub fn write_report(path: impl AsRef<Path>, report: &ShadowReport) -> Result<()> {
    let path = path.as_ref();
    let output_err = |reason: String| ShadowError::Output {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::create(path).map_err(|e| output_err(e.to_string()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .map_err(|e| output_err(e.to_string()))?;
    log::debug!("wrote report to {}", path.display());
    Ok(())
}
