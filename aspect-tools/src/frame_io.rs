//! 8-bit grayscale frames on disk.
//!
//! Any format the `image` crate decodes is accepted and converted to luma. Arrays
//! are indexed `[row, column]`, so an image `(x, y)` pixel lands at `[y, x]`.

use std::path::Path;

use image::{GrayImage, Luma};
use ndarray::Array2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameIoError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Convert a frame to an image buffer of the same size
pub fn array_to_gray_image(frame: &Array2<u8>) -> GrayImage {
    let (height, width) = frame.dim();
    let mut img = GrayImage::new(width as u32, height as u32);
    for ((y, x), &value) in frame.indexed_iter() {
        img.put_pixel(x as u32, y as u32, Luma([value]));
    }
    img
}

pub fn gray_image_to_array(img: GrayImage) -> Result<Array2<u8>, FrameIoError> {
    let (width, height) = img.dimensions();
    Ok(Array2::from_shape_vec(
        (height as usize, width as usize),
        img.into_raw(),
    )?)
}

/// Decode a frame file, converting colour images to luma
pub fn load_frame(path: &Path) -> Result<Array2<u8>, FrameIoError> {
    let img = image::open(path)?.to_luma8();
    gray_image_to_array(img)
}

/// Encode a frame; the format follows the file extension
pub fn save_frame(frame: &Array2<u8>, path: &Path) -> Result<(), FrameIoError> {
    array_to_gray_image(frame).save(path)?;
    Ok(())
}
