//! Fixture images for unit tests.

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8, 255])
    }))
}

fn encode(img: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub(crate) fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(gradient(width, height).to_rgb8()), ImageOutputFormat::Jpeg(95))
}

pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageOutputFormat::Png)
}
