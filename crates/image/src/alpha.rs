//! Alpha channel removal for lossy outputs that cannot carry transparency.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, Rgba};

/// White, the background used when converting transparent images to JPEG.
pub const WHITE: [u8; 3] = [255, 255, 255];

/// Remove alpha channel from an image by compositing over a solid background
pub fn remove_alpha_channel(img: &DynamicImage, background_color: [u8; 3]) -> DynamicImage {
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();

    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in rgba_img.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;

        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;

        let blend = |c: u8, bg: u8| ((c as f32 * alpha) + (bg as f32 * inv_alpha)).round() as u8;

        output.put_pixel(
            x,
            y,
            Rgb([
                blend(r, background_color[0]),
                blend(g, background_color[1]),
                blend(b, background_color[2]),
            ]),
        );
    }

    DynamicImage::ImageRgb8(output)
}

/// Flatten transparency with a hard threshold.
///
/// Pixels whose alpha is at least `threshold` keep their colour and become
/// opaque; every other pixel becomes opaque `background_color`.
pub fn flatten_transparency(
    img: &DynamicImage,
    threshold: u8,
    background_color: [u8; 3],
) -> DynamicImage {
    let mut rgba_img = img.to_rgba8();

    for pixel in rgba_img.pixels_mut() {
        if pixel[3] < threshold {
            *pixel = Rgba([background_color[0], background_color[1], background_color[2], 255]);
        } else {
            pixel[3] = 255;
        }
    }

    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba_img).to_rgb8())
}

/// Check if an image has an alpha channel
pub fn has_alpha_channel(img: &DynamicImage) -> bool {
    img.color().has_alpha()
}

/// Check if any pixel is not fully opaque.
pub fn has_transparent_pixels(img: &DynamicImage) -> bool {
    has_alpha_channel(img) && img.to_rgba8().pixels().any(|p| p[3] < 255)
}
