//! Image encoding: `DynamicImage` → PNG bytes.
//!
//! PNG is used for both slide previews and code images. It is lossless,
//! which matters for a QR code: JPEG ringing around module edges makes
//! phone scanners miss the finder patterns at small print sizes.

use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode any raster as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode an RGBA canvas as PNG, keeping the alpha channel.
pub fn encode_rgba(img: RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    encode_png(&DynamicImage::ImageRgba8(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn alpha_survives_encoding() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let png = encode_rgba(img).unwrap();

        let back = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(back.get_pixel(0, 0)[3], 0);
        assert_eq!(back.get_pixel(1, 1)[3], 255);
    }
}
