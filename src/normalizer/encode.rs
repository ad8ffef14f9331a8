use crate::error::{PhotoTagError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// 再エンコード後のMIMEタイプ
///
/// 同じ形式で書き出せるのは JPEG / PNG / WebP のみ。それ以外は JPEG にする。
pub fn output_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/png" => "image/png",
        "image/webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// 画像をエンコードし、(MIMEタイプ, バイト列) を返す
///
/// `quality` はJPEGのみに効く（PNG/WebPは可逆）。
pub fn encode_image(image: &DynamicImage, mime_type: &str, quality: u8) -> Result<(&'static str, Vec<u8>)> {
    let out_mime = output_mime_type(mime_type);
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);

    match out_mime {
        "image/png" => image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| PhotoTagError::ImageEncode(e.to_string()))?,
        "image/webp" => DynamicImage::from(image.to_rgba8())
            .write_to(&mut cursor, ImageFormat::WebP)
            .map_err(|e| PhotoTagError::ImageEncode(e.to_string()))?,
        _ => {
            // JPEGはアルファを持てないのでRGBに落とす
            let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
            DynamicImage::from(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| PhotoTagError::ImageEncode(e.to_string()))?
        }
    }

    Ok((out_mime, buf))
}
