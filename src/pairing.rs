//! Pairing QR rendering
//!
//! Turns a pairing payload into a PNG (for the `/qr` page) and into a
//! compact Unicode rendering (for operators watching the logs).

use crate::error::{ReplyError, Result};
use base64::Engine;
use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};

/// Minimum edge length of the rendered PNG, in pixels
pub const QR_MIN_SIZE: u32 = 256;

/// Light modules around the symbol
const QUIET_ZONE: u32 = 2;

fn encode(payload: &str) -> Result<QrCode> {
    if payload.is_empty() {
        return Err(ReplyError::Render("Empty pairing payload".to_string()));
    }
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| ReplyError::Render(format!("QR generation failed: {e}")))
}

/// Render `payload` as a PNG at least `QR_MIN_SIZE` pixels wide.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = encode(payload)?;

    let modules = code.width() as u32;
    let span = modules + QUIET_ZONE * 2;
    let module_size = QR_MIN_SIZE.div_ceil(span).max(1);
    let img_size = span * module_size;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let (cx, cy) = (x / module_size, y / module_size);
        if cx < QUIET_ZONE || cy < QUIET_ZONE {
            return Luma([255u8]);
        }
        let (mx, my) = (cx - QUIET_ZONE, cy - QUIET_ZONE);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ReplyError::Render(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Render `payload` as base64-encoded PNG, ready for a `data:` URI.
pub fn render_png_base64(payload: &str) -> Result<String> {
    let png = render_png(payload)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

/// Render `payload` for a terminal, two module rows per text line.
pub fn render_terminal(payload: &str) -> Result<String> {
    let code = encode(payload)?;
    let width = code.width();
    let colors = code.into_colors();
    let is_dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::new();
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_render_png_is_png_of_min_size() {
        let png = render_png("2@abc,def,ghi").unwrap();
        assert!(png.starts_with(PNG_MAGIC));

        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert!(img.width() >= QR_MIN_SIZE);
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn test_render_png_base64_decodes() {
        let b64 = render_png_base64("pairing-payload").unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .unwrap();
        assert!(raw.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_distinct_payloads_render_differently() {
        let a = render_png_base64("payload-one").unwrap();
        let b = render_png_base64("payload-two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_render_terminal_dimensions() {
        let text = render_terminal("ABCD-1234").unwrap();
        let code = QrCode::with_error_correction_level(b"ABCD-1234", EcLevel::M).unwrap();
        let width = code.width();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), width.div_ceil(2));
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(render_png(""), Err(ReplyError::Render(_))));
        assert!(render_terminal("").is_err());
    }
}
