//! QR code rendering for the terminal and the web surface.

use image::{ImageBuffer, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::{Error, Result};

fn encode(payload: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::Other(format!("QR generation failed: {}", e)))
}

/// Render with Unicode half blocks, two module rows per text line.
pub fn render_terminal(payload: &str) -> Result<String> {
    let code = encode(payload)?;
    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::new();
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
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

/// Render as PNG bytes with a white quiet zone.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = encode(payload)?;

    let module_size: u32 = 8;
    let quiet_zone: u32 = 4;
    let modules = code.width() as u32;
    let size = (modules + quiet_zone * 2) * module_size;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (cx, cy) = (x / module_size, y / module_size);
        if cx < quiet_zone || cy < quiet_zone {
            return Luma([255u8]);
        }
        let (mx, my) = (cx - quiet_zone, cy - quiet_zone);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| Error::Other(format!("PNG encoding failed: {}", e)))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_render_is_square_ish() {
        let out = render_terminal("2@abcdef,ghijkl,mnopqr").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        let width = lines[0].chars().count();
        assert!(width >= 21);
        assert_eq!(lines.len(), (width + 1) / 2);
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_png_signature() {
        let png = render_png("2@abcdef").unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
