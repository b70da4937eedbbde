//! QR code rendering for approved bookings

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::application::ports::QrEncoder;
use crate::shared::{DomainError, DomainResult};

/// Encodes payloads as PNG QR codes (error correction level Q) and returns
/// the PNG as base64.
#[derive(Debug, Clone)]
pub struct PngQrEncoder {
    module_pixels: u32,
}

impl PngQrEncoder {
    pub fn new(module_pixels: u32) -> Self {
        Self {
            module_pixels: module_pixels.max(1),
        }
    }
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self::new(20)
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode(&self, payload: &str) -> DomainResult<String> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::Q)
            .map_err(|e| DomainError::Validation(format!("Cannot encode QR payload: {}", e)))?;
        let image = code
            .render::<Luma<u8>>()
            .module_dimensions(self.module_pixels, self.module_pixels)
            .build();

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| DomainError::Storage(format!("Failed to write QR image: {}", e)))?;

        Ok(STANDARD.encode(png.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_base64_png() {
        let encoded = PngQrEncoder::default()
            .encode("3f2b8c1e-0000-4000-8000-000000000001")
            .unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
