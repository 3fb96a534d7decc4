//! Модуль генерации QR-кодов
//!
//! Кодирование делегировано крейту `qrcode`; здесь только отрисовка матрицы
//! модулей в RGBA-растр заданного размера, без quiet zone.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ошибки генерации
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to encode QR: {0}")]
    EncodeFailed(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Target size {size}px is smaller than {modules} modules")]
    TooSmall { size: u32, modules: u32 },
}

/// Уровень коррекции ошибок
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCorrectionLevel {
    L, // ~7%
    M, // ~15%
    Q, // ~25%
    H, // ~30%
}

impl From<ErrorCorrectionLevel> for EcLevel {
    fn from(level: ErrorCorrectionLevel) -> Self {
        match level {
            ErrorCorrectionLevel::L => EcLevel::L,
            ErrorCorrectionLevel::M => EcLevel::M,
            ErrorCorrectionLevel::Q => EcLevel::Q,
            ErrorCorrectionLevel::H => EcLevel::H,
        }
    }
}

/// Параметры генерации
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Сторона растра в пикселях
    pub size: u32,
    /// Цвет тёмных модулей, `#rrggbb`
    pub color_dark: String,
    /// Цвет фона, `#rrggbb`
    pub color_light: String,
    pub error_correction: ErrorCorrectionLevel,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            size: 220,
            color_dark: "#000000".to_string(),
            color_light: "#ffffff".to_string(),
            // Запас под логотип в центре
            error_correction: ErrorCorrectionLevel::H,
        }
    }
}

/// Внешний генератор QR-растра
pub trait QrEncoder {
    fn encode(&self, text: &str, options: &EncodeOptions) -> Result<RgbaImage, EncodeError>;
}

/// Генератор на крейте `qrcode`
#[derive(Debug, Default, Clone, Copy)]
pub struct QrcodeEncoder;

impl QrEncoder for QrcodeEncoder {
    fn encode(&self, text: &str, options: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        let dark = parse_hex_color(&options.color_dark)?;
        let light = parse_hex_color(&options.color_light)?;

        let code = QrCode::with_error_correction_level(text.as_bytes(), options.error_correction.into())
            .map_err(|e| EncodeError::EncodeFailed(e.to_string()))?;

        let modules = code.width() as u32;
        let size = options.size;
        if size < modules {
            return Err(EncodeError::TooSmall { size, modules });
        }

        log::info!("Encoding {} bytes into {} modules, {}px", text.len(), modules, size);

        let colors = code.to_colors();
        let mut img = RgbaImage::from_pixel(size, size, light);

        // Модуль i занимает [i*size/n, (i+1)*size/n)
        let edge = |i: u32| i * size / modules;

        for row in 0..modules {
            for col in 0..modules {
                if colors[(row * modules + col) as usize] != Color::Dark {
                    continue;
                }
                let (x0, x1) = (edge(col), edge(col + 1));
                let (y0, y1) = (edge(row), edge(row + 1));
                let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
                draw_filled_rect_mut(&mut img, rect, dark);
            }
        }

        Ok(img)
    }
}

/// Разбор цвета `#rrggbb`
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>, EncodeError> {
    let hex = value
        .strip_prefix('#')
        .filter(|h| h.len() == 6 && h.is_ascii())
        .ok_or_else(|| EncodeError::InvalidColor(value.to_string()))?;

    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| EncodeError::InvalidColor(value.to_string()))
    };

    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#2ecc71").unwrap(), Rgba([0x2e, 0xcc, 0x71, 255]));
        assert!(parse_hex_color("2ecc71").is_err());
        assert!(parse_hex_color("#2ecc7").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_encode_is_pure_two_color() {
        let img = QrcodeEncoder.encode("hello", &EncodeOptions::default()).unwrap();
        assert_eq!(img.dimensions(), (220, 220));
        assert!(img
            .pixels()
            .all(|p| p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]));
        // Без quiet zone угол - finder pattern
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_encode_too_small() {
        let options = EncodeOptions {
            size: 10,
            ..EncodeOptions::default()
        };
        let result = QrcodeEncoder.encode("hello", &options);
        assert!(matches!(result, Err(EncodeError::TooSmall { size: 10, .. })));
    }
}
