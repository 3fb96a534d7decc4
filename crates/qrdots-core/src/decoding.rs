//! Модуль декодирования QR-кодов из кадров камеры
//!
//! Использует rqrr как основной декодер с fallback на rxing.
//! Кадр приходит как сырой RGBA-буфер (как из canvas.getImageData()).

use std::collections::HashSet;

use rxing::qrcode::QRCodeReader;
use rxing::{BarcodeFormat, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Reader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point, Quad};

/// Ошибки декодирования
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode QR: {0}")]
    DecodeFailed(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// Политика попыток с инвертированной яркостью
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InversionPolicy {
    /// Только исходная полярность
    DontInvert,
    /// Только инвертированная
    OnlyInvert,
    /// Сначала исходная, затем инвертированная
    #[default]
    AttemptBoth,
    /// Сначала инвертированная, затем исходная
    InvertFirst,
}

impl InversionPolicy {
    /// Порядок попыток: false - исходная полярность, true - инвертированная
    pub fn attempts(self) -> &'static [bool] {
        match self {
            InversionPolicy::DontInvert => &[false],
            InversionPolicy::OnlyInvert => &[true],
            InversionPolicy::AttemptBoth => &[false, true],
            InversionPolicy::InvertFirst => &[true, false],
        }
    }
}

/// Найденный код: текст и положение в кадре
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub payload: String,
    pub location: Quad,
}

/// Внешний декодер кадров.
///
/// `Ok(None)` - кода в кадре нет, это не ошибка.
pub trait FrameDecoder {
    fn detect(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        policy: InversionPolicy,
    ) -> Result<Option<Detection>, DecodeError>;
}

/// Декодер на rqrr с fallback на rxing
pub struct QRDecoder {
    /// Пробовать rxing, если rqrr ничего не нашёл
    use_rxing: bool,
}

impl Default for QRDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for QRDecoder {
    fn detect(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        policy: InversionPolicy,
    ) -> Result<Option<Detection>, DecodeError> {
        let luma = rgba_to_luma(pixels, width, height)?;

        for &inverted in policy.attempts() {
            let result = if inverted {
                log::debug!("Trying inverted frame");
                self.decode_luma(&invert(&luma), width, height)
            } else {
                self.decode_luma(&luma, width, height)
            };

            if let Some(detection) = result {
                return Ok(Some(detection));
            }
        }

        Ok(None)
    }
}

impl QRDecoder {
    pub fn new() -> Self {
        Self { use_rxing: true }
    }

    /// Декодер только на rqrr (быстрее, для слабых устройств)
    pub fn rqrr_only() -> Self {
        Self { use_rxing: false }
    }

    fn decode_luma(&self, luma: &[u8], width: u32, height: u32) -> Option<Detection> {
        if let Some(detection) = self.decode_with_rqrr(luma, width, height) {
            return Some(detection);
        }
        if self.use_rxing {
            return self.decode_with_rxing(luma, width, height);
        }
        None
    }

    /// Декодирование через rqrr
    fn decode_with_rqrr(&self, luma: &[u8], width: u32, height: u32) -> Option<Detection> {
        let w = width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w, height as usize, |x, y| luma[y * w + x]);
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        for grid in &grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    // Углы rqrr: от левого верхнего по часовой стрелке
                    let corner = |i: usize| {
                        let p = &grid.bounds[i];
                        Point::new(p.x as f32, p.y as f32)
                    };
                    return Some(Detection {
                        payload: content,
                        location: Quad::new(corner(0), corner(1), corner(2), corner(3)),
                    });
                }
                Err(e) => {
                    log::debug!("RQRR: Decode failed: {:?}", e);
                }
            }
        }

        None
    }

    /// Декодирование через rxing (fallback)
    fn decode_with_rxing(&self, luma: &[u8], width: u32, height: u32) -> Option<Detection> {
        // Packed ARGB u32: 0xAARRGGBB
        let pixels: Vec<u32> = luma
            .iter()
            .map(|&gray| {
                let g = gray as u32;
                0xFF000000 | (g << 16) | (g << 8) | g
            })
            .collect();

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut bitmap = rxing::BinaryBitmap::new(rxing::common::HybridBinarizer::new(source));

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(HashSet::from([BarcodeFormat::QR_CODE])),
        );
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));

        let mut reader = QRCodeReader::new();
        match reader.decode_with_hints(&mut bitmap, &hints) {
            Ok(result) => {
                // rxing отдаёт центры finder pattern, а не углы
                let points: Vec<Point> = result
                    .getPoints()
                    .iter()
                    .map(|p| Point::new(p.x, p.y))
                    .collect();
                let location = Quad::bounding(&points).unwrap_or_else(|| full_frame(width, height));

                log::debug!("RXING: Decode success");
                Some(Detection {
                    payload: result.getText().to_string(),
                    location,
                })
            }
            Err(e) => {
                log::debug!("RXING: Not found: {}", e);
                None
            }
        }
    }
}

fn full_frame(width: u32, height: u32) -> Quad {
    let (w, h) = (width as f32, height as f32);
    Quad::new(
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    )
}

/// Длина RGBA-буфера для кадра `width x height`, `None` при переполнении
pub fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
}

/// Конвертация RGBA в яркость по ITU-R BT.601
pub fn rgba_to_luma(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    let needed = rgba_len(width, height).ok_or_else(|| {
        DecodeError::InvalidImage(format!("{}x{} frame is too large", width, height))
    })?;
    if needed == 0 {
        return Err(DecodeError::InvalidImage("empty frame".to_string()));
    }
    if rgba.len() < needed {
        return Err(DecodeError::InvalidImage(format!(
            "buffer holds {} bytes, {}x{} RGBA needs {}",
            rgba.len(),
            width,
            height,
            needed
        )));
    }

    Ok(rgba
        .chunks_exact(4)
        .take(needed / 4)
        .map(|px| {
            let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
            (0.299 * r + 0.587 * g + 0.114 * b) as u8
        })
        .collect())
}

/// Инвертирование яркости
fn invert(luma: &[u8]) -> Vec<u8> {
    luma.iter().map(|&v| 255 - v).collect()
}
