//! Наложения поверх растра: логотип в центре QR и рамка найденного кода
//!
//! Логотип занимает около трети ширины и должен укладываться в запас
//! коррекции ошибок уровня H, чтобы код оставался читаемым.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Quad};
use crate::style::RenderError;

/// Цвет рамки найденного кода (#2ecc71)
pub const DETECTION_BOX_COLOR: Rgba<u8> = Rgba([0x2e, 0xcc, 0x71, 0xff]);

/// Толщина рамки в пикселях
pub const DETECTION_BOX_WIDTH: u32 = 4;

/// Конфигурация наложения логотипа
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Сторона логотипа как доля ширины растра
    pub logo_fraction: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            logo_fraction: 1.0 / 3.0,
        }
    }
}

/// Логотип для центра QR-кода
#[derive(Debug, Clone)]
pub struct LogoOverlay {
    logo: RgbaImage,
    config: OverlayConfig,
}

impl LogoOverlay {
    pub fn new(logo: RgbaImage, config: OverlayConfig) -> Self {
        Self { logo, config }
    }

    /// Загрузка логотипа из PNG/JPEG
    pub fn from_bytes(bytes: &[u8], config: OverlayConfig) -> Result<Self, RenderError> {
        let logo = image::load_from_memory(bytes)
            .map_err(|e| RenderError::Overlay(e.to_string()))?
            .to_rgba8();
        Ok(Self::new(logo, config))
    }

    /// Сторона логотипа для растра шириной `width`
    pub fn side_for(&self, width: u32) -> u32 {
        ((width as f32 * self.config.logo_fraction).round() as u32).clamp(1, width.max(1))
    }

    /// Наложение логотипа по центру с учётом альфа-канала
    pub fn composite(&self, bitmap: &mut RgbaImage) -> Result<(), RenderError> {
        let (width, height) = bitmap.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyBitmap);
        }

        let side = self.side_for(width);
        let scaled = imageops::resize(&self.logo, side, side, FilterType::Triangle);

        let x = (width as i64 - side as i64) / 2;
        let y = (height as i64 - side as i64) / 2;
        imageops::overlay(bitmap, &scaled, x, y);

        log::debug!("Logo composited at ({}, {}), side {}", x, y, side);
        Ok(())
    }
}

/// Рамка вокруг найденного кода: TL -> TR -> BR -> BL -> TL
pub fn draw_detection_box(frame: &mut RgbaImage, quad: &Quad) {
    let half = (DETECTION_BOX_WIDTH as f32 - 1.0) / 2.0;

    for (from, to) in quad.edges() {
        let (nx, ny) = unit_normal(from, to);

        // Толстая линия как набор параллельных отрезков
        for step in 0..DETECTION_BOX_WIDTH {
            let offset = step as f32 - half;
            draw_line_segment_mut(
                frame,
                (from.x + nx * offset, from.y + ny * offset),
                (to.x + nx * offset, to.y + ny * offset),
                DETECTION_BOX_COLOR,
            );
        }
    }
}

fn unit_normal(from: Point, to: Point) -> (f32, f32) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < f32::EPSILON {
        return (0.0, 0.0);
    }
    (-dy / len, dx / len)
}
