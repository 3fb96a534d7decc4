//! Модуль стилизации QR-кода "круглыми точками"
//!
//! Принимает готовый чёрно-белый QR (отрисованный внешним энкодером),
//! восстанавливает сетку модулей по пикселям и перерисовывает каждый
//! тёмный модуль кругом.
//!
//! Контракт на входе: квадратное RGBA-изображение, модули чистого чёрного
//! цвета `(0,0,0)` на белом фоне.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::covers_pixel;

/// Ошибки рендеринга
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No drawing surface available")]
    MissingSurface,

    #[error("Bitmap is empty")]
    EmptyBitmap,

    #[error("Bitmap must be square, got {width}x{height}")]
    NotSquare { width: u32, height: u32 },

    #[error("Failed to load overlay image: {0}")]
    Overlay(String),
}

/// Конфигурация стилизации
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Радиус точки как доля размера модуля
    pub dot_ratio: f32,
    /// Порог яркости (красный канал), ниже которого модуль тёмный
    pub dark_threshold: u8,
    /// Число модулей для запасной оценки размера (size / N)
    pub fallback_modules: u32,
    /// Цвет фона
    pub background: [u8; 4],
    /// Цвет точек
    pub foreground: [u8; 4],
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            dot_ratio: 0.42,
            dark_threshold: 128,
            fallback_modules: 33,
            background: [255, 255, 255, 255],
            foreground: [0, 0, 0, 255],
        }
    }
}

/// Оценка размера модуля
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSize {
    /// Размер модуля в пикселях, всегда в диапазоне [1, size]
    pub pixels: u32,
    /// true, если в строке 0 не нашлось тёмного пикселя
    pub used_fallback: bool,
}

/// Итог стилизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotReport {
    pub module_size: u32,
    pub used_fallback: bool,
    pub radius: f32,
    /// Количество нарисованных точек
    pub dots: usize,
}

/// Оценка размера модуля по строке 0.
///
/// Ищет первый пиксель с красным каналом 0 и считает длину тёмной серии.
/// Без тёмных пикселей в строке 0 возвращает `size / fallback_modules`.
pub fn infer_module_size(bitmap: &RgbaImage, fallback_modules: u32) -> ModuleSize {
    let size = bitmap.width();

    let run = (0..size)
        .position(|x| bitmap.get_pixel(x, 0).0[0] == 0)
        .map(|start| {
            (start as u32..size)
                .take_while(|&x| bitmap.get_pixel(x, 0).0[0] == 0)
                .count() as u32
        });

    match run {
        Some(pixels) => ModuleSize {
            pixels,
            used_fallback: false,
        },
        None => {
            let pixels = (size / fallback_modules.max(1)).clamp(1, size.max(1));
            log::warn!(
                "No dark pixel in row 0, falling back to module size {} ({} / {})",
                pixels,
                size,
                fallback_modules
            );
            ModuleSize {
                pixels,
                used_fallback: true,
            }
        }
    }
}

/// Стилизатор "круглые точки"
pub struct DotStyler {
    config: StyleConfig,
}

impl Default for DotStyler {
    fn default() -> Self {
        Self::new(StyleConfig::default())
    }
}

impl DotStyler {
    pub fn new(config: StyleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    /// Стилизация поверхности, которой может не быть.
    ///
    /// Отсутствие поверхности - ошибка вызывающего кода, а не пустая операция.
    pub fn apply_to_surface(&self, surface: Option<&mut RgbaImage>) -> Result<DotReport, RenderError> {
        let bitmap = surface.ok_or(RenderError::MissingSurface)?;
        self.apply(bitmap)
    }

    /// Перерисовка QR круглыми точками на месте
    pub fn apply(&self, bitmap: &mut RgbaImage) -> Result<DotReport, RenderError> {
        let (width, height) = bitmap.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyBitmap);
        }
        if width != height {
            return Err(RenderError::NotSquare { width, height });
        }

        let size = width;
        log::info!("Starting rounded dots transformation, size: {}", size);

        // Снимок исходника: после заливки фона читать уже нечего
        let original = bitmap.clone();

        let module = infer_module_size(&original, self.config.fallback_modules);
        let m = module.pixels;
        let radius = m as f32 * self.config.dot_ratio;
        log::info!("Module size detected: {}, dot radius: {:.2}", m, radius);

        let centers = self.dark_cells(&original, m);

        let background = Rgba(self.config.background);
        for pixel in bitmap.pixels_mut() {
            *pixel = background;
        }

        let foreground = Rgba(self.config.foreground);
        for &(cx, cy) in &centers {
            fill_circle(bitmap, cx, cy, radius, foreground);
        }

        log::info!("Finished, drew {} rounded dots", centers.len());

        Ok(DotReport {
            module_size: m,
            used_fallback: module.used_fallback,
            radius,
            dots: centers.len(),
        })
    }

    /// Центры тёмных ячеек сетки с шагом `m`
    fn dark_cells(&self, original: &RgbaImage, m: u32) -> Vec<(f32, f32)> {
        let size = original.width();
        let half = m / 2;
        let mut centers = Vec::new();

        for y in (0..size).step_by(m as usize) {
            for x in (0..size).step_by(m as usize) {
                let sample_x = (x + half).min(size - 1);
                let sample_y = (y + half).min(size - 1);

                if original.get_pixel(sample_x, sample_y).0[0] < self.config.dark_threshold {
                    centers.push((x as f32 + m as f32 / 2.0, y as f32 + m as f32 / 2.0));
                }
            }
        }

        centers
    }
}

/// Заливка круга без сглаживания: пиксель закрашен, если его центр внутри
fn fill_circle(bitmap: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let (width, height) = bitmap.dimensions();

    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil() as u32).min(width);
    let y1 = ((cy + radius).ceil() as u32).min(height);

    for py in y0..y1 {
        for px in x0..x1 {
            if covers_pixel(cx, cy, radius, px, py) {
                bitmap.put_pixel(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// Шахматка из модулей `m` px, модуль (0, 0) тёмный
    fn checkerboard(size: u32, m: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if ((x / m) + (y / m)) % 2 == 0 {
                BLACK
            } else {
                WHITE
            }
        })
    }

    #[test]
    fn test_infer_module_size_from_first_run() {
        let img = checkerboard(60, 6);
        let module = infer_module_size(&img, 33);
        assert_eq!(module.pixels, 6);
        assert!(!module.used_fallback);
    }

    #[test]
    fn test_infer_module_size_skips_leading_light() {
        let mut img = RgbaImage::from_pixel(40, 40, WHITE);
        for x in 5..9 {
            img.put_pixel(x, 0, BLACK);
        }
        assert_eq!(infer_module_size(&img, 33).pixels, 4);
    }

    #[test]
    fn test_infer_module_size_fallback() {
        let img = RgbaImage::from_pixel(220, 220, WHITE);
        let module = infer_module_size(&img, 33);
        assert_eq!(module.pixels, 6);
        assert!(module.used_fallback);
    }

    #[test]
    fn test_infer_module_size_fallback_tiny_bitmap() {
        let img = RgbaImage::from_pixel(10, 10, WHITE);
        assert_eq!(infer_module_size(&img, 33).pixels, 1);
    }

    #[test]
    fn test_rejects_non_square() {
        let mut img = RgbaImage::from_pixel(20, 10, WHITE);
        let result = DotStyler::default().apply(&mut img);
        assert!(matches!(result, Err(RenderError::NotSquare { width: 20, height: 10 })));
        // Ничего не нарисовано
        assert!(img.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_rejects_empty_and_missing_surface() {
        let styler = DotStyler::default();
        let mut empty = RgbaImage::new(0, 0);
        assert!(matches!(styler.apply(&mut empty), Err(RenderError::EmptyBitmap)));
        assert!(matches!(
            styler.apply_to_surface(None),
            Err(RenderError::MissingSurface)
        ));
    }

    #[test]
    fn test_scenario_220_module_6() {
        let mut img = checkerboard(220, 6);
        let report = DotStyler::default().apply(&mut img).unwrap();

        assert_eq!(report.module_size, 6);
        assert!((report.radius - 2.52).abs() < 1e-4);
        // 37x37 ячеек, тёмные - где (i + j) чётно; последняя ячейка обрезана краем
        let expected = (0..37u32)
            .flat_map(|j| (0..37u32).map(move |i| (i, j)))
            .filter(|(i, j)| {
                let sx = (i * 6 + 3).min(219);
                let sy = (j * 6 + 3).min(219);
                ((sx / 6) + (sy / 6)) % 2 == 0
            })
            .count();
        assert_eq!(report.dots, expected);

        // Центр тёмного модуля (0, 0) закрашен, его угол - уже фон
        assert_eq!(*img.get_pixel(3, 3), BLACK);
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        // Светлый модуль (1, 0) остался фоном
        assert_eq!(*img.get_pixel(9, 3), WHITE);
    }

    #[test]
    fn test_output_is_two_colors_only() {
        let mut img = checkerboard(99, 9);
        // Серый мусор в середине должен исчезнуть
        img.put_pixel(50, 50, Rgba([120, 90, 200, 255]));
        DotStyler::default().apply(&mut img).unwrap();
        assert!(img.pixels().all(|p| *p == WHITE || *p == BLACK));
    }

    #[test]
    fn test_second_pass_does_not_crash() {
        let styler = DotStyler::default();
        let mut img = checkerboard(66, 6);
        styler.apply(&mut img).unwrap();
        let second = styler.apply(&mut img).unwrap();
        assert!(second.module_size >= 1 && second.module_size <= 66);
    }

    #[test]
    fn test_custom_colors() {
        let config = StyleConfig {
            foreground: [10, 20, 30, 255],
            background: [250, 240, 230, 255],
            ..StyleConfig::default()
        };
        let mut img = checkerboard(30, 10);
        DotStyler::new(config).apply(&mut img).unwrap();
        assert_eq!(img.get_pixel(5, 5).0, [10, 20, 30, 255]);
        assert_eq!(img.get_pixel(15, 5).0, [250, 240, 230, 255]);
    }
}
