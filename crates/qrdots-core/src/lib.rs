//! qrdots core - генерация и сканирование QR-кодов
//!
//! Библиотека для PWA-генератора/сканера QR-кодов:
//! - Стилизация готового QR "круглыми точками" с логотипом в центре
//! - Цикл распознавания QR-кодов с камеры, кадр за кадром
//! - Декодирование через rqrr с fallback на rxing
//! - Генерация растра через qrcode

pub mod decoding;
pub mod encode;
pub mod generate;
pub mod geometry;
pub mod notice;
pub mod overlay;
pub mod payload;
pub mod scan;
pub mod style;

pub use decoding::{rgba_len, DecodeError, Detection, FrameDecoder, InversionPolicy, QRDecoder};
pub use encode::{EncodeError, EncodeOptions, ErrorCorrectionLevel, QrEncoder, QrcodeEncoder};
pub use generate::{GenerateError, Generated, Generator};
pub use geometry::{Point, Quad};
pub use notice::{Notice, NoticeKind};
pub use overlay::{draw_detection_box, LogoOverlay, OverlayConfig};
pub use scan::{
    Camera, CameraError, CameraStream, FacingMode, FrameScheduler, FrameSource, FrameToken,
    ScanConfig, ScanSession, ScanState, TickOutcome,
};
pub use style::{infer_module_size, DotReport, DotStyler, ModuleSize, RenderError, StyleConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum QrError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Generate error: {0}")]
    Generate(#[from] GenerateError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Полная конфигурация приложения
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub style: StyleConfig,
    pub overlay: OverlayConfig,
    pub encode: EncodeOptions,
    pub scan: ScanConfig,
}

impl AppConfig {
    /// Загрузка из JSON; отсутствующие поля берутся по умолчанию
    pub fn from_json(json: &str) -> Result<Self, QrError> {
        let config: Self = serde_json::from_str(json).map_err(|e| QrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), QrError> {
        if !(self.style.dot_ratio > 0.0 && self.style.dot_ratio <= 1.0) {
            return Err(QrError::Config(format!(
                "dot_ratio must be in (0, 1], got {}",
                self.style.dot_ratio
            )));
        }
        if self.style.fallback_modules == 0 {
            return Err(QrError::Config("fallback_modules must be positive".to_string()));
        }
        if !(self.overlay.logo_fraction > 0.0 && self.overlay.logo_fraction < 1.0) {
            return Err(QrError::Config(format!(
                "logo_fraction must be in (0, 1), got {}",
                self.overlay.logo_fraction
            )));
        }
        encode::parse_hex_color(&self.encode.color_dark)?;
        encode::parse_hex_color(&self.encode.color_light)?;
        Ok(())
    }

    /// Генератор по этой конфигурации
    pub fn generator(&self) -> Generator {
        Generator::new(
            QrcodeEncoder,
            self.encode.clone(),
            DotStyler::new(self.style.clone()),
        )
    }
}
