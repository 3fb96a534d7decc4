//! Генерация стилизованного QR-кода
//!
//! Поля ввода -> текст -> растр внешнего энкодера -> круглые точки -> логотип.

use image::RgbaImage;
use thiserror::Error;

use crate::encode::{EncodeError, EncodeOptions, QrEncoder, QrcodeEncoder};
use crate::overlay::LogoOverlay;
use crate::payload::join_fields;
use crate::style::{DotReport, DotStyler, RenderError};

/// Ошибки генерации
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("No text to encode")]
    EmptyInput,

    #[error("Payload unchanged since last generation")]
    Unchanged,

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Готовый QR-код
#[derive(Debug, Clone)]
pub struct Generated {
    pub payload: String,
    pub image: RgbaImage,
    pub report: DotReport,
}

/// Генератор QR с запоминанием последнего текста
pub struct Generator<E: QrEncoder = QrcodeEncoder> {
    encoder: E,
    options: EncodeOptions,
    styler: DotStyler,
    logo: Option<LogoOverlay>,
    last_payload: Option<String>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(QrcodeEncoder, EncodeOptions::default(), DotStyler::default())
    }
}

impl<E: QrEncoder> Generator<E> {
    pub fn new(encoder: E, options: EncodeOptions, styler: DotStyler) -> Self {
        Self {
            encoder,
            options,
            styler,
            logo: None,
            last_payload: None,
        }
    }

    pub fn with_logo(mut self, logo: LogoOverlay) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn set_logo(&mut self, logo: Option<LogoOverlay>) {
        self.logo = logo;
    }

    /// Генерация из полей ввода.
    ///
    /// Тот же текст, что и в прошлый успешный раз, не перегенерируется.
    pub fn generate<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<Generated, GenerateError> {
        let payload = join_fields(fields).ok_or(GenerateError::EmptyInput)?;

        if self.last_payload.as_deref() == Some(payload.as_str()) {
            log::info!("Same QR code data, not generating again");
            return Err(GenerateError::Unchanged);
        }

        let generated = self.render(payload)?;
        self.last_payload = Some(generated.payload.clone());
        Ok(generated)
    }

    /// Генерация без проверки на повтор (например, из истории)
    pub fn render(&self, payload: String) -> Result<Generated, GenerateError> {
        log::info!("Generating QR code with rounded dots style");

        let mut image = self.encoder.encode(&payload, &self.options)?;
        let report = self.styler.apply(&mut image)?;

        if let Some(logo) = &self.logo {
            logo.composite(&mut image)?;
        }

        Ok(Generated {
            payload,
            image,
            report,
        })
    }

    /// Сброс запомненного текста (очистка полей)
    pub fn reset(&mut self) {
        self.last_payload = None;
    }

    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }
}
