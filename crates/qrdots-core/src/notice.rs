//! Уведомления для пользователя
//!
//! Любая ошибка ловится на границе операции и превращается в `Notice`,
//! который UI показывает как всплывающее сообщение.

use serde::{Deserialize, Serialize};

use crate::decoding::DecodeError;
use crate::encode::EncodeError;
use crate::generate::GenerateError;
use crate::scan::CameraError;
use crate::style::RenderError;
use crate::QrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NoticeKind {
    /// Цвет фона уведомления
    pub fn color(self) -> &'static str {
        match self {
            NoticeKind::Success => "#2ecc71",
            NoticeKind::Error => "#e74c3c",
            NoticeKind::Info => "#3498db",
            NoticeKind::Warning => "#f39c12",
        }
    }
}

/// Уведомление; в JSON уходит вместе с цветом фона для UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "NoticeWire", from = "NoticeWire")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
struct NoticeWire {
    kind: NoticeKind,
    message: String,
    #[serde(default, skip_deserializing)]
    color: &'static str,
}

impl From<Notice> for NoticeWire {
    fn from(notice: Notice) -> Self {
        Self {
            color: notice.kind.color(),
            kind: notice.kind,
            message: notice.message,
        }
    }
}

impl From<NoticeWire> for Notice {
    fn from(wire: NoticeWire) -> Self {
        Notice::new(wire.kind, wire.message)
    }
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, message)
    }
}

impl From<&CameraError> for Notice {
    fn from(err: &CameraError) -> Self {
        match err {
            CameraError::Denied => {
                Notice::error("Camera access denied. Please allow camera permission.")
            }
            CameraError::NotFound => Notice::error("No camera found on this device."),
            CameraError::Other(msg) => Notice::error(format!("Error accessing camera: {}", msg)),
        }
    }
}

/// Сбой декодирования кадра не фатален: сессия продолжает сканировать
impl From<&DecodeError> for Notice {
    fn from(_: &DecodeError) -> Self {
        Notice::warning("Error scanning QR code. Please try again.")
    }
}

impl From<&EncodeError> for Notice {
    fn from(_: &EncodeError) -> Self {
        Notice::error("Error generating QR code. Please try again.")
    }
}

impl From<&RenderError> for Notice {
    fn from(_: &RenderError) -> Self {
        Notice::error("Error generating QR code. Please try again.")
    }
}

impl From<&GenerateError> for Notice {
    fn from(err: &GenerateError) -> Self {
        match err {
            GenerateError::EmptyInput => {
                Notice::error("Please enter at least one field with text for the QR code")
            }
            GenerateError::Unchanged => Notice::info("QR code already generated"),
            GenerateError::Encode(e) => Notice::from(e),
            GenerateError::Render(e) => Notice::from(e),
        }
    }
}

impl From<&QrError> for Notice {
    fn from(err: &QrError) -> Self {
        match err {
            QrError::Render(e) => Notice::from(e),
            QrError::Decode(e) => Notice::from(e),
            QrError::Encode(e) => Notice::from(e),
            QrError::Camera(e) => Notice::from(e),
            QrError::Generate(e) => Notice::from(e),
            QrError::Config(msg) => Notice::error(format!("Invalid configuration: {}", msg)),
        }
    }
}
