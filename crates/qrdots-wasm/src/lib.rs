//! WASM bindings для генератора и сканера QR
//!
//! Предоставляет JavaScript API: стилизация canvas "круглыми точками",
//! генерация QR и сессия сканирования, которую JS тикает из
//! requestAnimationFrame.

use image::RgbaImage;
use js_sys::Function;
use qrdots_core::{
    draw_detection_box, rgba_len, AppConfig, CameraError, CameraStream, DotStyler,
    FrameScheduler, FrameSource, FrameToken, GenerateError, Generator, LogoOverlay, Notice,
    QRDecoder, QrError, Quad, ScanSession, ScanState, StyleConfig, TickOutcome,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;
use web_sys::ImageData;

/// Инициализация panic hook и логирования
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
    log::info!("qrdots WASM module initialized");
}

/// Ошибка для JS: текст уведомления, который можно сразу показать
fn to_js_error(err: &QrError) -> JsError {
    JsError::new(&Notice::from(err).message)
}

fn parse_config(config: JsValue) -> Result<AppConfig, JsError> {
    if config.is_undefined() || config.is_null() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig =
        serde_wasm_bindgen::from_value(config).map_err(|e| JsError::new(&e.to_string()))?;
    config.validate().map_err(|e| to_js_error(&e))?;
    Ok(config)
}

fn to_image_data(img: &RgbaImage) -> Result<ImageData, JsError> {
    ImageData::new_with_u8_clamped_array_and_sh(Clamped(img.as_raw()), img.width(), img.height())
        .map_err(|e| JsError::new(&format!("{:?}", e)))
}

/// Стилизация пикселей canvas на месте
///
/// @param data - Uint8ClampedArray из ctx.getImageData()
/// @returns отчёт {module_size, used_fallback, radius, dots}
#[wasm_bindgen(js_name = applyRoundedDots)]
pub fn apply_rounded_dots(data: &mut [u8], width: u32, height: u32) -> Result<JsValue, JsError> {
    let mut surface = RgbaImage::from_raw(width, height, data.to_vec());
    let report = DotStyler::new(StyleConfig::default())
        .apply_to_surface(surface.as_mut())
        .map_err(|e| to_js_error(&QrError::from(e)))?;

    if let Some(styled) = surface {
        data.copy_from_slice(styled.as_raw());
    }

    serde_wasm_bindgen::to_value(&report).map_err(|e| JsError::new(&e.to_string()))
}

/// Рамка вокруг найденного кода на кадре сканера
#[wasm_bindgen(js_name = drawDetectionBox)]
pub fn draw_detection_box_js(
    data: &mut [u8],
    width: u32,
    height: u32,
    location: JsValue,
) -> Result<(), JsError> {
    let quad: Quad =
        serde_wasm_bindgen::from_value(location).map_err(|e| JsError::new(&e.to_string()))?;
    let mut frame = RgbaImage::from_raw(width, height, data.to_vec())
        .ok_or_else(|| JsError::new("Frame buffer does not match its dimensions"))?;

    draw_detection_box(&mut frame, &quad);
    data.copy_from_slice(frame.as_raw());
    Ok(())
}

/// Уведомление для ошибки getUserMedia
///
/// @param name - DOMException.name
/// @param message - DOMException.message
#[wasm_bindgen(js_name = cameraErrorNotice)]
pub fn camera_error_notice(name: &str, message: &str) -> Result<JsValue, JsError> {
    let err = CameraError::from_dom_name(name, message);
    log::error!("Camera error: {}", err);
    serde_wasm_bindgen::to_value(&Notice::from(&err)).map_err(|e| JsError::new(&e.to_string()))
}

/// JavaScript-доступный генератор QR
#[wasm_bindgen]
pub struct WasmGenerator {
    generator: Generator,
    config: AppConfig,
}

#[wasm_bindgen]
impl WasmGenerator {
    /// @param config - объект конфигурации или undefined
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmGenerator, JsError> {
        let config = parse_config(config)?;
        Ok(Self {
            generator: config.generator(),
            config,
        })
    }

    /// Загрузка логотипа (PNG/JPEG)
    #[wasm_bindgen(js_name = setLogo)]
    pub fn set_logo(&mut self, logo_bytes: &[u8]) -> Result<(), JsError> {
        let logo = LogoOverlay::from_bytes(logo_bytes, self.config.overlay.clone())
            .map_err(|e| to_js_error(&QrError::from(e)))?;
        self.generator.set_logo(Some(logo));
        Ok(())
    }

    /// Генерация из полей ввода
    ///
    /// @returns ImageData для ctx.putImageData(), либо undefined, если текст
    /// не изменился с прошлой генерации
    pub fn generate(&mut self, fields: Vec<String>) -> Result<Option<ImageData>, JsError> {
        match self.generator.generate(fields.as_slice()) {
            Ok(generated) => to_image_data(&generated.image).map(Some),
            Err(GenerateError::Unchanged) => {
                log::info!("QR code already generated for this text");
                Ok(None)
            }
            Err(e) => Err(to_js_error(&QrError::from(e))),
        }
    }

    /// Сброс после очистки полей
    pub fn reset(&mut self) {
        self.generator.reset();
    }

    #[wasm_bindgen(js_name = lastPayload)]
    pub fn last_payload(&self) -> Option<String> {
        self.generator.last_payload().map(str::to_string)
    }
}

/// Планировщик на requestAnimationFrame/cancelAnimationFrame из JS
struct JsScheduler {
    request: Function,
    cancel: Function,
}

impl FrameScheduler for JsScheduler {
    fn schedule(&mut self) -> FrameToken {
        match self.request.call0(&JsValue::NULL) {
            Ok(token) => FrameToken(token.as_f64().unwrap_or(0.0) as u32),
            Err(e) => {
                log::error!("requestAnimationFrame failed: {:?}", e);
                FrameToken(0)
            }
        }
    }

    fn cancel(&mut self, token: FrameToken) {
        if let Err(e) = self.cancel.call1(&JsValue::NULL, &JsValue::from(token.0)) {
            log::error!("cancelAnimationFrame failed: {:?}", e);
        }
    }
}

/// Поток камеры: JS-колбэк, останавливающий все дорожки
struct JsStream {
    stop: Function,
}

impl CameraStream for JsStream {
    fn stop(&mut self) {
        if let Err(e) = self.stop.call0(&JsValue::NULL) {
            log::error!("Failed to stop camera stream: {:?}", e);
        }
    }
}

/// Кадр, уже снятый JS с video в canvas
struct JsFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    ready: bool,
}

impl<'a> JsFrame<'a> {
    /// Кадр с проверкой длины буфера
    fn checked(data: &'a [u8], width: u32, height: u32, ready: bool) -> Result<Self, JsError> {
        if rgba_len(width, height) != Some(data.len()) {
            return Err(JsError::new("Frame buffer does not match its dimensions"));
        }
        Ok(Self {
            data,
            width,
            height,
            ready,
        })
    }
}

impl FrameSource for JsFrame<'_> {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_into(&mut self, buffer: &mut RgbaImage) {
        buffer.copy_from_slice(self.data);
    }
}

/// Результат тика для JS
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum TickReport {
    Inactive,
    NotReady,
    Miss,
    Found {
        payload: String,
        lines: Vec<String>,
        location: Quad,
        notice: Notice,
    },
    Failed {
        notice: Notice,
    },
}

impl From<TickOutcome> for TickReport {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Inactive => TickReport::Inactive,
            TickOutcome::NotReady => TickReport::NotReady,
            TickOutcome::Miss => TickReport::Miss,
            TickOutcome::Found(detection) => TickReport::Found {
                lines: qrdots_core::payload::split_lines(&detection.payload)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                payload: detection.payload,
                location: detection.location,
                notice: Notice::success("QR Code scanned successfully!"),
            },
            TickOutcome::Failed(notice) => TickReport::Failed { notice },
        }
    }
}

/// JavaScript-доступная сессия сканирования
#[wasm_bindgen]
pub struct WasmScanner {
    session: ScanSession<JsStream, JsScheduler, QRDecoder>,
}

#[wasm_bindgen]
impl WasmScanner {
    /// @param request_frame - () => token, обычно обёртка над requestAnimationFrame,
    ///   колбэк которой передаёт этот же token в tick
    /// @param cancel_frame - (token) => void
    ///
    /// request_frame не должен синхронно вызывать tick: он вызывается изнутри tick.
    /// @param config - объект конфигурации или undefined
    #[wasm_bindgen(constructor)]
    pub fn new(
        request_frame: Function,
        cancel_frame: Function,
        config: JsValue,
    ) -> Result<WasmScanner, JsError> {
        let config = parse_config(config)?;
        let scheduler = JsScheduler {
            request: request_frame,
            cancel: cancel_frame,
        };
        Ok(Self {
            session: ScanSession::new(scheduler, QRDecoder::new(), config.scan),
        })
    }

    /// Режим камеры для getUserMedia ("environment" / "user")
    #[wasm_bindgen(js_name = facingMode)]
    pub fn facing_mode(&self) -> String {
        self.session.config().facing.as_str().to_string()
    }

    /// Запуск на полученном потоке
    ///
    /// @param stop_stream - () => stream.getTracks().forEach(t => t.stop())
    pub fn start(&mut self, stop_stream: Function) {
        self.session.start(JsStream { stop: stop_stream });
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Тик цикла: токен сработавшего колбэка, кадр из canvas.getImageData()
    /// и готовность video. Тик с чужим токеном возвращает status "inactive".
    pub fn tick(
        &mut self,
        token: u32,
        data: &[u8],
        width: u32,
        height: u32,
        ready: bool,
    ) -> Result<JsValue, JsError> {
        let mut frame = JsFrame::checked(data, width, height, ready)?;
        let report = TickReport::from(self.session.tick(FrameToken(token), &mut frame));
        serde_wasm_bindgen::to_value(&report).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Ручной снимок
    pub fn capture(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        ready: bool,
    ) -> Result<JsValue, JsError> {
        let mut frame = JsFrame::checked(data, width, height, ready)?;
        let report = TickReport::from(self.session.capture(&mut frame));
        serde_wasm_bindgen::to_value(&report).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Токен колбэка, который ждёт сессия
    #[wasm_bindgen(js_name = pendingToken)]
    pub fn pending_token(&self) -> Option<u32> {
        self.session.pending().map(|token| token.0)
    }

    pub fn state(&self) -> String {
        match self.session.state() {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Found => "found",
            ScanState::Stopped => "stopped",
        }
        .to_string()
    }
}

/// Информация о версии
#[wasm_bindgen(js_name = version)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
