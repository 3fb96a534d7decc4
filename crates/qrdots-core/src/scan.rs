//! Модуль сканирования QR-кодов с камеры
//!
//! `ScanSession` - явный объект сессии вместо глобальных флагов: владеет
//! потоком камеры, токеном следующего кадра и буфером снимка.
//!
//! Модель выполнения кооперативная: хост вызывает [`ScanSession::tick`] из
//! колбэка обновления экрана с токеном этого колбэка, сессия сама
//! перерегистрирует следующий тик. Тик с чужим токеном ничего не делает,
//! так что в очереди всегда не больше одного колбэка.
//! Отмена проверяется в начале тика, начатое декодирование всегда
//! доходит до конца.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decoding::{Detection, FrameDecoder, InversionPolicy};
use crate::notice::Notice;

/// Ошибки доступа к камере
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera access denied")]
    Denied,

    #[error("No camera found")]
    NotFound,

    #[error("Camera error: {0}")]
    Other(String),
}

impl CameraError {
    /// Классификация по имени DOMException из getUserMedia
    pub fn from_dom_name(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => CameraError::Denied,
            "NotFoundError" | "DevicesNotFoundError" => CameraError::NotFound,
            _ => CameraError::Other(message.to_string()),
        }
    }
}

/// Какую камеру запрашивать
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Основная (задняя) камера телефона
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

/// Поток камеры, принадлежащий активной сессии
pub trait CameraStream {
    /// Остановка всех дорожек потока
    fn stop(&mut self);
}

/// Доступ к камере
pub trait Camera {
    type Stream: CameraStream;

    fn acquire(&mut self, facing: FacingMode) -> Result<Self::Stream, CameraError>;
}

/// Источник кадров (video-элемент)
pub trait FrameSource {
    /// Есть ли кадр с достаточными данными
    fn is_ready(&self) -> bool;

    fn dimensions(&self) -> (u32, u32);

    /// Отрисовка текущего кадра в буфер размера `dimensions()`
    fn draw_into(&mut self, buffer: &mut RgbaImage);
}

/// Токен запланированного колбэка кадра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u32);

/// Планировщик колбэков кадра (requestAnimationFrame)
pub trait FrameScheduler {
    fn schedule(&mut self) -> FrameToken;
    fn cancel(&mut self, token: FrameToken);
}

/// Конфигурация сканирования
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub facing: FacingMode,
    pub inversion: InversionPolicy,
}

/// Состояние сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    Scanning,
    Found,
    Stopped,
}

/// Результат одного тика
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Сессия не сканирует, работы не было
    Inactive,
    /// Кадр ещё не готов, тик перепланирован
    NotReady,
    /// Кода в кадре нет, тик перепланирован
    Miss,
    /// Код найден, сессия остановлена, камера освобождена
    Found(Detection),
    /// Декодер упал; сессия продолжает работу
    Failed(Notice),
}

/// Сессия сканирования
pub struct ScanSession<S: CameraStream, P: FrameScheduler, D: FrameDecoder> {
    state: ScanState,
    stream: Option<S>,
    scheduler: P,
    decoder: D,
    pending: Option<FrameToken>,
    frame: RgbaImage,
    config: ScanConfig,
    ticks: u64,
}

impl<S, P, D> ScanSession<S, P, D>
where
    S: CameraStream,
    P: FrameScheduler,
    D: FrameDecoder,
{
    pub fn new(scheduler: P, decoder: D, config: ScanConfig) -> Self {
        Self {
            state: ScanState::Idle,
            stream: None,
            scheduler,
            decoder,
            pending: None,
            frame: RgbaImage::new(0, 0),
            config,
            ticks: 0,
        }
    }

    /// Запрос камеры и запуск сканирования
    pub fn open<C>(&mut self, camera: &mut C) -> Result<(), CameraError>
    where
        C: Camera<Stream = S>,
    {
        let stream = camera.acquire(self.config.facing).map_err(|e| {
            log::error!("Camera error: {}", e);
            e
        })?;
        self.start(stream);
        Ok(())
    }

    /// Запуск сканирования на уже полученном потоке.
    ///
    /// Активная сессия сначала останавливается.
    pub fn start(&mut self, stream: S) {
        if self.state == ScanState::Scanning {
            log::info!("Restarting active scan session");
            self.stop();
        }

        self.stream = Some(stream);
        self.state = ScanState::Scanning;
        self.ticks = 0;
        self.pending = Some(self.scheduler.schedule());
        log::info!("Scan session started");
    }

    /// Остановка: отмена тика и освобождение камеры. Повторный вызов безопасен.
    pub fn stop(&mut self) {
        if self.state == ScanState::Scanning {
            self.state = ScanState::Stopped;
            log::info!("Scan session stopped after {} ticks", self.ticks);
        }
        self.teardown();
    }

    /// Один тик цикла сканирования.
    ///
    /// `token` - токен сработавшего колбэка. Если он не совпадает с
    /// ожидаемым (лишний вызов, устаревший колбэк), тик пропускается.
    pub fn tick<F: FrameSource>(&mut self, token: FrameToken, source: &mut F) -> TickOutcome {
        if self.pending != Some(token) {
            log::debug!("Ignoring tick for unexpected frame token {:?}", token);
            return TickOutcome::Inactive;
        }
        self.pending = None;

        if self.state != ScanState::Scanning {
            return TickOutcome::Inactive;
        }
        self.ticks += 1;

        let outcome = self.snapshot_and_detect(source);
        if self.state == ScanState::Scanning {
            self.pending = Some(self.scheduler.schedule());
        }
        outcome
    }

    /// Ручной снимок: та же логика, что и в тике, без перепланирования
    pub fn capture<F: FrameSource>(&mut self, source: &mut F) -> TickOutcome {
        if self.state != ScanState::Scanning {
            return TickOutcome::Inactive;
        }
        log::info!("Manual capture requested");
        self.snapshot_and_detect(source)
    }

    fn snapshot_and_detect<F: FrameSource>(&mut self, source: &mut F) -> TickOutcome {
        if !source.is_ready() {
            return TickOutcome::NotReady;
        }

        let (width, height) = source.dimensions();
        if self.frame.dimensions() != (width, height) {
            self.frame = RgbaImage::new(width, height);
        }
        source.draw_into(&mut self.frame);

        match self
            .decoder
            .detect(self.frame.as_raw(), width, height, self.config.inversion)
        {
            Ok(Some(detection)) => {
                log::info!("QR code found after {} ticks", self.ticks);
                self.state = ScanState::Found;
                self.teardown();
                TickOutcome::Found(detection)
            }
            Ok(None) => {
                log::debug!("No code in frame {}x{}", width, height);
                TickOutcome::Miss
            }
            Err(e) => {
                log::warn!("Decoder failed: {}", e);
                TickOutcome::Failed(Notice::from(&e))
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

impl<S, P, D> Drop for ScanSession<S, P, D>
where
    S: CameraStream,
    P: FrameScheduler,
    D: FrameDecoder,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::DecodeError;
    use crate::geometry::Quad;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingStream(Rc<Cell<u32>>);

    impl CameraStream for CountingStream {
        fn stop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Default)]
    struct ManualScheduler {
        next: u32,
        cancelled: Vec<FrameToken>,
    }

    impl FrameScheduler for ManualScheduler {
        fn schedule(&mut self) -> FrameToken {
            self.next += 1;
            FrameToken(self.next)
        }

        fn cancel(&mut self, token: FrameToken) {
            self.cancelled.push(token);
        }
    }

    /// Кадр с кодом - первый пиксель с красным каналом 1
    struct MarkerDecoder;

    impl FrameDecoder for MarkerDecoder {
        fn detect(
            &self,
            pixels: &[u8],
            _width: u32,
            _height: u32,
            _policy: InversionPolicy,
        ) -> Result<Option<Detection>, DecodeError> {
            match pixels.first() {
                Some(1) => Ok(Some(Detection {
                    payload: "marker".to_string(),
                    location: Quad::default(),
                })),
                Some(2) => Err(DecodeError::DecodeFailed("boom".to_string())),
                _ => Ok(None),
            }
        }
    }

    struct SolidSource {
        ready: bool,
        value: u8,
    }

    impl FrameSource for SolidSource {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        fn draw_into(&mut self, buffer: &mut RgbaImage) {
            for p in buffer.pixels_mut() {
                p.0 = [self.value, 0, 0, 255];
            }
        }
    }

    fn session() -> ScanSession<CountingStream, ManualScheduler, MarkerDecoder> {
        ScanSession::new(ManualScheduler::default(), MarkerDecoder, ScanConfig::default())
    }

    /// Срабатывание ожидаемого колбэка кадра
    fn fire<F: FrameSource>(
        s: &mut ScanSession<CountingStream, ManualScheduler, MarkerDecoder>,
        src: &mut F,
    ) -> TickOutcome {
        let token = s.pending().unwrap_or(FrameToken(0));
        s.tick(token, src)
    }

    #[test]
    fn test_idle_tick_is_inactive() {
        let mut s = session();
        let mut src = SolidSource { ready: true, value: 1 };
        assert_eq!(s.tick(FrameToken(1), &mut src), TickOutcome::Inactive);
        assert_eq!(s.state(), ScanState::Idle);
    }

    #[test]
    fn test_not_ready_reschedules() {
        let stops = Rc::new(Cell::new(0));
        let mut s = session();
        s.start(CountingStream(stops.clone()));
        let mut src = SolidSource { ready: false, value: 1 };

        assert_eq!(fire(&mut s, &mut src), TickOutcome::NotReady);
        assert!(s.pending().is_some());
        assert!(s.is_scanning());
    }

    #[test]
    fn test_found_releases_camera_and_stops_scheduling() {
        let stops = Rc::new(Cell::new(0));
        let mut s = session();
        s.start(CountingStream(stops.clone()));
        let mut src = SolidSource { ready: true, value: 1 };

        match fire(&mut s, &mut src) {
            TickOutcome::Found(d) => assert_eq!(d.payload, "marker"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(s.state(), ScanState::Found);
        assert!(s.pending().is_none());
        assert_eq!(stops.get(), 1);
        assert_eq!(fire(&mut s, &mut src), TickOutcome::Inactive);
    }

    #[test]
    fn test_decoder_failure_keeps_session() {
        let stops = Rc::new(Cell::new(0));
        let mut s = session();
        s.start(CountingStream(stops.clone()));
        let mut src = SolidSource { ready: true, value: 2 };

        assert!(matches!(fire(&mut s, &mut src), TickOutcome::Failed(_)));
        assert!(s.is_scanning());
        assert!(s.pending().is_some());
        assert_eq!(stops.get(), 0);
    }

    #[test]
    fn test_unexpected_token_does_not_reschedule() {
        let mut s = session();
        s.start(CountingStream(Rc::new(Cell::new(0))));
        let mut src = SolidSource { ready: true, value: 0 };
        let expected = s.pending();

        assert_eq!(s.tick(FrameToken(99), &mut src), TickOutcome::Inactive);
        assert_eq!(s.pending(), expected);
        assert_eq!(s.scheduler.next, 1);

        assert_eq!(fire(&mut s, &mut src), TickOutcome::Miss);
        assert_eq!(s.scheduler.next, 2);
        assert!(s.scheduler.cancelled.is_empty());
    }

    #[test]
    fn test_restart_stops_previous_stream() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let mut s = session();
        s.start(CountingStream(first.clone()));
        s.start(CountingStream(second.clone()));

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
        assert!(s.is_scanning());
    }

    #[test]
    fn test_drop_releases_camera() {
        let stops = Rc::new(Cell::new(0));
        {
            let mut s = session();
            s.start(CountingStream(stops.clone()));
        }
        assert_eq!(stops.get(), 1);
    }

    struct FakeCamera {
        result: Result<(), CameraError>,
        requested: Option<FacingMode>,
        stops: Rc<Cell<u32>>,
    }

    impl Camera for FakeCamera {
        type Stream = CountingStream;

        fn acquire(&mut self, facing: FacingMode) -> Result<CountingStream, CameraError> {
            self.requested = Some(facing);
            self.result.clone().map(|_| CountingStream(self.stops.clone()))
        }
    }

    #[test]
    fn test_open_acquires_back_camera() {
        let mut camera = FakeCamera {
            result: Ok(()),
            requested: None,
            stops: Rc::new(Cell::new(0)),
        };
        let mut s = session();
        s.open(&mut camera).unwrap();

        assert_eq!(camera.requested, Some(FacingMode::Environment));
        assert!(s.is_scanning());
        s.stop();
        assert_eq!(camera.stops.get(), 1);
    }

    #[test]
    fn test_open_denied_stays_idle() {
        let mut camera = FakeCamera {
            result: Err(CameraError::Denied),
            requested: None,
            stops: Rc::new(Cell::new(0)),
        };
        let mut s = session();

        assert_eq!(s.open(&mut camera), Err(CameraError::Denied));
        assert_eq!(s.state(), ScanState::Idle);
        assert!(s.pending().is_none());
    }

    #[test]
    fn test_camera_error_classification() {
        assert_eq!(CameraError::from_dom_name("NotAllowedError", ""), CameraError::Denied);
        assert_eq!(CameraError::from_dom_name("NotFoundError", ""), CameraError::NotFound);
        assert_eq!(
            CameraError::from_dom_name("NotReadableError", "busy"),
            CameraError::Other("busy".to_string())
        );
    }
}
