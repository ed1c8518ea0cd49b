//! Acquisition session: owns the input connection and runs the sampling loop.
//!
//! State machine: `Idle -> Active` on a successful start, `Active -> Idle` on
//! stop, and any failure (during start or while ticking) lands in `Error`
//! with the classified cause kept for display. Ticks are requested from a
//! [`FrameScheduler`] one at a time, so tick *n+1* only exists once tick *n*
//! has appended its reading.

pub mod frame;

pub use frame::{Clock, FrameScheduler, FrameToken, MonotonicClock};

use crate::audio::{AnalysisFrame, AudioBackend, CaptureSettings, InputConnection};
use crate::error::{MeterError, Result};
use crate::meter::{compute_level, HistoryBuffer};

/// Points kept from each frame for waveform display.
const WAVEFORM_POINTS: usize = 256;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "recording"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Read-only view of the current readings, handed to the presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    /// Latest normalized reading (0-120, one decimal)
    pub decibels: f32,
    pub history: &'a HistoryBuffer,
    /// Byte spectrum of the latest frame, empty when not recording
    pub frequency: &'a [u8],
    /// Decimated time-domain samples of the latest frame
    pub waveform: &'a [f32],
    pub is_recording: bool,
    pub state: SessionState,
    pub error: Option<&'a MeterError>,
}

pub struct Session<B: AudioBackend, C: Clock = MonotonicClock> {
    backend: B,
    clock: C,
    settings: CaptureSettings,
    scheduler: FrameScheduler,
    pending_tick: Option<FrameToken>,
    connection: Option<B::Connection>,
    device_id: Option<String>,
    state: SessionState,
    error: Option<MeterError>,
    decibels: f32,
    history: HistoryBuffer,
    frequency: Vec<u8>,
    waveform: Vec<f32>,
    ticks: u64,
}

impl<B: AudioBackend> Session<B, MonotonicClock> {
    pub fn new(backend: B, settings: CaptureSettings, history_capacity: usize) -> Self {
        Self::with_clock(backend, MonotonicClock::new(), settings, history_capacity)
    }
}

impl<B: AudioBackend, C: Clock> Session<B, C> {
    /// Creates an idle session. No device is touched until [`Session::start`].
    pub fn with_clock(
        backend: B,
        clock: C,
        settings: CaptureSettings,
        history_capacity: usize,
    ) -> Self {
        Self {
            backend,
            clock,
            settings,
            scheduler: FrameScheduler::new(),
            pending_tick: None,
            connection: None,
            device_id: None,
            state: SessionState::Idle,
            error: None,
            decibels: 0.0,
            history: HistoryBuffer::new(history_capacity),
            frequency: Vec::new(),
            waveform: Vec::new(),
            ticks: 0,
        }
    }

    /// Opens `device_id` and schedules the first tick.
    ///
    /// Any previous connection is fully torn down first. The session is not
    /// active while the access handshake is pending, and the `&mut` borrow
    /// held across it rules out a second concurrent start.
    pub async fn start(&mut self, device_id: &str) -> Result<()> {
        self.stop();
        self.device_id = Some(device_id.to_string());
        tracing::info!("Starting acquisition on '{}'", device_id);

        if let Err(e) = self.backend.request_access(device_id).await {
            return Err(self.fail(e));
        }

        let connection = match self.backend.open(device_id, &self.settings) {
            Ok(connection) => connection,
            Err(e) => return Err(self.fail(e)),
        };

        self.connection = Some(connection);
        self.error = None;
        self.state = SessionState::Active;
        self.pending_tick = Some(self.scheduler.request());
        tracing::info!("Acquisition active on '{}'", device_id);
        Ok(())
    }

    /// Cancels the pending tick and releases the connection.
    ///
    /// History survives; the device id is forgotten. Calling it while idle does nothing.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle && self.connection.is_none() && self.pending_tick.is_none()
        {
            return;
        }

        self.release();
        self.state = SessionState::Idle;
        self.error = None;
        self.device_id = None;
        tracing::info!("Acquisition stopped");
    }

    /// Host hook, called once before every redraw. Runs the tick if one is due.
    pub fn on_redraw(&mut self) -> Result<Option<f32>> {
        match self.scheduler.take_due() {
            Some(token) if self.pending_tick == Some(token) => {
                self.pending_tick = None;
                self.tick()
            }
            _ => Ok(None),
        }
    }

    /// Processes one frame: level, history, snapshot, then the next request.
    ///
    /// Returns the reading, or `None` when not active. A read failure moves
    /// the session to `Error` and ends the loop. Only reachable through
    /// [`Session::on_redraw`], so each redraw runs at most one tick.
    fn tick(&mut self) -> Result<Option<f32>> {
        if self.state != SessionState::Active {
            return Ok(None);
        }
        let Some(connection) = self.connection.as_mut() else {
            return Ok(None);
        };

        let AnalysisFrame { samples, frequency } = match connection.read_frame() {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e)),
        };
        if samples.is_empty() {
            return Err(self.fail(MeterError::AcquisitionFailed(
                "analysis node returned an empty frame".to_string(),
            )));
        }

        let level = compute_level(&samples);
        self.waveform = decimate(&samples, WAVEFORM_POINTS);
        self.frequency = frequency;
        self.decibels = level;

        let now = self.clock.now_millis();
        let timestamp = self.history.last().map_or(now, |last| now.max(last.timestamp));
        let capacity = self.history.capacity();
        self.history = std::mem::replace(&mut self.history, HistoryBuffer::new(capacity))
            .append(timestamp, level);

        self.ticks += 1;
        if self.ticks % 60 == 0 {
            tracing::debug!(
                "Tick {}: {:.1} dB, {} history points",
                self.ticks,
                level,
                self.history.len()
            );
        }

        self.pending_tick = Some(self.scheduler.request());
        Ok(Some(level))
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            decibels: self.decibels,
            history: &self.history,
            frequency: &self.frequency,
            waveform: &self.waveform,
            is_recording: self.state == SessionState::Active,
            state: self.state,
            error: self.error.as_ref(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Device of the current start, or of the last failed one. `None` once
    /// stopped.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn last_error(&self) -> Option<&MeterError> {
        self.error.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Tears everything down and records `error` as the terminal cause.
    fn fail(&mut self, error: MeterError) -> MeterError {
        tracing::error!("Acquisition failed: {}", error);
        self.release();
        self.state = SessionState::Error;
        self.error = Some(error.clone());
        error
    }

    fn release(&mut self) {
        if let Some(token) = self.pending_tick.take() {
            self.scheduler.cancel(token);
        }
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.frequency.clear();
        self.waveform.clear();
    }
}

impl<B: AudioBackend, C: Clock> Drop for Session<B, C> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Picks `points` evenly spaced samples for display.
fn decimate(samples: &[f32], points: usize) -> Vec<f32> {
    if samples.len() <= points {
        return samples.to_vec();
    }
    let step = samples.len() as f32 / points as f32;
    (0..points)
        .map(|i| samples[((i as f32 * step) as usize).min(samples.len() - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeviceDirectory, InputDevice};
    use crate::meter::{HistoryPoint, Threshold};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const WINDOW: usize = 64;

    #[derive(Debug, Default)]
    struct Probe {
        opened: usize,
        closed: usize,
        live: usize,
        max_live: usize,
        reads: usize,
    }

    type Script = Rc<RefCell<VecDeque<Result<Vec<f32>>>>>;

    struct FakeBackend {
        probe: Rc<RefCell<Probe>>,
        script: Script,
        access: Result<()>,
        open_error: Option<MeterError>,
        missing: Option<&'static str>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                probe: Rc::default(),
                script: Rc::default(),
                access: Ok(()),
                open_error: None,
                missing: None,
            }
        }
    }

    impl DeviceDirectory for FakeBackend {
        fn list_input_devices(&self) -> Result<Vec<InputDevice>> {
            Ok(vec![InputDevice {
                id: "fake".to_string(),
                label: "Fake Mic".to_string(),
                is_default: true,
            }])
        }

        async fn request_access(&self, _device_id: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.access.clone()
        }
    }

    impl AudioBackend for FakeBackend {
        type Connection = FakeConnection;

        fn open(&self, device_id: &str, settings: &CaptureSettings) -> Result<FakeConnection> {
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            if self.missing == Some(device_id) {
                return Err(MeterError::DeviceNotFound(device_id.to_string()));
            }
            let mut probe = self.probe.borrow_mut();
            probe.opened += 1;
            probe.live += 1;
            probe.max_live = probe.max_live.max(probe.live);
            Ok(FakeConnection {
                probe: Rc::clone(&self.probe),
                script: Rc::clone(&self.script),
                window: settings.window_size,
                open: true,
            })
        }
    }

    struct FakeConnection {
        probe: Rc<RefCell<Probe>>,
        script: Script,
        window: usize,
        open: bool,
    }

    impl InputConnection for FakeConnection {
        fn read_frame(&mut self) -> Result<AnalysisFrame> {
            self.probe.borrow_mut().reads += 1;
            let next = self.script.borrow_mut().pop_front();
            let samples = next.unwrap_or_else(|| Ok(vec![0.0; self.window]))?;
            Ok(AnalysisFrame {
                samples,
                frequency: vec![7; self.window / 2],
            })
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                let mut probe = self.probe.borrow_mut();
                probe.closed += 1;
                probe.live -= 1;
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeClock(Rc<Cell<u64>>);

    impl Clock for FakeClock {
        fn now_millis(&self) -> u64 {
            self.0.get()
        }
    }

    fn settings() -> CaptureSettings {
        CaptureSettings {
            window_size: WINDOW,
            ..CaptureSettings::default()
        }
    }

    fn session(backend: FakeBackend, capacity: usize) -> (Session<FakeBackend, FakeClock>, FakeClock) {
        let clock = FakeClock::default();
        let session = Session::with_clock(backend, clock.clone(), settings(), capacity);
        (session, clock)
    }

    /// Constant frame whose normalized level is `level`.
    fn frame_at(level: f32) -> Vec<f32> {
        let amplitude = 10f32.powf((level - 90.0) / 20.0);
        vec![amplitude; WINDOW]
    }

    #[tokio::test]
    async fn start_makes_session_active_with_a_pending_tick() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.snapshot().is_recording);
        assert_eq!(session.device_id(), Some("fake"));
        assert_eq!(probe.borrow().opened, 1);
        assert!(session.on_redraw().unwrap().is_some());
    }

    #[tokio::test]
    async fn ticks_drive_threshold_alerts() {
        let backend = FakeBackend::new();
        for level in [60.0, 80.0, 74.9] {
            backend.script.borrow_mut().push_back(Ok(frame_at(level)));
        }
        let (mut session, _) = session(backend, 3600);
        let threshold = Threshold::new(75.0);

        session.start("fake").await.unwrap();

        let mut levels = Vec::new();
        let mut alerts = Vec::new();
        for _ in 0..3 {
            let level = session.on_redraw().unwrap().unwrap();
            levels.push(level);
            alerts.push(threshold.is_exceeded_by(session.snapshot().decibels));
        }

        assert_eq!(levels, vec![60.0, 80.0, 74.9]);
        assert_eq!(alerts, vec![false, true, false]);
    }

    #[tokio::test]
    async fn history_evicts_through_the_session() {
        let backend = FakeBackend::new();
        for level in [10.0, 20.0, 30.0, 40.0] {
            backend.script.borrow_mut().push_back(Ok(frame_at(level)));
        }
        let (mut session, clock) = session(backend, 3);

        session.start("fake").await.unwrap();
        for t in 1..=4 {
            clock.0.set(t);
            session.on_redraw().unwrap();
        }

        assert_eq!(
            session.history().to_vec(),
            vec![
                HistoryPoint::new(2, 20.0),
                HistoryPoint::new(3, 30.0),
                HistoryPoint::new(4, 40.0),
            ]
        );
    }

    #[tokio::test]
    async fn only_one_tick_per_redraw() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        session.on_redraw().unwrap();
        session.on_redraw().unwrap();

        assert_eq!(probe.borrow().reads, 2);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn timestamps_never_decrease() {
        let (mut session, clock) = session(FakeBackend::new(), 10);

        session.start("fake").await.unwrap();
        clock.0.set(500);
        session.on_redraw().unwrap();
        clock.0.set(200);
        session.on_redraw().unwrap();

        let stamps: Vec<u64> = session.history().iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![500, 500]);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_keeps_history() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        session.on_redraw().unwrap();

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(probe.borrow().closed, 1);

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(probe.borrow().closed, 1);
        assert_eq!(session.history().len(), 1);
        assert!(session.snapshot().frequency.is_empty());
    }

    #[tokio::test]
    async fn no_tick_runs_after_stop() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        session.stop();

        assert_eq!(session.on_redraw().unwrap(), None);
        assert_eq!(session.tick().unwrap(), None);
        assert_eq!(probe.borrow().reads, 0);
    }

    #[tokio::test]
    async fn restart_tears_down_before_opening() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        session.start("other").await.unwrap();

        let probe = probe.borrow();
        assert_eq!(probe.opened, 2);
        assert_eq!(probe.closed, 1);
        assert_eq!(probe.live, 1);
        assert_eq!(probe.max_live, 1);
        assert_eq!(session.device_id(), Some("other"));
    }

    #[tokio::test]
    async fn failed_restart_leaves_nothing_open() {
        let mut backend = FakeBackend::new();
        backend.missing = Some("gone");
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        let result = session.start("gone").await;

        assert_eq!(result, Err(MeterError::DeviceNotFound("gone".to_string())));
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.device_id(), Some("gone"));
        {
            let probe = probe.borrow();
            assert_eq!(probe.opened, 1);
            assert_eq!(probe.closed, 1);
            assert_eq!(probe.live, 0);
            assert_eq!(probe.max_live, 1);
        }
        assert_eq!(session.on_redraw().unwrap(), None);

        session.stop();
        assert_eq!(session.device_id(), None);
    }

    #[tokio::test]
    async fn stop_forgets_the_device() {
        let (mut session, _) = session(FakeBackend::new(), 3600);

        session.start("fake").await.unwrap();
        session.stop();

        assert_eq!(session.device_id(), None);
    }

    #[tokio::test]
    async fn denied_access_ends_in_error_without_connection() {
        let mut backend = FakeBackend::new();
        backend.access = Err(MeterError::AccessDenied);
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        let result = session.start("fake").await;

        assert_eq!(result, Err(MeterError::AccessDenied));
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.last_error(), Some(&MeterError::AccessDenied));
        assert_eq!(probe.borrow().opened, 0);
        assert_eq!(session.on_redraw().unwrap(), None);
    }

    #[tokio::test]
    async fn open_failure_is_classified() {
        let mut backend = FakeBackend::new();
        backend.open_error = Some(MeterError::DeviceNotFound("gone".to_string()));
        let (mut session, _) = session(backend, 3600);

        let result = session.start("gone").await;

        assert_eq!(result, Err(MeterError::DeviceNotFound("gone".to_string())));
        assert!(!session.is_active());
        assert_eq!(session.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn lost_device_stops_the_loop_in_error() {
        let backend = FakeBackend::new();
        backend.script.borrow_mut().push_back(Ok(frame_at(50.0)));
        backend
            .script
            .borrow_mut()
            .push_back(Err(MeterError::DeviceLost("unplugged".to_string())));
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        assert_eq!(session.on_redraw().unwrap(), Some(50.0));

        let result = session.on_redraw();
        assert_eq!(result, Err(MeterError::DeviceLost("unplugged".to_string())));
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(probe.borrow().live, 0);
        assert!(session.snapshot().error.is_some());

        // Terminal until restarted.
        assert_eq!(session.on_redraw().unwrap(), None);
        assert_eq!(probe.borrow().reads, 2);

        session.start("fake").await.unwrap();
        assert!(session.is_active());
        assert!(session.last_error().is_none());
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn stop_from_error_returns_to_idle() {
        let mut backend = FakeBackend::new();
        backend.access = Err(MeterError::AccessDenied);
        let (mut session, _) = session(backend, 3600);

        let _ = session.start("fake").await;
        session.stop();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn dropping_the_session_releases_the_device() {
        let backend = FakeBackend::new();
        let probe = Rc::clone(&backend.probe);
        let (mut session, _) = session(backend, 3600);

        session.start("fake").await.unwrap();
        drop(session);

        assert_eq!(probe.borrow().live, 0);
    }

    #[test]
    fn decimate_keeps_short_frames() {
        assert_eq!(decimate(&[0.1, 0.2], 4), vec![0.1, 0.2]);
        let long: Vec<f32> = (0..1024).map(|i| i as f32).collect();
        let picked = decimate(&long, 256);
        assert_eq!(picked.len(), 256);
        assert_eq!(picked[1], 4.0);
    }
}
