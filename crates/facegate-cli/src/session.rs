//! Auto-capture login session.
//!
//! Owns the camera for the life of the login flow and drives the whole
//! loop on a single task: a fixed-cadence tick samples and analyzes a
//! frame, feeds the dwell tracker, and — when the trigger fires — runs
//! the capture-and-recognize flow inline. Because the recognition await
//! happens inside the tick arm and the tracker is `Suspended` for its
//! duration, a second capture can never start while one is outstanding.
//!
//! Every exit path, including errors and cancellation, stops the camera
//! before the session returns.

use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use facegate_core::{
    DetectionTracker, MessageKind, Presenter, PresenceSignal, RecognitionOutcome, RegionAnalyzer,
};
use facegate_hw::{Camera, CameraError, Frame};

use crate::client::{CapturedImage, ClientError, RecognitionClient};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
}

/// Fixed delays governing the loop.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Detection loop cadence.
    pub tick_interval: Duration,
    /// Continuous presence required before capture.
    pub dwell_threshold: Duration,
    /// Delay before detection resumes after a failed attempt.
    pub retry_delay: Duration,
    /// Delay between success display and navigation.
    pub nav_delay: Duration,
}

/// How the session ended. Failed recognition attempts never end the
/// session; only success or cancellation do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Recognition succeeded; the caller navigates to the landing page.
    Authenticated,
    /// Cancelled by the user or process shutdown.
    Cancelled,
}

/// Frame acquisition seam so the loop can be driven with scripted
/// frames in tests.
pub trait FrameSource {
    fn sample(&mut self) -> Result<Option<Frame>, CameraError>;
    fn stop(&mut self);
    fn active(&self) -> bool;
}

impl FrameSource for Camera {
    fn sample(&mut self) -> Result<Option<Frame>, CameraError> {
        Camera::sample(self)
    }

    fn stop(&mut self) {
        Camera::stop(self);
    }

    fn active(&self) -> bool {
        Camera::active(self)
    }
}

pub struct Session<S, C, P> {
    camera: S,
    client: C,
    presenter: P,
    analyzer: RegionAnalyzer,
    tracker: DetectionTracker,
    timings: Timings,
    warmup_frames: usize,
}

impl<S, C, P> Session<S, C, P>
where
    S: FrameSource,
    C: RecognitionClient,
    P: Presenter,
{
    pub fn new(
        camera: S,
        client: C,
        presenter: P,
        region_radius: u32,
        timings: Timings,
        warmup_frames: usize,
    ) -> Self {
        Self {
            camera,
            client,
            presenter,
            analyzer: RegionAnalyzer::new(region_radius),
            tracker: DetectionTracker::new(timings.dwell_threshold),
            timings,
            warmup_frames,
        }
    }

    /// Run the login loop to completion.
    ///
    /// Returns when recognition succeeds (after the navigation delay)
    /// or when `cancel` fires. The camera is stopped on every exit
    /// path, error paths included.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<SessionEnd, SessionError> {
        let result = self.drive(&cancel).await;
        self.camera.stop();
        result
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<SessionEnd, SessionError> {
        // Discard warmup frames for camera AGC/AE stabilization.
        for _ in 0..self.warmup_frames {
            let _ = self.camera.sample();
        }

        self.presenter
            .show("Camera active. Center your face in the circle.", MessageKind::Info);
        self.tracker.arm();

        let mut ticker = tokio::time::interval(self.timings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("session cancelled");
                    return Ok(SessionEnd::Cancelled);
                }
                _ = ticker.tick() => {
                    if let Some(end) = self.tick(cancel).await? {
                        return Ok(end);
                    }
                }
            }
        }
    }

    /// One detection tick. Returns `Some` when the session is over.
    async fn tick(&mut self, cancel: &CancellationToken) -> Result<Option<SessionEnd>, SessionError> {
        let frame = self.camera.sample()?;
        let signal = match &frame {
            Some(f) => self.analyzer.analyze(&f.data, f.width, f.height),
            // Video not ready counts as nobody in front of the camera.
            None => PresenceSignal::absent(),
        };

        let now = tokio::time::Instant::now().into_std();
        if !self.tracker.observe(signal.present, now) {
            return Ok(None);
        }
        // A trigger implies presence, which implies a sampled frame.
        let Some(frame) = frame else {
            return Ok(None);
        };

        self.presenter
            .show("Face detected. Processing recognition...", MessageKind::Info);

        match self.attempt(&frame).await {
            Ok(outcome) if outcome.success => {
                let confidence = outcome
                    .confidence
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "n/a".into());
                self.presenter.show(
                    &format!("{} (confidence: {confidence}). Redirecting...", outcome.message),
                    MessageKind::Success,
                );

                // Release the hardware before navigation is scheduled.
                self.camera.stop();
                tokio::select! {
                    _ = cancel.cancelled() => Ok(Some(SessionEnd::Cancelled)),
                    _ = tokio::time::sleep(self.timings.nav_delay) => {
                        Ok(Some(SessionEnd::Authenticated))
                    }
                }
            }
            Ok(outcome) => {
                tracing::warn!(message = %outcome.message, "recognition rejected");
                self.presenter.show(&outcome.message, MessageKind::Error);
                self.schedule_retry(cancel).await
            }
            Err(err) => {
                // Transport and encoding failures take the same retry
                // path as an explicit rejection; only the log differs.
                tracing::warn!(error = %err, "recognition attempt failed");
                self.presenter
                    .show("Recognition failed. Trying again shortly.", MessageKind::Error);
                self.schedule_retry(cancel).await
            }
        }
    }

    /// Encode the triggering frame and call the recognition endpoint.
    /// The payload lives only for the duration of the call.
    async fn attempt(&self, frame: &Frame) -> Result<RecognitionOutcome, ClientError> {
        let image = CapturedImage::from_frame(frame)?;
        self.client.recognize(&image).await
    }

    /// Wait the fixed retry delay, then re-arm detection with dwell
    /// state cleared. Cancellable.
    async fn schedule_retry(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<SessionEnd>, SessionError> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(Some(SessionEnd::Cancelled)),
            _ = tokio::time::sleep(self.timings.retry_delay) => {}
        }
        self.tracker.resume();
        self.presenter
            .show("Center your face and try again.", MessageKind::Info);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::Confidence;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const W: u32 = 64;
    const H: u32 = 64;
    const RADIUS: u32 = 16;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn timings() -> Timings {
        Timings {
            tick_interval: ms(100),
            dwell_threshold: ms(1500),
            retry_delay: ms(3000),
            nav_delay: ms(2000),
        }
    }

    /// Camera yielding uniform-brightness frames (or no frame at all).
    struct FakeCamera {
        brightness: Option<u8>,
        stopped: Arc<AtomicBool>,
        stopped_at: Arc<Mutex<Option<Instant>>>,
        samples: Arc<Mutex<usize>>,
    }

    impl FakeCamera {
        fn new(brightness: Option<u8>) -> Self {
            Self {
                brightness,
                stopped: Arc::new(AtomicBool::new(false)),
                stopped_at: Arc::new(Mutex::new(None)),
                samples: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl FrameSource for FakeCamera {
        fn sample(&mut self) -> Result<Option<Frame>, CameraError> {
            *self.samples.lock().unwrap() += 1;
            if self.stopped.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(self.brightness.map(|b| Frame {
                data: vec![b; (W * H) as usize],
                width: W,
                height: H,
                timestamp: std::time::Instant::now(),
            }))
        }

        fn stop(&mut self) {
            if !self.stopped.swap(true, Ordering::SeqCst) {
                *self.stopped_at.lock().unwrap() = Some(Instant::now());
            }
        }

        fn active(&self) -> bool {
            !self.stopped.load(Ordering::SeqCst)
        }
    }

    struct ScriptedClient {
        outcomes: Mutex<VecDeque<Result<RecognitionOutcome, ClientError>>>,
        call_times: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedClient {
        fn new(outcomes: Vec<Result<RecognitionOutcome, ClientError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                call_times: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl RecognitionClient for ScriptedClient {
        async fn recognize(&self, _image: &CapturedImage) -> Result<RecognitionOutcome, ClientError> {
            self.call_times.lock().unwrap().push(Instant::now());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected recognition call")
        }
    }

    #[derive(Clone)]
    struct RecordingPresenter {
        log: Arc<Mutex<Vec<(String, MessageKind)>>>,
    }

    impl RecordingPresenter {
        fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn kinds(&self) -> Vec<MessageKind> {
            self.log.lock().unwrap().iter().map(|(_, k)| *k).collect()
        }

        fn contains(&self, message: &str) -> bool {
            self.log.lock().unwrap().iter().any(|(m, _)| m.contains(message))
        }
    }

    impl Presenter for RecordingPresenter {
        fn show(&self, message: &str, kind: MessageKind) {
            self.log.lock().unwrap().push((message.to_string(), kind));
        }
    }

    fn success_outcome() -> RecognitionOutcome {
        RecognitionOutcome {
            success: true,
            message: "Welcome back".into(),
            confidence: Some(Confidence::Number(0.92)),
        }
    }

    fn failure_outcome() -> RecognitionOutcome {
        RecognitionOutcome {
            success: false,
            message: "not recognized".into(),
            confidence: None,
        }
    }

    fn bad_response() -> ClientError {
        ClientError::BadResponse(serde_json::from_str::<RecognitionOutcome>("nope").unwrap_err())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_releases_camera_before_navigation() {
        let start = Instant::now();
        let camera = FakeCamera::new(Some(100));
        let stopped = camera.stopped.clone();
        let stopped_at = camera.stopped_at.clone();
        let samples = camera.samples.clone();
        let client = ScriptedClient::new(vec![Ok(success_outcome())]);
        let call_times = client.call_times.clone();
        let presenter = RecordingPresenter::new();

        let session = Session::new(camera, client, presenter.clone(), RADIUS, timings(), 0);
        let end = session.run(CancellationToken::new()).await.unwrap();

        assert_eq!(end, SessionEnd::Authenticated);
        assert!(stopped.load(Ordering::SeqCst));

        // Dwell of 1500 ms over 100 ms ticks: trigger on the 16th tick.
        let calls = call_times.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].duration_since(start), ms(1500));
        assert_eq!(*samples.lock().unwrap(), 16);

        // Camera released at trigger time, a full navigation delay
        // before the session returned.
        let released = stopped_at.lock().unwrap().unwrap();
        assert_eq!(Instant::now().duration_since(released), ms(2000));

        assert!(presenter.kinds().contains(&MessageKind::Success));
        assert!(presenter.contains("Welcome back"));
        assert!(presenter.contains("0.92"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_after_fixed_delay() {
        let camera = FakeCamera::new(Some(100));
        let client = ScriptedClient::new(vec![Ok(failure_outcome()), Ok(success_outcome())]);
        let call_times = client.call_times.clone();
        let presenter = RecordingPresenter::new();

        let session = Session::new(camera, client, presenter.clone(), RADIUS, timings(), 0);
        let end = session.run(CancellationToken::new()).await.unwrap();

        assert_eq!(end, SessionEnd::Authenticated);
        let calls = call_times.lock().unwrap();
        assert_eq!(calls.len(), 2);

        // 3000 ms retry delay plus a full fresh 1500 ms dwell: the
        // cleared dwell state means no immediate re-trigger on resume.
        assert_eq!(calls[1].duration_since(calls[0]), ms(4500));

        assert!(presenter.contains("not recognized"));
        assert!(presenter.kinds().contains(&MessageKind::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_response_takes_same_retry_path() {
        let camera = FakeCamera::new(Some(100));
        let client = ScriptedClient::new(vec![Err(bad_response()), Ok(success_outcome())]);
        let call_times = client.call_times.clone();
        let presenter = RecordingPresenter::new();

        let session = Session::new(camera, client, presenter.clone(), RADIUS, timings(), 0);
        let end = session.run(CancellationToken::new()).await.unwrap();

        assert_eq!(end, SessionEnd::Authenticated);
        let calls = call_times.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].duration_since(calls[0]), ms(4500));
        assert!(presenter.kinds().contains(&MessageKind::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dark_frames_never_trigger() {
        let camera = FakeCamera::new(Some(10));
        let client = ScriptedClient::new(vec![]);
        let call_times = client.call_times.clone();
        let presenter = RecordingPresenter::new();

        let cancel = CancellationToken::new();
        let session = Session::new(camera, client, presenter, RADIUS, timings(), 0);
        let canceller = cancel.clone();
        let (end, _) = tokio::join!(session.run(cancel), async move {
            tokio::time::sleep(ms(5000)).await;
            canceller.cancel();
        });

        assert_eq!(end.unwrap(), SessionEnd::Cancelled);
        assert!(call_times.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frame_treated_as_absent() {
        let camera = FakeCamera::new(None);
        let stopped = camera.stopped.clone();
        let client = ScriptedClient::new(vec![]);
        let call_times = client.call_times.clone();
        let presenter = RecordingPresenter::new();

        let cancel = CancellationToken::new();
        let session = Session::new(camera, client, presenter, RADIUS, timings(), 0);
        let canceller = cancel.clone();
        let (end, _) = tokio::join!(session.run(cancel), async move {
            tokio::time::sleep(ms(3000)).await;
            canceller.cancel();
        });

        assert_eq!(end.unwrap(), SessionEnd::Cancelled);
        assert!(call_times.lock().unwrap().is_empty());
        // Teardown stopped the camera even though nothing ever fired.
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_stops_camera() {
        let camera = FakeCamera::new(Some(100));
        let stopped = camera.stopped.clone();
        let client = ScriptedClient::new(vec![Ok(failure_outcome())]);
        let presenter = RecordingPresenter::new();

        let cancel = CancellationToken::new();
        let session = Session::new(camera, client, presenter, RADIUS, timings(), 0);
        let canceller = cancel.clone();
        let (end, _) = tokio::join!(session.run(cancel), async move {
            // Trigger at 1500 ms, failure immediate; cancel lands
            // inside the 3000 ms retry window.
            tokio::time::sleep(ms(2000)).await;
            canceller.cancel();
        });

        assert_eq!(end.unwrap(), SessionEnd::Cancelled);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_frames_discarded() {
        let camera = FakeCamera::new(Some(100));
        let samples = camera.samples.clone();
        let client = ScriptedClient::new(vec![Ok(success_outcome())]);
        let presenter = RecordingPresenter::new();

        let session = Session::new(camera, client, presenter, RADIUS, timings(), 4);
        let end = session.run(CancellationToken::new()).await.unwrap();

        assert_eq!(end, SessionEnd::Authenticated);
        // 4 warmup samples plus 16 detection ticks.
        assert_eq!(*samples.lock().unwrap(), 20);
    }
}
