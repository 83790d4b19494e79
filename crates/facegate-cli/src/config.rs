use std::time::Duration;

/// Client configuration, loaded from `FACEGATE_*` environment variables
/// with defaults. CLI flags override the primary knobs.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Recognition endpoint URL. Required for the login loop.
    pub recognize_url: Option<String>,
    /// Landing page URL announced after a successful recognition.
    pub landing_url: Option<String>,
    /// Frames to discard after camera open (AGC/AE stabilization).
    pub warmup_frames: usize,
    /// Detection loop cadence.
    pub tick_interval: Duration,
    /// Continuous presence required before capture.
    pub dwell_threshold: Duration,
    /// Delay before detection resumes after a failed attempt.
    pub retry_delay: Duration,
    /// Delay between success display and navigation.
    pub nav_delay: Duration,
    /// Radius of the centered analysis disc, in pixels.
    pub region_radius: u32,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            camera_device: std::env::var("FACEGATE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            recognize_url: std::env::var("FACEGATE_RECOGNIZE_URL").ok(),
            landing_url: std::env::var("FACEGATE_LANDING_URL").ok(),
            warmup_frames: env_usize("FACEGATE_WARMUP_FRAMES", 4),
            tick_interval: Duration::from_millis(env_u64("FACEGATE_TICK_MS", 100)),
            dwell_threshold: Duration::from_millis(env_u64("FACEGATE_DWELL_MS", 1500)),
            retry_delay: Duration::from_millis(env_u64("FACEGATE_RETRY_DELAY_MS", 3000)),
            nav_delay: Duration::from_millis(env_u64("FACEGATE_NAV_DELAY_MS", 2000)),
            region_radius: env_u32(
                "FACEGATE_REGION_RADIUS",
                facegate_core::analyzer::DEFAULT_REGION_RADIUS,
            ),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
