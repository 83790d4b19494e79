//! Brightness-based presence analyzer.
//!
//! Deliberately not a face detector: the signal is the mean brightness
//! of a fixed disc at the frame center. An empty background reads either
//! very dark or near-uniformly bright; any foreground object pulls the
//! mean into the mid-range. The literal thresholds are part of the
//! product behavior and must not be "fixed" with real face geometry.

// --- Named constants (no magic numbers) ---
/// Mean brightness strictly above this counts toward presence.
const PRESENCE_MIN_BRIGHTNESS: f32 = 30.0;
/// Mean brightness strictly below this counts toward presence.
const PRESENCE_MAX_BRIGHTNESS: f32 = 220.0;
/// Disc radius in pixels around the frame center.
pub const DEFAULT_REGION_RADIUS: u32 = 120;

/// Classification of one sampled frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceSignal {
    pub present: bool,
    /// Mean brightness over the region, 0.0–255.0.
    pub mean_brightness: f32,
    /// Number of pixels that fell inside the region.
    pub sampled_pixels: usize,
}

impl PresenceSignal {
    /// Signal for an absent or unusable frame.
    pub fn absent() -> Self {
        Self {
            present: false,
            mean_brightness: 0.0,
            sampled_pixels: 0,
        }
    }
}

/// Computes the presence signal over a centered circular region.
///
/// Deterministic given identical pixel input; holds no state across
/// frames.
pub struct RegionAnalyzer {
    radius: u32,
}

impl RegionAnalyzer {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    /// Mean brightness over the centered disc, classified against the
    /// presence thresholds. Boundary values are excluded: a mean of
    /// exactly 30.0 or 220.0 is not presence.
    ///
    /// A region with no pixels (frame smaller than its own header
    /// claims, zero radius) classifies as absent.
    pub fn analyze(&self, gray: &[u8], width: u32, height: u32) -> PresenceSignal {
        let w = width as i64;
        let h = height as i64;
        if w == 0 || h == 0 || gray.len() < (w * h) as usize {
            return PresenceSignal::absent();
        }

        let cx = w / 2;
        let cy = h / 2;
        let r = self.radius as i64;
        let r_sq = r * r;

        let y_min = (cy - r).max(0);
        let y_max = (cy + r).min(h - 1);
        let x_min = (cx - r).max(0);
        let x_max = (cx + r).min(w - 1);

        let mut sum: u64 = 0;
        let mut count: usize = 0;

        for y in y_min..=y_max {
            let dy = y - cy;
            for x in x_min..=x_max {
                let dx = x - cx;
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                sum += gray[(y * w + x) as usize] as u64;
                count += 1;
            }
        }

        if count == 0 {
            return PresenceSignal::absent();
        }

        let mean = sum as f32 / count as f32;
        let present = mean > PRESENCE_MIN_BRIGHTNESS && mean < PRESENCE_MAX_BRIGHTNESS;

        tracing::trace!(mean, present, pixels = count, "region analyzed");

        PresenceSignal {
            present,
            mean_brightness: mean,
            sampled_pixels: count,
        }
    }
}

impl Default for RegionAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 640;
    const H: u32 = 480;

    fn uniform_frame(value: u8) -> Vec<u8> {
        vec![value; (W * H) as usize]
    }

    #[test]
    fn test_midrange_brightness_is_present() {
        let analyzer = RegionAnalyzer::default();
        let signal = analyzer.analyze(&uniform_frame(100), W, H);
        assert!(signal.present);
        assert!((signal.mean_brightness - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_dark_frame_is_absent() {
        let analyzer = RegionAnalyzer::default();
        let signal = analyzer.analyze(&uniform_frame(10), W, H);
        assert!(!signal.present);
    }

    #[test]
    fn test_bright_frame_is_absent() {
        let analyzer = RegionAnalyzer::default();
        assert!(!analyzer.analyze(&uniform_frame(240), W, H).present);
    }

    #[test]
    fn test_boundaries_are_excluded() {
        // Exactly 30 and exactly 220 are outside the open interval.
        let analyzer = RegionAnalyzer::default();
        assert!(!analyzer.analyze(&uniform_frame(30), W, H).present);
        assert!(!analyzer.analyze(&uniform_frame(220), W, H).present);
        // One step inside on either side counts.
        assert!(analyzer.analyze(&uniform_frame(31), W, H).present);
        assert!(analyzer.analyze(&uniform_frame(219), W, H).present);
    }

    #[test]
    fn test_pixels_outside_region_ignored() {
        // Saturated frame with a midrange disc exactly covering the
        // region: the bright surround must not lift the mean.
        let analyzer = RegionAnalyzer::new(50);
        let mut gray = uniform_frame(255);
        let (cx, cy) = (W as i64 / 2, H as i64 / 2);
        for y in 0..H as i64 {
            for x in 0..W as i64 {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= 50 * 50 {
                    gray[(y * W as i64 + x) as usize] = 100;
                }
            }
        }
        let signal = analyzer.analyze(&gray, W, H);
        assert!(signal.present);
        assert!((signal.mean_brightness - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_truncated_frame_is_absent() {
        let analyzer = RegionAnalyzer::default();
        let gray = vec![100u8; 16];
        let signal = analyzer.analyze(&gray, W, H);
        assert!(!signal.present);
        assert_eq!(signal.sampled_pixels, 0);
    }

    #[test]
    fn test_deterministic() {
        let analyzer = RegionAnalyzer::default();
        let gray = uniform_frame(128);
        let a = analyzer.analyze(&gray, W, H);
        let b = analyzer.analyze(&gray, W, H);
        assert_eq!(a, b);
    }
}
