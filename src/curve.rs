//! Perceptual curve mapping from lux to target brightness.
//!
//! The mapper is a pure function of the lux reading and the zone. Lux is
//! clamped into the zone's closed range, normalized to `t` in `[0, 1]`, and the
//! brightness is `brightness_min + t * (brightness_max - brightness_min)`.
//!
//! Rounding policy: the scaled offset is truncated toward zero before being
//! added to `brightness_min`, so the maximum is only reached at `lux_max`.

use crate::constants::MAXIMUM_BRIGHTNESS;
use crate::zone::{CurveKind, Zone};

/// Map `lux` to a brightness percentage using the zone's curve.
pub fn compute_brightness(lux: f32, zone: &Zone) -> u8 {
    let lux_min = f64::from(zone.lux_min);
    let lux_max = f64::from(zone.lux_max);
    let lux_range = lux_max - lux_min;

    if lux_range <= 0.0 {
        return zone.brightness_min.min(MAXIMUM_BRIGHTNESS);
    }

    // NaN falls through clamp unchanged; treat it as the bottom of the zone
    let lux = f64::from(lux);
    let lux_clamped = if lux.is_nan() {
        lux_min
    } else {
        lux.clamp(lux_min, lux_max)
    };

    let normalized = match zone.curve {
        CurveKind::Linear => (lux_clamped - lux_min) / lux_range,
        CurveKind::Logarithmic => (lux_clamped - lux_min).ln_1p() / lux_range.ln_1p(),
    };

    let bright_min = i32::from(zone.brightness_min);
    let bright_span = i32::from(zone.brightness_max) - bright_min;
    let brightness = bright_min + (normalized.clamp(0.0, 1.0) * f64::from(bright_span)) as i32;

    brightness.clamp(0, i32::from(MAXIMUM_BRIGHTNESS)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(curve: CurveKind) -> Zone {
        Zone::new("indoor", [0.0, 100.0], [20, 80], curve)
    }

    #[test]
    fn test_linear_endpoints_and_midpoint() {
        let z = zone(CurveKind::Linear);
        assert_eq!(compute_brightness(0.0, &z), 20);
        assert_eq!(compute_brightness(50.0, &z), 50);
        assert_eq!(compute_brightness(100.0, &z), 80);
    }

    #[test]
    fn test_linear_truncates_toward_zero() {
        let z = zone(CurveKind::Linear);
        // t = 0.33 -> 0.33 * 60 = 19.8 -> 19
        assert_eq!(compute_brightness(33.0, &z), 39);
    }

    #[test]
    fn test_lux_is_clamped_into_zone() {
        let z = Zone::new("dusk", [10.0, 20.0], [30, 60], CurveKind::Linear);
        assert_eq!(compute_brightness(-5.0, &z), 30);
        assert_eq!(compute_brightness(5.0, &z), 30);
        assert_eq!(compute_brightness(500.0, &z), 60);
        assert_eq!(compute_brightness(f32::NAN, &z), 30);
    }

    #[test]
    fn test_logarithmic_rises_faster_at_low_lux() {
        let linear = zone(CurveKind::Linear);
        let log = zone(CurveKind::Logarithmic);

        assert_eq!(compute_brightness(0.0, &log), 20);
        assert_eq!(compute_brightness(100.0, &log), 80);
        // ln(11) / ln(101) ~= 0.5196 -> 20 + 31 = 51
        assert_eq!(compute_brightness(10.0, &log), 51);
        assert!(compute_brightness(10.0, &log) > compute_brightness(10.0, &linear));
    }

    #[test]
    fn test_degenerate_range_returns_brightness_min() {
        let mut z = zone(CurveKind::Logarithmic);
        z.lux_max = z.lux_min;
        assert_eq!(compute_brightness(42.0, &z), 20);
    }
}
