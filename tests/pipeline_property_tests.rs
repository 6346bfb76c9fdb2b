use proptest::prelude::*;

use dimmerd::step_limiter::StepCategory;
use dimmerd::zone::{ErrorThresholds, StepSizes};
use dimmerd::{
    CurveKind, HysteresisState, Zone, ZoneSet, compute_brightness, next_brightness, select_zone,
};

/// Valid zone parameters: ordered lux and brightness ranges.
fn arb_zone() -> impl Strategy<Value = Zone> {
    (
        0.0f32..5000.0,
        1.0f32..5000.0,
        0u8..100,
        1u8..=100,
        prop_oneof![Just(CurveKind::Linear), Just(CurveKind::Logarithmic)],
    )
        .prop_map(|(lux_min, lux_span, b_low, b_span, curve)| {
            let b_high = b_low.saturating_add(b_span).min(100);
            Zone::new("z", [lux_min, lux_min + lux_span], [b_low, b_high], curve)
        })
}

/// Zone tuning with valid steps and thresholds.
fn arb_tuned_zone() -> impl Strategy<Value = Zone> {
    (
        arb_zone(),
        (1u8..=20, 1u8..=20, 1u8..=20),
        (1u8..=20, 1u8..=20, 1u8..=20),
        0u8..=50,
        0u8..=50,
    )
        .prop_map(|(zone, up, down, a, b)| {
            let thresholds = ErrorThresholds {
                large: a.max(b),
                small: a.min(b),
            };
            zone.with_steps(
                StepSizes::new(up.0, up.1, up.2),
                StepSizes::new(down.0, down.1, down.2),
            )
            .with_thresholds(thresholds)
        })
}

proptest! {
    #[test]
    fn brightness_stays_within_zone_bounds(zone in arb_zone(), lux in -100.0f32..20000.0) {
        let brightness = compute_brightness(lux, &zone);
        prop_assert!(brightness >= zone.brightness_min);
        prop_assert!(brightness <= zone.brightness_max);
    }

    #[test]
    fn brightness_is_monotonic_in_lux(zone in arb_zone(), a in 0.0f32..20000.0, b in 0.0f32..20000.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(compute_brightness(low, &zone) <= compute_brightness(high, &zone));
    }

    #[test]
    fn curve_endpoints_hit_zone_bounds(zone in arb_zone()) {
        prop_assert_eq!(compute_brightness(zone.lux_min, &zone), zone.brightness_min);
        prop_assert_eq!(compute_brightness(zone.lux_max, &zone), zone.brightness_max);
    }

    #[test]
    fn limiter_is_idempotent_at_target(zone in arb_tuned_zone(), value in 0u8..=100) {
        let (next, diag) = next_brightness(value, value, Some(&zone));
        prop_assert_eq!(next, value);
        prop_assert_eq!(diag.category, StepCategory::None);
        prop_assert_eq!(diag.step_size, 0);
    }

    #[test]
    fn limiter_never_overshoots(zone in arb_tuned_zone(), target in 0u8..=100, current in 0u8..=100) {
        let (next, diag) = next_brightness(target, current, Some(&zone));
        let (low, high) = if target <= current { (target, current) } else { (current, target) };
        prop_assert!(next >= low && next <= high);
        prop_assert_eq!(diag.next, next);
        prop_assert_eq!(diag.error, i16::from(target) - i16::from(current));
        if diag.snapped {
            prop_assert_eq!(next, target);
        }
    }

    #[test]
    fn limiter_converges(
        zone in arb_tuned_zone(),
        use_zone in any::<bool>(),
        target in 0u8..=100,
        start in 0u8..=100,
    ) {
        let zone = if use_zone { Some(&zone) } else { None };

        let mut current = start;
        let mut ticks = 0;
        while current != target {
            let (next, _) = next_brightness(target, current, zone);
            prop_assert_ne!(next, current, "limiter stalled at {}", current);
            current = next;
            ticks += 1;
            prop_assert!(ticks <= 100);
        }
    }

    #[test]
    fn selection_without_hysteresis_is_first_match_else_last(lux in 0.0f32..3000.0) {
        let zones = ZoneSet::new(vec![
            Zone::new("night", [0.0, 10.0], [5, 30], CurveKind::Logarithmic),
            Zone::new("dusk", [10.0, 200.0], [30, 60], CurveKind::Logarithmic),
            Zone::new("overcast", [200.0, 2000.0], [60, 85], CurveKind::Linear),
        ])
        .unwrap();
        let mut state = HysteresisState::new(0.0);

        let expected = zones
            .iter()
            .position(|zone| zone.contains(lux))
            .unwrap_or(zones.last_index());
        let selected = select_zone(&zones, lux, &mut state);
        prop_assert_eq!(&selected.name, &zones.get(expected).unwrap().name);
        prop_assert_eq!(state.current, Some(expected));
    }

    #[test]
    fn hysteresis_keeps_zone_inside_band(percent in 1.0f32..50.0, offset in 0.0f32..1.0) {
        let zones = ZoneSet::new(vec![
            Zone::new("low", [0.0, 100.0], [5, 50], CurveKind::Linear),
            Zone::new("high", [100.0, 1000.0], [50, 100], CurveKind::Linear),
        ])
        .unwrap();
        let mut state = HysteresisState::new(percent);
        prop_assert_eq!(select_zone(&zones, 50.0, &mut state).name.as_str(), "low");

        // Anywhere below lux_max + margin the current zone is kept
        let lux = 100.0 + offset * (100.0 * percent / 100.0) * 0.99;
        prop_assert_eq!(select_zone(&zones, lux, &mut state).name.as_str(), "low");
    }
}
