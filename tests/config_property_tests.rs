use proptest::prelude::*;
use std::time::Duration;

use dimmerd::config::{Config, OutputType};
use dimmerd::constants::*;

const ZONES: &str = r#"
[[zones]]
name = "night"
lux_range = [0.0, 10.0]
brightness_range = [5, 30]

[[zones]]
name = "day"
lux_range = [10.0, 1000.0]
brightness_range = [30, 100]
"#;

#[derive(Debug, Clone)]
struct ControlCase {
    update_interval_ms: Option<u64>,
    auto_resume_timeout_sec: Option<u64>,
    hysteresis_percent: Option<f32>,
    state_save_interval_sec: Option<u64>,
    command_queue_capacity: Option<usize>,
}

impl ControlCase {
    fn to_toml(&self) -> String {
        let mut lines = vec!["[control]".to_string()];
        if let Some(v) = self.update_interval_ms {
            lines.push(format!("update_interval_ms = {}", v));
        }
        if let Some(v) = self.auto_resume_timeout_sec {
            lines.push(format!("auto_resume_timeout_sec = {}", v));
        }
        if let Some(v) = self.hysteresis_percent {
            lines.push(format!("hysteresis_percent = {:?}", v));
        }
        if let Some(v) = self.state_save_interval_sec {
            lines.push(format!("state_save_interval_sec = {}", v));
        }
        if let Some(v) = self.command_queue_capacity {
            lines.push(format!("command_queue_capacity = {}", v));
        }
        format!("{}\n{}", lines.join("\n"), ZONES)
    }
}

fn valid_control() -> impl Strategy<Value = ControlCase> {
    (
        proptest::option::of(MINIMUM_UPDATE_INTERVAL_MS..=MAXIMUM_UPDATE_INTERVAL_MS),
        proptest::option::of(MINIMUM_AUTO_RESUME_TIMEOUT_SECS..=MAXIMUM_AUTO_RESUME_TIMEOUT_SECS),
        proptest::option::of(MINIMUM_HYSTERESIS_PERCENT..=MAXIMUM_HYSTERESIS_PERCENT),
        proptest::option::of(MINIMUM_STATE_SAVE_INTERVAL_SECS..=MAXIMUM_STATE_SAVE_INTERVAL_SECS),
        proptest::option::of(MINIMUM_COMMAND_QUEUE_CAPACITY..=MAXIMUM_COMMAND_QUEUE_CAPACITY),
    )
        .prop_map(
            |(interval, timeout, hysteresis, save, capacity)| ControlCase {
                update_interval_ms: interval,
                auto_resume_timeout_sec: timeout,
                hysteresis_percent: hysteresis,
                state_save_interval_sec: save,
                command_queue_capacity: capacity,
            },
        )
}

proptest! {
    #[test]
    fn valid_control_settings_load(case in valid_control()) {
        let config = Config::parse(&case.to_toml()).unwrap();

        prop_assert_eq!(
            config.update_interval(),
            Duration::from_millis(case.update_interval_ms.unwrap_or(DEFAULT_UPDATE_INTERVAL_MS))
        );
        prop_assert_eq!(
            config.auto_resume_timeout(),
            Duration::from_secs(case.auto_resume_timeout_sec.unwrap_or(DEFAULT_AUTO_RESUME_TIMEOUT_SECS))
        );
        prop_assert_eq!(
            config.hysteresis_percent(),
            case.hysteresis_percent.unwrap_or(DEFAULT_HYSTERESIS_PERCENT)
        );
        prop_assert_eq!(
            config.state_save_interval(),
            Duration::from_secs(case.state_save_interval_sec.unwrap_or(DEFAULT_STATE_SAVE_INTERVAL_SECS))
        );
        prop_assert_eq!(
            config.command_queue_capacity(),
            case.command_queue_capacity.unwrap_or(DEFAULT_COMMAND_QUEUE_CAPACITY)
        );
    }

    #[test]
    fn out_of_range_update_interval_is_rejected(
        interval in prop_oneof![0..MINIMUM_UPDATE_INTERVAL_MS, (MAXIMUM_UPDATE_INTERVAL_MS + 1)..1_000_000]
    ) {
        let content = format!("[control]\nupdate_interval_ms = {}\n{}", interval, ZONES);
        prop_assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn out_of_range_hysteresis_is_rejected(percent in (MAXIMUM_HYSTERESIS_PERCENT + 0.01)..1000.0f32) {
        let content = format!("[control]\nhysteresis_percent = {:?}\n{}", percent, ZONES);
        prop_assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn zone_brightness_outside_percent_range_is_rejected(high in 101u32..255) {
        let content = format!(
            "[[zones]]\nname = \"glare\"\nlux_range = [0.0, 10.0]\nbrightness_range = [10, {}]\n",
            high
        );
        prop_assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn inverted_zone_lux_range_is_rejected(low in 1.0f32..1000.0, shrink in 0.0f32..1.0) {
        let high = low * shrink;
        let content = format!(
            "[[zones]]\nname = \"bad\"\nlux_range = [{:?}, {:?}]\nbrightness_range = [10, 20]\n",
            low, high
        );
        prop_assert!(Config::parse(&content).is_err());
    }

    #[test]
    fn output_value_range_must_be_ordered(low in 0u32..1000, high in 0u32..1000) {
        let content = format!(
            "[output]\ntype = \"file\"\nvalue_range = [{}, {}]\n{}",
            low, high, ZONES
        );
        let result = Config::parse(&content);
        prop_assert_eq!(result.is_ok(), low < high);
        if let Ok(config) = result {
            prop_assert_eq!(config.output.kind, Some(OutputType::File));
            prop_assert_eq!(config.output.value_range, Some([low, high]));
        }
    }
}
