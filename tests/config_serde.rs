#![cfg(feature = "serde")]

use sharelimit::{LimiterConfig, Priority, PriorityLimiter};

#[test]
fn limiter_builds_from_json_config() {
    let json = r#"{
        "ceiling": 100,
        "shares": [
            { "priority": "high", "fraction": 0.7 },
            { "priority": "low", "fraction": 0.3 }
        ]
    }"#;
    let config: LimiterConfig = serde_json::from_str(json).expect("valid json");
    assert!(!config.unlimited_zero_rate);

    let limiter = PriorityLimiter::from_config(config).expect("valid shares");
    assert_eq!(limiter.capacity(Priority::High), Some(70));
    assert_eq!(limiter.capacity(Priority::Low), Some(30));
    assert_eq!(limiter.unclassified_share(), None);
}

#[test]
fn out_of_range_share_from_config_is_rejected_on_build() {
    let json = r#"{ "ceiling": 10, "shares": [{ "priority": "critical", "fraction": 1.5 }] }"#;
    let config: LimiterConfig = serde_json::from_str(json).expect("valid json");
    let err = PriorityLimiter::from_config(config).unwrap_err();
    assert!(err.is_invalid_share());
}

#[test]
fn missing_shares_fall_back_to_default_split() {
    let config: LimiterConfig = serde_json::from_str(r#"{ "ceiling": 10 }"#).unwrap();
    let limiter = PriorityLimiter::from_config(config).unwrap();
    assert_eq!(limiter.share(Priority::High), Some(0.5));
    assert_eq!(limiter.share(Priority::Low), Some(0.5));
}
