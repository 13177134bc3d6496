//! Logging set-up as the service and its demos use it.

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_url, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_playback_filter_is_kept_verbatim() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_filter("core_playback=trace,core_service=debug,sqlx=warn");

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_playback=trace,core_service=debug,sqlx=warn")
    );
}

#[test]
fn test_signed_stream_urls_are_redacted() {
    let signed = "https://cdn.example.com/audio/track-42.opus?Expires=1700000000&Signature=abc";
    let redacted = redact_url(signed);
    assert_eq!(redacted, "https://cdn.example.com/audio/track-42.opus?[REDACTED]");
    assert!(!redacted.contains("Signature"));
}

// Global subscriber state: keep every init_logging call in one test.
#[test]
fn test_init_logging_rejects_bad_filter_then_initializes_once() {
    let invalid = LoggingConfig::default().with_filter("core_playback=loud");
    assert!(matches!(init_logging(invalid), Err(Error::Config(_))));

    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn);
    init_logging(config.clone()).unwrap();
    tracing::warn!(track_id = "t-1", "Emitted through the installed subscriber");

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}
