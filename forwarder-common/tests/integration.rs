//! Integration tests for forwarder-common library.

use forwarder_common::{
    AlarmSeverity, KafkaConfig, LogData, LoggingConfig, encode_f142, parse_config,
    seconds_to_nanos,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ForwarderSection {
    kafka: KafkaConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_cache_update_to_wire_record() {
    // A NICOS cache update carries seconds; the wire wants nanoseconds.
    let timestamp_ns = seconds_to_nanos(1_700_000_000.5);
    let record = LogData::new("sample_temp", 293.15, timestamp_ns, AlarmSeverity::NoChange);

    let bytes = encode_f142(&record).expect("encoding failed");

    assert!(flatbuffers::buffer_has_identifier(&bytes, "f142", false));
    // The name is stored verbatim inside the buffer.
    assert!(
        bytes
            .windows(record.source_name.len())
            .any(|w| w == record.source_name.as_bytes())
    );
}

#[test]
fn test_records_differ_only_by_severity() {
    let ok = encode_f142(&LogData::new("t1", 10.5, 1, AlarmSeverity::NoAlarm)).unwrap();
    let minor = encode_f142(&LogData::new("t1", 10.5, 1, AlarmSeverity::Minor)).unwrap();

    assert_eq!(ok.len(), minor.len());
    assert_ne!(ok, minor);
}

#[test]
fn test_kafka_section_round_trips_through_json5() {
    let config: ForwarderSection = parse_config(
        r#"{ kafka: { brokers: ["localhost:9092"], topic: "devices", retry_delay_secs: 1 } }"#,
    )
    .unwrap();

    assert_eq!(config.kafka.brokers, vec!["localhost:9092"]);
    assert_eq!(config.kafka.topic, "devices");
    assert_eq!(config.kafka.retry_delay_secs, 1);
    assert_eq!(config.logging.level, "info");
}
