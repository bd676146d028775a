//! TypeScript Generation Tests
//!
//! Validates that range types can be exported to TypeScript when the tauri
//! feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    // Inbound and configuration types
    assert_type::<pitwall_range::ChannelDataSet>();
    assert_type::<pitwall_range::Lap>();
    assert_type::<pitwall_range::TrackFlag>();
    assert_type::<pitwall_range::EventFlag>();
    assert_type::<pitwall_range::RangeUpdate>();
    assert_type::<pitwall_range::CarRangeSettings>();

    // Outbound types
    assert_type::<pitwall_range::Stint>();
    assert_type::<pitwall_range::StintCommit>();
    assert_type::<pitwall_range::CarStrategy>();
    assert_type::<pitwall_range::RangeEstimate>();
    assert_type::<pitwall_range::EventSnapshot>();
    assert_type::<pitwall_range::TriggerPreference>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = pitwall_range::TriggerPreference::PreferLapData;
}
