use nearby::filter::{AudioBytesConfig, EddystoneUidConfig, IBeaconIdConfig, NamespacedTypeConfig, AUDIO_BYTES_MAX_SIZE};
use nearby::strategy::{TTL_SECONDS_DEFAULT, TTL_SECONDS_INFINITE, TTL_SECONDS_MAX};
use nearby::{
    build_filter, build_strategy, DiscoveryMode, DiscoveryStrategy, DistanceType, FilterConfig,
    MessageFilter, NearbyError, StrategyConfig, StrategyUsage,
};
use proptest::prelude::*;

fn eddystone(namespace: &str, instance: Option<&str>) -> FilterConfig {
    FilterConfig {
        include_eddystone_uids: Some(EddystoneUidConfig {
            hex_namespace: namespace.to_string(),
            hex_instance: instance.map(str::to_string),
        }),
        ..Default::default()
    }
}

fn validation_field(err: NearbyError) -> String {
    match err {
        NearbyError::Validation { field, .. } => field,
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_include_all_my_types_short_circuits() {
    let config = FilterConfig {
        include_all_my_types_constant: Some(true),
        ..eddystone("not-hex", None)
    };

    assert_eq!(build_filter(Some(&config)).unwrap(), MessageFilter::IncludeAllMyTypes);
    assert_eq!(build_filter(None).unwrap(), MessageFilter::IncludeAllMyTypes);
}

#[test]
fn test_clauses_accumulate_into_one_filter() {
    let config = FilterConfig {
        include_all_my_types: Some(true),
        include_audio_bytes: Some(AudioBytesConfig { num_audio_bytes: 4 }),
        include_ibeacon_ids: Some(IBeaconIdConfig {
            proximity_uuid: "f7826da6-4fa2-4e98-8024-bc5b71e0893e".to_string(),
            major: Some(1),
            minor: None,
        }),
        include_namespaced_type: Some(NamespacedTypeConfig {
            namespace: "com.example".to_string(),
            message_type: "greeting".to_string(),
        }),
        ..eddystone("0102030405060708090a", Some("0b0c0d0e0f10"))
    };

    let filter = match build_filter(Some(&config)).unwrap() {
        MessageFilter::Custom(filter) => filter,
        other => panic!("expected a custom filter, got {:?}", other),
    };

    assert_eq!(filter.clause_count(), 5);
    assert_eq!(filter.audio_bytes, Some(4));
    let uid = filter.eddystone_uid.unwrap();
    assert_eq!(uid.namespace, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(uid.instance, Some([11, 12, 13, 14, 15, 16]));
    assert_eq!(filter.ibeacon_id.unwrap().major, Some(1));
}

#[test]
fn test_filter_validation_fields() {
    let cases = vec![
        (eddystone("not-hex", None), "includeEddystoneUids.hexNamespace"),
        (eddystone("0102", None), "includeEddystoneUids.hexNamespace"),
        (eddystone("0102030405060708090a", Some("zz")), "includeEddystoneUids.hexInstance"),
        (
            FilterConfig {
                include_ibeacon_ids: Some(IBeaconIdConfig {
                    proximity_uuid: "f7826da6-4fa2-4e98-8024-bc5b71e0893e".to_string(),
                    major: None,
                    minor: Some(70_000),
                }),
                ..Default::default()
            },
            "includeIBeaconIds.minor",
        ),
        (
            FilterConfig {
                include_audio_bytes: Some(AudioBytesConfig { num_audio_bytes: 0 }),
                ..Default::default()
            },
            "includeAudioBytes.numAudioBytes",
        ),
        (
            FilterConfig {
                include_namespaced_type: Some(NamespacedTypeConfig {
                    namespace: "ns".to_string(),
                    message_type: "*".to_string(),
                }),
                ..Default::default()
            },
            "includeNamespacedType.type",
        ),
    ];

    for (config, field) in cases {
        assert_eq!(validation_field(build_filter(Some(&config)).unwrap_err()), field);
    }
}

#[test]
fn test_filter_config_from_client_json() {
    let config: FilterConfig = serde_json::from_value(serde_json::json!({
        "includeEddystoneUids": { "hexNamespace": "0102030405060708090a" },
        "includeAudioBytes": { "numAudioBytes": 50 }
    }))
    .unwrap();

    match build_filter(Some(&config)).unwrap() {
        MessageFilter::Custom(filter) => {
            assert_eq!(filter.audio_bytes, Some(AUDIO_BYTES_MAX_SIZE));
            assert!(filter.eddystone_uid.unwrap().instance.is_none());
            assert!(!filter.include_all_my_types);
        }
        other => panic!("expected a custom filter, got {:?}", other),
    }
}

#[test]
fn test_empty_strategy_config_uses_defaults() {
    let strategy = build_strategy(Some(&StrategyConfig::default()), StrategyUsage::Publish).unwrap();

    assert_eq!(
        strategy,
        DiscoveryStrategy::Custom {
            discovery_mode: DiscoveryMode::Default,
            distance_type: DistanceType::Default,
            ttl_seconds: TTL_SECONDS_DEFAULT,
        }
    );
}

proptest! {
    #[test]
    fn prop_ttl_within_bounds_is_kept(ttl in 1i64..=TTL_SECONDS_MAX as i64) {
        let config = StrategyConfig { ttl_seconds: Some(ttl), ..Default::default() };

        for usage in [StrategyUsage::Publish, StrategyUsage::Subscribe] {
            let strategy = build_strategy(Some(&config), usage).unwrap();
            prop_assert_eq!(strategy.ttl_seconds() as i64, ttl);
        }
    }

    #[test]
    fn prop_ttl_out_of_bounds_is_rejected(ttl in prop_oneof![
        i64::MIN..1i64,
        (TTL_SECONDS_MAX as i64 + 1)..(TTL_SECONDS_INFINITE as i64),
        (TTL_SECONDS_INFINITE as i64 + 1)..i64::MAX,
    ]) {
        let config = StrategyConfig { ttl_seconds: Some(ttl), ..Default::default() };
        let err = build_strategy(Some(&config), StrategyUsage::Subscribe).unwrap_err();
        prop_assert_eq!(validation_field(err), "strategy.ttlSeconds");
    }

    #[test]
    fn prop_flags_ignore_custom_fields(mode in any::<i64>(), distance in any::<i64>(), ttl in any::<i64>()) {
        let config = StrategyConfig {
            ble_only: Some(true),
            discovery_mode: Some(mode),
            distance_type: Some(distance),
            ttl_seconds: Some(ttl),
            ..Default::default()
        };
        prop_assert_eq!(build_strategy(Some(&config), StrategyUsage::Publish).unwrap(), DiscoveryStrategy::BleOnly);
    }

    #[test]
    fn prop_any_ten_byte_namespace_is_accepted(bytes in proptest::array::uniform10(any::<u8>())) {
        let config = eddystone(&hex::encode(bytes), None);

        match build_filter(Some(&config)).unwrap() {
            MessageFilter::Custom(filter) => prop_assert_eq!(filter.eddystone_uid.unwrap().namespace, bytes),
            other => prop_assert!(false, "unexpected filter {:?}", other),
        }
    }

    #[test]
    fn prop_wrong_length_namespace_is_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..32usize)
        .prop_filter("not ten bytes", |b| b.len() != 10))
    {
        let config = eddystone(&hex::encode(&bytes), None);
        let err = build_filter(Some(&config)).unwrap_err();
        prop_assert_eq!(validation_field(err), "includeEddystoneUids.hexNamespace");
    }

    #[test]
    fn prop_audio_bytes_are_capped(n in 1i64..10_000) {
        let config = FilterConfig {
            include_audio_bytes: Some(AudioBytesConfig { num_audio_bytes: n }),
            ..Default::default()
        };

        match build_filter(Some(&config)).unwrap() {
            MessageFilter::Custom(filter) => {
                let size = filter.audio_bytes.unwrap();
                prop_assert!(size >= 1 && size <= AUDIO_BYTES_MAX_SIZE);
                prop_assert_eq!(size as i64, n.min(AUDIO_BYTES_MAX_SIZE as i64));
            }
            other => prop_assert!(false, "unexpected filter {:?}", other),
        }
    }
}
