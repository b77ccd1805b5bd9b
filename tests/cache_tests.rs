use chrono::{Local, TimeZone};
use hearth::cache::{fingerprint, CacheStrategy, MissReason, PlanCache, RateUpdate};
use hearth::config::CacheConfig;
use hearth::intent::IntentLabel;
use hearth::planner::{fallback_plan, Plan};
use hearth::services::hub::DeviceState;
use hearth::snapshot::{build_snapshot, EnvironmentSnapshot};
use std::time::{Duration, Instant};

fn snapshot_at(hour: u32, devices: &[(&str, &str)], temperature: Option<&str>) -> EnvironmentSnapshot {
    let mut states: Vec<DeviceState> = devices.iter().map(|(id, s)| DeviceState::new(id, s)).collect();
    if let Some(t) = temperature {
        states.push(
            DeviceState::new("sensor.hall_temperature", t)
                .with_attribute("device_class", "temperature".into()),
        );
    }
    let now = Local.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap();
    build_snapshot(&states, now)
}

fn bath_home(hour: u32) -> EnvironmentSnapshot {
    snapshot_at(
        hour,
        &[
            ("switch.water_heater", "off"),
            ("switch.bathroom_heater", "off"),
            ("light.bathroom_light", "off"),
        ],
        Some("21.4"),
    )
}

fn cache(strategy: CacheStrategy, max_size: usize) -> PlanCache {
    PlanCache::new(CacheConfig {
        strategy,
        max_size,
        ttl: Duration::from_secs(3600),
    })
}

#[test]
fn test_fingerprint_ignores_device_order_and_sensor_noise() {
    let a = snapshot_at(20, &[("light.a", "on"), ("switch.b", "off")], Some("21.41"));
    let mut b = snapshot_at(20, &[("switch.b", "off"), ("light.a", "on")], Some("21.43"));
    b.devices.reverse();

    assert_eq!(fingerprint(&a), fingerprint(&b), "Order and sub-0.1 noise must not matter");

    let c = snapshot_at(20, &[("light.a", "off"), ("switch.b", "off")], Some("21.41"));
    assert_ne!(fingerprint(&a).digest, fingerprint(&c).digest, "Device state changes the digest");

    let d = snapshot_at(8, &[("light.a", "on"), ("switch.b", "off")], Some("21.41"));
    assert_ne!(fingerprint(&a).digest, fingerprint(&d).digest, "Time of day changes the digest");
}

#[test]
fn test_store_then_query_hits() {
    let cache = cache(CacheStrategy::ContextAware, 50);
    let snap = bath_home(20);
    let plan = fallback_plan(IntentLabel::PrepareBath);

    let key = cache.store(IntentLabel::PrepareBath, &plan, Some(&snap));
    assert!(key.is_some());

    let lookup = cache.query(IntentLabel::PrepareBath, Some(&snap));
    assert!(lookup.hit);
    let entry = lookup.entry.unwrap();
    assert_eq!(Some(entry.key.clone()), key);
    assert_eq!(entry.usage_count, 2, "Hit must bump the usage counter");
    assert_eq!(entry.plan.id, plan.id);
}

#[test]
fn test_disabled_strategy_never_caches() {
    let cache = cache(CacheStrategy::Disabled, 50);
    let snap = bath_home(20);
    let plan = fallback_plan(IntentLabel::PrepareBath);

    assert_eq!(cache.store(IntentLabel::PrepareBath, &plan, Some(&snap)), None);
    assert_eq!(cache.len(), 0, "Store must not grow a disabled cache");

    let lookup = cache.query(IntentLabel::PrepareBath, Some(&snap));
    assert!(!lookup.hit);
    assert_eq!(lookup.reason, Some(MissReason::Disabled));
    assert_eq!(lookup.reason.unwrap().to_string(), "caching disabled");
}

#[test]
fn test_non_cacheable_plan_is_not_stored() {
    let cache = cache(CacheStrategy::ContextAware, 50);
    let status = Plan::status_only(IntentLabel::GetStatus);

    assert_eq!(cache.store(IntentLabel::GetStatus, &status, Some(&bath_home(20))), None);
    assert!(cache.is_empty());
}

#[test]
fn test_simple_strategy_ignores_environment() {
    let cache = cache(CacheStrategy::Simple, 50);
    let plan = fallback_plan(IntentLabel::Sleep);

    let key = cache.store(IntentLabel::Sleep, &plan, Some(&bath_home(20)));
    assert_eq!(key.as_deref(), Some("sleep"));

    let other = snapshot_at(9, &[("light.bedroom_light", "on")], None);
    assert!(cache.query(IntentLabel::Sleep, Some(&other)).hit);
    assert!(!cache.query(IntentLabel::LeaveHome, Some(&other)).hit);
}

#[test]
fn test_capacity_evicts_lowest_utility() {
    let cache = cache(CacheStrategy::ContextAware, 50);
    let plan = fallback_plan(IntentLabel::PrepareBath);
    let t0 = Instant::now();

    let snaps: Vec<EnvironmentSnapshot> = (0..51)
        .map(|i| snapshot_at(20, &[("sensor.counter", &i.to_string())], None))
        .collect();

    let mut keys = Vec::new();
    for (i, snap) in snaps.iter().take(50).enumerate() {
        let at = t0 + Duration::from_millis(i as u64);
        keys.push(cache.store_at(IntentLabel::PrepareBath, &plan, Some(snap), at).unwrap());
    }
    assert_eq!(cache.len(), 50);

    // Entry 0 is the oldest, but a fresh hit makes entry 1 the least useful.
    let hit = cache.query_at(IntentLabel::PrepareBath, Some(&snaps[0]), t0 + Duration::from_millis(100));
    assert!(hit.hit);

    cache.store_at(IntentLabel::PrepareBath, &plan, Some(&snaps[50]), t0 + Duration::from_millis(200));

    assert_eq!(cache.len(), 50, "Overflow must evict exactly one entry");
    assert!(cache.get(&keys[1]).is_none(), "Lowest utility entry must be evicted");
    assert!(cache.get(&keys[0]).is_some(), "Recently used entry must survive");
}

#[test]
fn test_eviction_removes_one_entry_per_store() {
    let cache = cache(CacheStrategy::ContextAware, 5);
    let plan = fallback_plan(IntentLabel::Sleep);

    for i in 0..12 {
        let snap = snapshot_at(22, &[("sensor.counter", &i.to_string())], None);
        let before = cache.len();
        cache.store(IntentLabel::Sleep, &plan, Some(&snap));
        let after = cache.len();
        assert!(after >= before, "Store must never shrink the cache");
        assert!(after <= 5, "Cache must respect its capacity");
    }
    assert_eq!(cache.len(), 5);
}

#[test]
fn test_expired_entry_is_dropped_on_read() {
    let cache = PlanCache::new(CacheConfig {
        strategy: CacheStrategy::ContextAware,
        max_size: 10,
        ttl: Duration::from_secs(1),
    });
    let snap = bath_home(20);
    let plan = fallback_plan(IntentLabel::PrepareBath);
    let t0 = Instant::now();

    cache.store_at(IntentLabel::PrepareBath, &plan, Some(&snap), t0);
    let lookup = cache.query_at(IntentLabel::PrepareBath, Some(&snap), t0 + Duration::from_secs(2));

    assert!(!lookup.hit);
    assert_eq!(lookup.reason, Some(MissReason::Expired));
    assert!(cache.is_empty(), "Expired entry must be deleted");
}

#[test]
fn test_success_rate_feedback_and_collapse() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    let snap = bath_home(20);
    let key = cache
        .store(IntentLabel::PrepareBath, &fallback_plan(IntentLabel::PrepareBath), Some(&snap))
        .unwrap();

    assert_eq!(cache.update_success_rate(&key, true), RateUpdate::Updated(1.0), "Rate is capped at 1.0");

    let mut last = RateUpdate::NotFound;
    for _ in 0..4 {
        last = cache.update_success_rate(&key, false);
    }
    assert!(matches!(last, RateUpdate::Removed(r) if r < 0.3));
    assert!(cache.get(&key).is_none());
    assert!(!cache.query(IntentLabel::PrepareBath, Some(&snap)).hit, "Collapsed plan must not be offered");

    assert_eq!(cache.update_success_rate("missing", true), RateUpdate::NotFound);
}

#[test]
fn test_failure_penalty_is_twice_the_reward() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    let key = cache
        .store(IntentLabel::Sleep, &fallback_plan(IntentLabel::Sleep), Some(&bath_home(23)))
        .unwrap();

    match cache.update_success_rate(&key, false) {
        RateUpdate::Updated(r) => assert!((r - 0.8).abs() < 1e-6),
        other => panic!("unexpected {:?}", other),
    }
    match cache.update_success_rate(&key, true) {
        RateUpdate::Updated(r) => assert!((r - 0.9).abs() < 1e-6),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_fuzzy_match_same_bucket_or_trusted() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    let evening = bath_home(20);
    let key = cache
        .store(IntentLabel::PrepareBath, &fallback_plan(IntentLabel::PrepareBath), Some(&evening))
        .unwrap();

    // Different devices, same bucket.
    let evening_drift = snapshot_at(19, &[("switch.water_heater", "on")], Some("22.0"));
    let lookup = cache.query(IntentLabel::PrepareBath, Some(&evening_drift));
    assert!(lookup.hit, "Same time-of-day bucket must fuzzy match");
    assert_eq!(lookup.entry.unwrap().key, key);

    // Different bucket, but trusted (rate 1.0 > 0.8).
    let morning = snapshot_at(8, &[("switch.water_heater", "on")], None);
    assert!(cache.query(IntentLabel::PrepareBath, Some(&morning)).hit);

    // At 0.8 the entry is no longer trusted across buckets.
    cache.update_success_rate(&key, false);
    assert!(!cache.query(IntentLabel::PrepareBath, Some(&morning)).hit);
    assert!(cache.query(IntentLabel::PrepareBath, Some(&evening_drift)).hit);

    // Other intents never fuzzy match.
    assert!(!cache.query(IntentLabel::Sleep, Some(&evening)).hit);
}

#[test]
fn test_fuzzy_match_prefers_higher_success_rate() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    let plan = fallback_plan(IntentLabel::PrepareBath);

    let a = snapshot_at(20, &[("sensor.counter", "1")], None);
    let b = snapshot_at(20, &[("sensor.counter", "2")], None);
    let key_a = cache.store(IntentLabel::PrepareBath, &plan, Some(&a)).unwrap();
    let key_b = cache.store(IntentLabel::PrepareBath, &plan, Some(&b)).unwrap();
    cache.update_success_rate(&key_a, false);

    let probe = snapshot_at(18, &[("sensor.counter", "3")], None);
    let lookup = cache.query(IntentLabel::PrepareBath, Some(&probe));
    assert_eq!(lookup.entry.unwrap().key, key_b, "Higher success rate wins the tie");
}

#[test]
fn test_find_candidates_is_scoped_to_intent() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    cache.store(IntentLabel::Sleep, &fallback_plan(IntentLabel::Sleep), Some(&bath_home(22)));
    cache.store(IntentLabel::PrepareBath, &fallback_plan(IntentLabel::PrepareBath), Some(&bath_home(20)));
    cache.store(IntentLabel::PrepareBath, &fallback_plan(IntentLabel::PrepareBath), Some(&bath_home(8)));

    let found = cache.find_candidates(IntentLabel::PrepareBath);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|e| e.intent == IntentLabel::PrepareBath));

    // Read-only: no usage bumps.
    assert!(found.iter().all(|e| e.usage_count == 1));
    assert_eq!(cache.stats().size, 3);
}

#[test]
fn test_rejected_candidate_is_left_untouched() {
    let cache = cache(CacheStrategy::ContextAware, 10);
    let snap = bath_home(20);
    let t0 = Instant::now();
    let key = cache
        .store_at(IntentLabel::PrepareBath, &fallback_plan(IntentLabel::PrepareBath), Some(&snap), t0)
        .unwrap();

    let later = t0 + Duration::from_secs(10);
    let lookup = cache.query_where_at(IntentLabel::PrepareBath, Some(&snap), later, |_| false);
    assert!(!lookup.hit);
    assert_eq!(lookup.reason, Some(MissReason::Rejected));

    let entry = cache.get(&key).unwrap();
    assert_eq!(entry.usage_count, 1, "Rejection must not count as use");
    assert_eq!(entry.last_used, t0, "Rejection must not refresh the entry");

    let accepted = cache.query_where_at(IntentLabel::PrepareBath, Some(&snap), later, |e| e.key == key);
    assert!(accepted.hit);
    assert_eq!(accepted.entry.unwrap().usage_count, 2);
}
