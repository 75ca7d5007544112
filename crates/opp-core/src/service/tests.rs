use super::*;
use crate::config::OppConfig;
use crate::domain::{OppRef, TableRegistry};
use crate::error::AdjustError;
use crate::ports::{ChangeOutcome, OppVoltageApi};
use parking_lot::Mutex;
use shared_bus::{EventFilter, OppEvent};
use shared_types::{DeviceId, Hertz, MicroVolt, Voltages};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const F_1GHZ: Hertz = Hertz(1_000_000);

fn uv(value: u64) -> MicroVolt {
    MicroVolt(value)
}

fn cpu0() -> DeviceId {
    DeviceId::from("cpu0")
}

fn make_adjuster() -> VoltageAdjuster {
    let registry = Arc::new(TableRegistry::new());
    registry
        .register_table(
            cpu0(),
            [(F_1GHZ, Voltages::new(900_000, 850_000, 950_000))],
        )
        .unwrap();
    VoltageAdjuster::new(registry)
}

fn current(adjuster: &VoltageAdjuster) -> Voltages {
    adjuster
        .registry()
        .acquire(&cpu0())
        .unwrap()
        .find_by_frequency(F_1GHZ)
        .unwrap()
        .snapshot_voltages()
}

fn counting_observer(adjuster: &VoltageAdjuster) -> (Arc<AtomicUsize>, shared_bus::Subscription) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let sub = adjuster
        .subscribe(&cpu0(), move |_: OppEvent, _: &OppRef| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    (hits, sub)
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_same_voltages_unchanged() {
    let adjuster = make_adjuster();

    let outcome = adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(900_000), uv(850_000), uv(950_000))
        .unwrap();

    assert_eq!(outcome, ChangeOutcome::Unchanged);
    assert_eq!(current(&adjuster), Voltages::new(900_000, 850_000, 950_000));
}

#[test]
fn test_new_voltages_changed() {
    let adjuster = make_adjuster();

    let outcome = adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();

    assert_eq!(outcome, ChangeOutcome::Changed);
    assert!(outcome.is_changed());
    assert_eq!(current(&adjuster), Voltages::new(920_000, 870_000, 960_000));
}

#[test]
fn test_missing_device() {
    let adjuster = make_adjuster();
    let missing = DeviceId::from("missing-device");

    let err = adjuster
        .adjust_voltage(&missing, F_1GHZ, uv(1), uv(1), uv(1))
        .unwrap_err();

    assert_eq!(err, AdjustError::DeviceNotFound { device: missing });
    assert_eq!(adjuster.metrics().snapshot().device_not_found, 1);
}

#[test]
fn test_missing_device_never_notifies() {
    let adjuster = make_adjuster();
    let (hits, _sub) = counting_observer(&adjuster);

    let result = adjuster.adjust_voltage(&DeviceId::from("gpu"), F_1GHZ, uv(1), uv(1), uv(1));

    assert!(matches!(result, Err(AdjustError::DeviceNotFound { .. })));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(current(&adjuster), Voltages::new(900_000, 850_000, 950_000));
}

#[test]
fn test_missing_frequency() {
    let adjuster = make_adjuster();

    let err = adjuster
        .adjust_voltage(&cpu0(), Hertz(2_000_000), uv(1), uv(1), uv(1))
        .unwrap_err();

    assert_eq!(
        err,
        AdjustError::FrequencyNotFound {
            device: cpu0(),
            frequency: Hertz(2_000_000),
        }
    );
    assert_eq!(adjuster.metrics().snapshot().frequency_not_found, 1);
}

#[test]
fn test_missing_frequency_never_notifies() {
    let adjuster = make_adjuster();
    let (hits, _sub) = counting_observer(&adjuster);

    for _ in 0..3 {
        let result = adjuster.adjust_voltage(&cpu0(), Hertz(2_000_000), uv(1), uv(1), uv(1));
        assert!(matches!(result, Err(AdjustError::FrequencyNotFound { .. })));
    }
    assert!(adjuster.disable_opp(&cpu0(), Hertz(2_000_000)).is_err());

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(adjuster.metrics().snapshot().notifications_dispatched, 0);
}

// =============================================================================
// NOTIFICATION
// =============================================================================

#[test]
fn test_idempotent_adjust_notifies_once() {
    let adjuster = make_adjuster();
    let (hits, _sub) = counting_observer(&adjuster);

    let first = adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();
    let second = adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();

    assert_eq!(first, ChangeOutcome::Changed);
    assert_eq!(second, ChangeOutcome::Unchanged);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_target_decides_change() {
    let adjuster = make_adjuster();
    let (hits, _sub) = counting_observer(&adjuster);

    // Different min/max with the same target is still a no-op.
    let outcome = adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(900_000), uv(800_000), uv(990_000))
        .unwrap();

    assert_eq!(outcome, ChangeOutcome::Unchanged);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(current(&adjuster), Voltages::new(900_000, 850_000, 950_000));
}

#[test]
fn test_each_observer_once_in_order() {
    let adjuster = make_adjuster();
    let order = Arc::new(Mutex::new(Vec::new()));

    let subs: Vec<_> = (0..3)
        .map(|index| {
            let order = order.clone();
            adjuster
                .subscribe(&cpu0(), move |event: OppEvent, opp: &OppRef| {
                    order
                        .lock()
                        .push((index, event, opp.snapshot_voltages().target));
                })
                .unwrap()
        })
        .collect();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(910_000), uv(860_000), uv(960_000))
        .unwrap();

    assert_eq!(
        *order.lock(),
        vec![
            (0, OppEvent::AdjustVoltage, uv(910_000)),
            (1, OppEvent::AdjustVoltage, uv(910_000)),
            (2, OppEvent::AdjustVoltage, uv(910_000)),
        ]
    );
    assert_eq!(adjuster.metrics().snapshot().notifications_dispatched, 3);
    drop(subs);
}

#[test]
fn test_observer_holds_reference_during_callback() {
    let adjuster = make_adjuster();
    let counts = Arc::new(Mutex::new(Vec::new()));
    let log = counts.clone();

    let _sub = adjuster
        .subscribe(&cpu0(), move |_: OppEvent, opp: &OppRef| {
            log.lock().push(opp.ref_count());
        })
        .unwrap();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(930_000), uv(880_000), uv(980_000))
        .unwrap();

    // The table's own reference plus the one retained for the dispatch.
    assert_eq!(*counts.lock(), vec![2]);

    let opp = adjuster
        .registry()
        .acquire(&cpu0())
        .unwrap()
        .find_by_frequency(F_1GHZ)
        .unwrap();
    assert_eq!(opp.ref_count(), 2);
}

#[test]
fn test_observer_reads_table_during_callback() {
    let adjuster = Arc::new(make_adjuster());
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let registry = adjuster.registry().clone();

    let _sub = adjuster
        .subscribe(&cpu0(), move |_: OppEvent, _: &OppRef| {
            let table = registry.acquire(&cpu0()).unwrap();
            let opp = table.find_by_frequency(F_1GHZ).unwrap();
            *slot.lock() = Some(opp.snapshot_voltages());
        })
        .unwrap();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(940_000), uv(890_000), uv(990_000))
        .unwrap();

    assert_eq!(
        *seen.lock(),
        Some(Voltages::new(940_000, 890_000, 990_000))
    );
}

#[test]
fn test_filtered_subscription_skips_other_events() {
    let adjuster = make_adjuster();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let _sub = adjuster
        .subscribe_filtered(
            &cpu0(),
            EventFilter::events(vec![OppEvent::Disable]),
            move |_: OppEvent, _: &OppRef| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();
    adjuster.disable_opp(&cpu0(), F_1GHZ).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscribe_missing_device() {
    let adjuster = make_adjuster();
    let result = adjuster.subscribe(&DeviceId::from("gpu"), |_: OppEvent, _: &OppRef| {});
    assert!(matches!(result, Err(AdjustError::DeviceNotFound { .. })));

    // Subscribing is not a request; the request counters stay consistent.
    let snap = adjuster.metrics().snapshot();
    assert_eq!(snap.requests, 0);
    assert_eq!(snap.device_not_found, 0);
    assert!(snap.failures() <= snap.requests);
}

#[test]
fn test_subscribe_shared_through_api() {
    let adjuster = make_adjuster();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let observer: crate::ports::SharedOppObserver =
        Arc::new(move |_: OppEvent, _: &OppRef| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let api: &dyn OppVoltageApi = &adjuster;
    let _first = api
        .subscribe_shared(&cpu0(), EventFilter::all(), observer.clone())
        .unwrap();
    let _second = api
        .subscribe_shared(&cpu0(), EventFilter::all(), observer)
        .unwrap();

    api.adjust_voltage(&cpu0(), F_1GHZ, uv(1), uv(1), uv(1))
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

// =============================================================================
// AVAILABILITY
// =============================================================================

#[test]
fn test_disable_then_enable() {
    let adjuster = make_adjuster();
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    let _sub = adjuster
        .subscribe(&cpu0(), move |event: OppEvent, opp: &OppRef| {
            log.lock().push((event, opp.is_available()));
        })
        .unwrap();

    assert_eq!(
        adjuster.enable_opp(&cpu0(), F_1GHZ).unwrap(),
        ChangeOutcome::Unchanged
    );
    assert_eq!(
        adjuster.disable_opp(&cpu0(), F_1GHZ).unwrap(),
        ChangeOutcome::Changed
    );
    assert_eq!(
        adjuster.disable_opp(&cpu0(), F_1GHZ).unwrap(),
        ChangeOutcome::Unchanged
    );
    assert_eq!(
        adjuster.enable_opp(&cpu0(), F_1GHZ).unwrap(),
        ChangeOutcome::Changed
    );

    assert_eq!(
        *events.lock(),
        vec![(OppEvent::Disable, false), (OppEvent::Enable, true)]
    );
    assert_eq!(adjuster.metrics().snapshot().availability_changes, 2);
}

#[test]
fn test_disable_missing_frequency() {
    let adjuster = make_adjuster();
    assert!(matches!(
        adjuster.disable_opp(&cpu0(), Hertz(1)),
        Err(AdjustError::FrequencyNotFound { .. })
    ));
}

// =============================================================================
// LIFETIME & METRICS
// =============================================================================

#[test]
fn test_table_handle_released_on_every_path() {
    let adjuster = make_adjuster();
    let probe = adjuster.registry().acquire(&cpu0()).unwrap();
    let baseline = probe.holders();

    let _ = adjuster.adjust_voltage(&cpu0(), F_1GHZ, uv(1), uv(1), uv(1));
    let _ = adjuster.adjust_voltage(&cpu0(), F_1GHZ, uv(1), uv(1), uv(1));
    let _ = adjuster.adjust_voltage(&cpu0(), Hertz(3), uv(1), uv(1), uv(1));

    assert_eq!(probe.holders(), baseline);
}

#[test]
fn test_slow_dispatch_counted() {
    let registry = Arc::new(TableRegistry::new());
    registry
        .register_table(cpu0(), [(F_1GHZ, Voltages::exact(900_000))])
        .unwrap();
    let adjuster = VoltageAdjuster::with_config(
        registry,
        OppConfig::default().with_slow_dispatch_threshold_ms(1),
    );
    let _sub = adjuster
        .subscribe(&cpu0(), |_: OppEvent, _: &OppRef| {
            std::thread::sleep(Duration::from_millis(20));
        })
        .unwrap();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(1), uv(1), uv(1))
        .unwrap();

    assert_eq!(adjuster.metrics().snapshot().slow_dispatches, 1);
}

#[test]
fn test_metrics_snapshot() {
    let adjuster = make_adjuster();

    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();
    adjuster
        .adjust_voltage(&cpu0(), F_1GHZ, uv(920_000), uv(870_000), uv(960_000))
        .unwrap();
    let _ = adjuster.adjust_voltage(&DeviceId::from("x"), F_1GHZ, uv(1), uv(1), uv(1));

    let snap = adjuster.metrics().snapshot();
    assert_eq!(snap.requests, 3);
    assert_eq!(snap.changed, 1);
    assert_eq!(snap.unchanged, 1);
    assert_eq!(snap.device_not_found, 1);
}
