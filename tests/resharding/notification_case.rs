use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reshard_notify::JobKind;
use reshard_notify::ListenerManager;
use reshard_notify::ManagerState;
use reshard_notify::NodeEvent;
use reshard_notify::NodeEventType;
use reshard_notify::ReshardingJob;

use crate::common::wait_until;
use crate::common::Harness;
use crate::common::TaggedJob;
use crate::common::WAIT_TIMEOUT;

fn tagged(
    tag: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
) -> Arc<TaggedJob> {
    Arc::new(TaggedJob::new(tag, log.clone(), Duration::from_millis(10)))
}

#[test]
fn test_data_changed_rearms_and_notifies_once() {
    let harness = Harness::new("x");
    let log = Arc::new(Mutex::new(Vec::new()));
    let job = tagged("a", &log);
    let handle: Arc<dyn ReshardingJob> = job.clone();
    harness.slot.set(&handle);

    harness.apply(|c, p| c.create(p, "initial"));
    harness.manager.start();
    assert_eq!(harness.coordinator.registration_count(), 1);

    harness.apply(|c, p| c.set_data(p, "moved"));

    assert_eq!(harness.coordinator.registration_count(), 2);
    assert_eq!(harness.coordinator.pending_watch_count(&harness.path()), 1);
    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*log.lock(), vec!["a"]);
}

#[test]
fn test_node_created_notifies() {
    let harness = Harness::new("created");
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle: Arc<dyn ReshardingJob> = tagged("a", &log);
    harness.slot.set(&handle);
    harness.manager.start();

    harness.apply(|c, p| c.create(p, "first"));

    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 1));
    assert!(harness.manager.is_watch_armed());
}

#[test]
fn test_deleted_and_children_events_only_rearm() {
    let harness = Harness::new("deleted");
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle: Arc<dyn ReshardingJob> = tagged("a", &log);
    harness.slot.set(&handle);
    harness.apply(|c, p| c.create(p, "initial"));
    harness.manager.start();

    harness.apply(|c, p| c.delete(p));
    harness.apply(|c, p| c.fire(NodeEvent::new(NodeEventType::ChildrenChanged, p)));

    assert_eq!(harness.coordinator.registration_count(), 3);
    assert!(harness.manager.is_watch_armed());
    std::thread::sleep(Duration::from_millis(50));
    assert!(log.lock().is_empty());
}

#[test]
fn test_callbacks_follow_job_replacement_in_order() {
    let harness = Harness::new("replaced");
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = tagged("a", &log);
    let second = tagged("b", &log);
    let first_handle: Arc<dyn ReshardingJob> = first.clone();
    let second_handle: Arc<dyn ReshardingJob> = second.clone();
    harness.slot.set(&first_handle);
    harness.apply(|c, p| c.create(p, "v0"));
    harness.manager.start();

    harness.apply(|c, p| c.set_data(p, "v1"));
    harness.apply(|c, p| c.set_data(p, "v2"));
    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 2));

    harness.slot.set(&second_handle);
    harness.apply(|c, p| c.set_data(p, "v3"));
    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 3));

    assert_eq!(*log.lock(), vec!["a", "a", "b"]);
    assert_eq!(first.max_in_flight(), 1);
    assert_eq!(second.max_in_flight(), 1);
}

#[test]
fn test_unresolvable_job_is_skipped() {
    let harness = Harness::new("gone");
    let log = Arc::new(Mutex::new(Vec::new()));
    harness.apply(|c, p| c.create(p, "v0"));
    harness.manager.start();

    // Nothing in the slot yet
    harness.apply(|c, p| c.set_data(p, "v1"));
    std::thread::sleep(Duration::from_millis(50));
    assert!(log.lock().is_empty());
    assert_eq!(harness.manager.state(), Some(ManagerState::Active));

    let handle: Arc<dyn ReshardingJob> = tagged("a", &log);
    harness.slot.set(&handle);
    harness.apply(|c, p| c.set_data(p, "v2"));
    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 1));
}

#[test]
fn test_rearm_failure_keeps_current_notification() {
    let harness = Harness::new("flaky");
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle: Arc<dyn ReshardingJob> = tagged("a", &log);
    harness.slot.set(&handle);
    harness.apply(|c, p| c.create(p, "v0"));
    harness.manager.start();

    harness.coordinator.inject_registration_failures(1);
    harness.apply(|c, p| c.set_data(p, "v1"));

    assert!(wait_until(WAIT_TIMEOUT, || log.lock().len() == 1));
    assert!(!harness.manager.is_watch_armed());
    assert_eq!(harness.coordinator.pending_watch_count(&harness.path()), 0);

    // Without a watch later changes go unnoticed
    harness.apply(|c, p| c.set_data(p, "v2"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_cron_job_never_watches() {
    let harness = Harness::with_kind("nightly", JobKind::Cron);
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle: Arc<dyn ReshardingJob> = tagged("a", &log);
    harness.slot.set(&handle);

    harness.manager.start();
    harness.apply(|c, p| c.create(p, "v0"));
    harness.apply(|c, p| c.set_data(p, "v1"));

    assert_eq!(harness.coordinator.registration_count(), 0);
    assert!(!harness.manager.is_watching_enabled());
    std::thread::sleep(Duration::from_millis(50));
    assert!(log.lock().is_empty());
    harness.manager.shutdown();
}

#[test]
fn test_jobs_are_classified_from_lineage() {
    let kind = JobKind::from_lineage(["MyJob", "CronJob", "AbstractJob"], "CronJob", "AbstractJob");
    let harness = Harness::with_kind("lineage", kind);
    assert!(!harness.manager.is_watching_enabled());

    let kind = JobKind::from_lineage(["MyJob", "AbstractJob"], "CronJob", "AbstractJob");
    let harness = Harness::with_kind("lineage", kind);
    assert!(harness.manager.is_watching_enabled());
}
