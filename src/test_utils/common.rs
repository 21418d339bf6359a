use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::JobResolver;
use crate::MockJobResolver;
use crate::ReshardingJob;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F>(
    timeout: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Resolver that always returns `job`
pub fn resolver_for(job: Arc<dyn ReshardingJob>) -> Arc<dyn JobResolver> {
    let mut resolver = MockJobResolver::new();
    resolver
        .expect_resolve_current_job()
        .returning(move || Some(job.clone()));
    Arc::new(resolver)
}

/// Resolver for a job that is already gone
pub fn empty_resolver() -> Arc<dyn JobResolver> {
    let mut resolver = MockJobResolver::new();
    resolver.expect_resolve_current_job().returning(|| None);
    Arc::new(resolver)
}
