use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::Result;

/// Re-evaluates `check` every `interval` until it returns `true` or `timeout` runs out.
/// Returns whether the condition was met. The check always runs at least once, and once
/// more right at the deadline.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        sleep(interval.min(deadline - now)).await;
    }
}
