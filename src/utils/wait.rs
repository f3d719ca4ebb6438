//! 有界等待原语
//!
//! 所有轮询都带显式的超时与间隔，超时返回失败而不是无限等待。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// 反复执行 `probe` 直到返回 `Some`，或超过 `timeout`
///
/// 至少执行一次探测；超时后返回 `None`。
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// 反复执行 `probe` 直到返回 `true`，或超过 `timeout`
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(timeout, interval, || {
        let fut = probe();
        async move { fut.await.then_some(()) }
    })
    .await
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let calls = AtomicUsize::new(0);
        let ok = wait_until(Duration::from_secs(1), Duration::from_millis(250), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_returns_first_value() {
        let calls = AtomicUsize::new(0);
        let value = poll_until(Duration::from_secs(5), Duration::from_secs(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            (n == 2).then_some(n)
        })
        .await;
        assert_eq!(value, Some(2));
    }
}
