//! Running blocking backend calls off the async executor
//!
//! Native vault and protection calls can block on OS locks or prompts. The
//! helpers here move them onto tokio's blocking pool. Dropping the returned
//! future only stops waiting: the native call itself runs to completion.

use crate::error::{CoreError, Result};

/// Run `task` on the blocking pool and wait for its result
pub async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| CoreError::WorkerError(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_forwards_error() {
        let result: Result<()> =
            run_blocking(|| Err(CoreError::VaultError("vault locked".to_string()))).await;

        match result {
            Err(CoreError::VaultError(msg)) => assert_eq!(msg, "vault locked"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_worker_error() {
        let result: Result<()> = run_blocking(|| panic!("backend blew up")).await;
        assert!(matches!(result, Err(CoreError::WorkerError(_))));
    }

    #[tokio::test]
    async fn test_abandoned_call_still_completes() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let call = run_blocking(move || {
            let _ = gate_rx.recv();
            let _ = done_tx.send(());
            Ok(())
        });

        // Stop waiting while the task is blocked
        let waited = tokio::time::timeout(Duration::from_millis(20), call).await;
        assert!(waited.is_err());

        gate_tx.send(()).unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
