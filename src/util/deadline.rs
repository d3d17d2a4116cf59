use anyhow::{Context, Result, anyhow};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/**
 * Runs `work` on its own thread and waits at most `timeout` for it to report back.
 *
 * Returns `Ok(None)` when the deadline passes first. The worker is detached in that case and
 * keeps whatever it was blocked on; nothing ever joins it.
 */
pub fn run_with_deadline<T, F>(
    name: &str,
    timeout: Duration,
    work: F,
) -> Result<Option<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // The receiver is gone if we already timed out
            let _ = tx.send(work());
        })
        .with_context(|| format!("Failed to spawn {} thread", name))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(Some(result)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!(
            "{} thread exited without reporting a result",
            name
        )),
    }
}
