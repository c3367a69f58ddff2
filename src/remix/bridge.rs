//! Async entry points
//!
//! Rendering is blocking and CPU bound. These wrappers move it onto
//! tokio's blocking pool and bound the whole request with a timeout, the
//! only way to cancel a render from the caller's side. A render that times
//! out keeps running on its worker thread until it finishes; its result is
//! discarded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::error::{RemixError, Result};
use crate::remix::engine::RemixEngine;
use crate::remix::instructions::InstructionSet;
use crate::remix::report::{FeedbackOutcome, RenderOutcome};
use crate::session::FeedbackDelta;

async fn run_with_timeout<T, F>(timeout: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RemixError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("render task failed: {}", join_error),
        ))),
        Err(_) => {
            warn!("Request timed out after {:?}", timeout);
            Err(RemixError::Timeout {
                secs: timeout.as_secs(),
            })
        }
    }
}

/// [`RemixEngine::render_remix`] under a caller-level timeout
pub async fn render_remix_with_timeout(
    engine: Arc<RemixEngine>,
    mix_path: PathBuf,
    instructions: InstructionSet,
    timeout: Duration,
) -> Result<RenderOutcome> {
    run_with_timeout(timeout, move || engine.render_remix(&mix_path, &instructions)).await
}

/// [`RemixEngine::apply_feedback`] under a caller-level timeout
pub async fn apply_feedback_with_timeout(
    engine: Arc<RemixEngine>,
    session_id: String,
    delta: FeedbackDelta,
    timeout: Duration,
) -> Result<FeedbackOutcome> {
    run_with_timeout(timeout, move || engine.apply_feedback(&session_id, &delta)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let result = run_with_timeout(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RemixError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_result_passes_through() {
        let value = run_with_timeout(Duration::from_secs(5), || Ok(7)).await.unwrap();
        assert_eq!(value, 7);
    }
}
