//! Concurrent stage executor.
//!
//! A stage runs as one dispatcher task reading payloads from an unbounded
//! channel and spawning one worker per payload. Bounded stages gate workers
//! behind an owned [`Semaphore`] permit, released when the worker finishes,
//! fails, panics or is aborted. The output channel closes once the input is
//! closed and every worker has exited, which cascades completion downstream.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::harvest::traits::{HarvestStage, StageError};
use crate::model::FileContents;

pub type StageSender<T> = mpsc::UnboundedSender<FileContents<T>>;
pub type StageReceiver<T> = mpsc::UnboundedReceiver<FileContents<T>>;

/// Creates the channel feeding the first stage of a pipeline.
pub fn entry_channel<T>() -> (StageSender<T>, StageReceiver<T>) {
    mpsc::unbounded_channel()
}

/// How many payloads a stage may process at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Bounded(usize),
    Unbounded,
}

pub struct StageExecutor {
    semaphore: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl StageExecutor {
    pub fn new(concurrency: Concurrency, cancel: CancellationToken) -> Self {
        let semaphore = match concurrency {
            Concurrency::Bounded(limit) => Some(Arc::new(Semaphore::new(limit.max(1)))),
            Concurrency::Unbounded => None,
        };
        Self { semaphore, cancel }
    }

    /// Starts `stage` on its own task and returns the receiving end of its
    /// output. Must be called from within a tokio runtime.
    pub fn spawn<S>(self, stage: Arc<S>, input: StageReceiver<S::Input>) -> StageReceiver<S::Output>
    where
        S: HarvestStage,
    {
        let (output, receiver) = mpsc::unbounded_channel();
        let span = info_span!("stage", stage = stage.stage_name());
        tokio::spawn(self.dispatch(stage, input, output).instrument(span));
        receiver
    }

    async fn dispatch<S>(
        self,
        stage: Arc<S>,
        mut input: StageReceiver<S::Input>,
        output: StageSender<S::Output>,
    ) where
        S: HarvestStage,
    {
        let mut workers = JoinSet::new();
        let mut accepted = 0usize;
        let mut passed_through = 0usize;

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(_) = workers.join_next(), if !workers.is_empty() => continue,
                received = input.recv() => received,
            };

            let Some(FileContents { file, contents }) = received else {
                break;
            };

            let Some(contents) = contents else {
                passed_through += 1;
                let _ = output.send(FileContents::absent(file));
                continue;
            };

            let permit = match &self.semaphore {
                Some(semaphore) => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    permit = Arc::clone(semaphore).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                None => None,
            };

            accepted += 1;
            workers.spawn(run_item(
                Arc::clone(&stage),
                file,
                contents,
                output.clone(),
                permit,
                self.cancel.clone(),
            ));
        }

        if self.cancel.is_cancelled() {
            workers.shutdown().await;
            info!(accepted, passed_through, "Stage cancelled");
        } else {
            while workers.join_next().await.is_some() {}
            info!(accepted, passed_through, "Stage completed");
        }
    }
}

async fn run_item<S>(
    stage: Arc<S>,
    file: crate::model::FileReference,
    contents: S::Input,
    output: StageSender<S::Output>,
    _permit: Option<OwnedSemaphorePermit>,
    cancel: CancellationToken,
) where
    S: HarvestStage,
{
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        outcome = AssertUnwindSafe(stage.execute(&file, contents)).catch_unwind() => outcome,
    };

    let payload = match outcome {
        Ok(Ok(produced)) => FileContents::new(file, produced),
        Ok(Err(error)) => {
            debug!(file = %file, error = %error, "Item failed");
            FileContents::absent(file)
        }
        Err(_) => {
            let error = StageError::Panicked(stage.stage_name());
            debug!(file = %file, error = %error, "Item failed");
            FileContents::absent(file)
        }
    };

    let _ = output.send(payload);
}
