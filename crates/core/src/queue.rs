//! Unbounded FIFO hand-off from request tasks to the simulation thread.
//!
//! Backed by an unbounded crossbeam channel: producers never block, the
//! consumer never takes a lock. The two halves are split by type so that
//! only the holder of the [`JobInbox`] (the driver) can dequeue.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::CoreError;
use crate::job::JobDescriptor;

/// Default depth above which enqueueing logs a resource warning.
pub const DEFAULT_WARN_DEPTH: usize = 1_000;

/// Producer half. Cheap to clone; shared by every request task.
#[derive(Clone)]
pub struct JobQueue {
    tx: Sender<JobDescriptor>,
    warn_depth: usize,
}

/// Consumer half, owned by the simulation driver.
pub struct JobInbox {
    rx: Receiver<JobDescriptor>,
}

/// Create a connected producer/consumer pair.
pub fn job_queue(warn_depth: usize) -> (JobQueue, JobInbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (JobQueue { tx, warn_depth }, JobInbox { rx })
}

impl JobQueue {
    /// Append a job. Never blocks.
    ///
    /// Fails only if the driver has shut down and dropped its inbox.
    pub fn enqueue(&self, job: JobDescriptor) -> Result<(), CoreError> {
        let job_id = job.id;
        let kind = job.kind();
        self.tx
            .send(job)
            .map_err(|_| CoreError::Internal("simulation driver is not running".into()))?;

        let depth = self.tx.len();
        if depth > self.warn_depth {
            tracing::warn!(
                %job_id,
                queue_depth = depth,
                warn_depth = self.warn_depth,
                "Job queue depth above operational bound",
            );
        } else {
            tracing::debug!(%job_id, %kind, queue_depth = depth, "Job enqueued");
        }
        Ok(())
    }

    /// Number of jobs waiting for the driver.
    pub fn depth(&self) -> usize {
        self.tx.len()
    }
}

impl JobInbox {
    /// Take the oldest pending job, if any. Never blocks.
    pub fn try_dequeue(&self) -> Option<JobDescriptor> {
        match self.rx.try_recv() {
            Ok(job) => Some(job),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::thread;

    use assert_matches::assert_matches;

    use super::*;
    use crate::job::{ConvertPayload, JobPayload};

    fn convert_job(n: usize) -> JobDescriptor {
        JobDescriptor::new(JobPayload::Convert(ConvertPayload {
            source_asset_path: PathBuf::from(format!("mesh_{n}.glb")),
            destination_directory: PathBuf::from("/tmp/usd"),
            mass: 1.0,
        }))
    }

    #[test]
    fn empty_queue_dequeues_nothing() {
        let (_queue, inbox) = job_queue(DEFAULT_WARN_DEPTH);
        assert!(inbox.try_dequeue().is_none());
    }

    #[test]
    fn dequeues_in_arrival_order() {
        let (queue, inbox) = job_queue(DEFAULT_WARN_DEPTH);
        let jobs: Vec<_> = (0..5).map(convert_job).collect();
        for job in &jobs {
            queue.enqueue(job.clone()).unwrap();
        }
        assert_eq!(queue.depth(), 5);

        for expected in &jobs {
            assert_eq!(inbox.try_dequeue().as_ref(), Some(expected));
        }
        assert!(inbox.try_dequeue().is_none());
        assert_eq!(inbox.depth(), 0);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let (queue, inbox) = job_queue(DEFAULT_WARN_DEPTH);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    for n in 0..50 {
                        let job = convert_job(t * 100 + n);
                        ids.push(job.id);
                        queue.enqueue(job).unwrap();
                    }
                    ids
                })
            })
            .collect();

        let submitted: HashSet<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let mut received = HashSet::new();
        while let Some(job) = inbox.try_dequeue() {
            assert!(received.insert(job.id), "job dequeued twice");
        }
        assert_eq!(received, submitted);
    }

    #[test]
    fn enqueue_fails_after_driver_drops_inbox() {
        let (queue, inbox) = job_queue(DEFAULT_WARN_DEPTH);
        drop(inbox);
        assert_matches!(queue.enqueue(convert_job(0)), Err(CoreError::Internal(_)));
    }
}
