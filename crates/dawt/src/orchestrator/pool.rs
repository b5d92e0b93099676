use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::executor::JobExecutor;
use crate::error::WorkerError;
use crate::jobs::JobId;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<JobId>>>;

/// Fixed set of tokio tasks consuming a bounded queue of job ids.
pub struct WorkerPool {
    job_sender: Mutex<Option<mpsc::Sender<JobId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Spawns `worker_count` workers on the current runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` or `queue_capacity` is 0.
    pub fn start(executor: JobExecutor, worker_count: usize, queue_capacity: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = mpsc::channel::<JobId>(queue_capacity);
        let job_receiver: SharedReceiver = Arc::new(Mutex::new(job_receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&job_receiver);
                let executor = executor.clone();
                tokio::spawn(run_worker(worker_id, receiver, executor))
            })
            .collect();

        info!("Started {} workers", worker_count);

        Self {
            job_sender: Mutex::new(Some(job_sender)),
            workers: Mutex::new(workers),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Claims a queue slot, waiting for room when the queue is full.
    ///
    /// The slot keeps the queue open until it is used or dropped, so an id
    /// sent through it is drained even if `shutdown` runs in between.
    pub async fn reserve(&self) -> Result<mpsc::OwnedPermit<JobId>, WorkerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(WorkerError::ShuttingDown);
        }

        let sender = self
            .job_sender
            .lock()
            .await
            .clone()
            .ok_or(WorkerError::ShuttingDown)?;

        sender
            .reserve_owned()
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Stops accepting work, lets queued jobs finish, then waits for every
    /// worker to exit.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down worker pool...");

        // Workers drain and exit once this sender and every reserved slot are gone
        self.job_sender.lock().await.take();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(worker_id: usize, receiver: SharedReceiver, executor: JobExecutor) {
    debug!("Worker {} started", worker_id);

    loop {
        // The lock is held only while waiting for the next id.
        let next = receiver.lock().await.recv().await;
        let Some(id) = next else {
            debug!("Worker {} job channel closed", worker_id);
            break;
        };

        debug!("Worker {} processing job {}", worker_id, id);
        if let Err(e) = executor.execute(&id).await {
            error!("Worker {} could not record job {}: {}", worker_id, id, e);
        }
    }

    debug!("Worker {} stopped", worker_id);
}
