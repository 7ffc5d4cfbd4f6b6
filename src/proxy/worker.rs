//! A single worker: pulls a job off its inbox, serves it from cache or the
//! upstream, and replies.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::cache::Cache;
use super::job::{Job, Response};
use super::upstream::UpstreamClient;

/// Inbox capacity of one: a worker only ever has a single job in flight, and
/// the dispatcher only hands it a new one once it has republished itself as
/// idle.
const INBOX_CAPACITY: usize = 1;

pub struct Worker<C: UpstreamClient> {
    upstream: C,
    cache: Arc<Cache>,
    idle: async_channel::Sender<mpsc::Sender<Job>>,
}

impl<C: UpstreamClient> Worker<C> {
    pub fn new(upstream: C, cache: Arc<Cache>, idle: async_channel::Sender<mpsc::Sender<Job>>) -> Self {
        Self {
            upstream,
            cache,
            idle,
        }
    }

    /// Runs until `cancel` fires. On every iteration the worker first
    /// publishes its own inbox into the idle queue, then waits for either a
    /// job to land in that inbox or cancellation.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let (tx, mut rx) = mpsc::channel(INBOX_CAPACITY);
            if self.idle.send(tx).await.is_err() {
                // Idle queue closed; the dispatcher is gone.
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("worker cancelled, shutting down");
                    return;
                }
                job = rx.recv() => {
                    match job {
                        Some(job) => self.handle(job).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle(&self, job: Job) {
        let key = job.key.clone();

        let cached = self.cache.get(&key).await;
        if !cached.is_empty() {
            job.respond(Response::ok(cached));
            return;
        }

        match self.upstream.get(&key).await {
            Ok(Some(value)) => {
                self.cache.set(key.clone(), value.clone()).await;
                job.respond(Response::ok(value));
            }
            Ok(None) => {
                job.respond(Response::not_found());
            }
            Err(e) => {
                error!(key = %key, error = %e, "upstream lookup failed");
                job.respond(Response::not_found());
            }
        }
    }
}
