//! Wires the cache, the upstream-backed worker pool and the two front-ends
//! together, and owns the startup/shutdown state machine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ShutdownError, StartupError};
use crate::presentation::{http, resp};

use super::cache::Cache;
use super::job::Job;
use super::upstream::RedisUpstreamClient;
use super::worker::Worker;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Coarse lifecycle state, mirrored in the log lines `run`/`shutdown` emit.
/// Not surfaced to callers as a type today, but named here because the
/// shutdown sequence below walks through exactly these four states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Draining,
    Stopped,
    ForcedStopped,
}

/// The proxy's core: an admission queue fed by both front-ends, a pool of
/// workers that serve jobs from cache-then-upstream, and the cancellation
/// tokens that drive a graceful shutdown.
pub struct Dispatcher {
    cache: Arc<Cache>,
    upstream_addr: String,
    max_workers: usize,
    jobs_tx: async_channel::Sender<Job>,
    jobs_rx: async_channel::Receiver<Job>,
    idle_tx: async_channel::Sender<mpsc::Sender<Job>>,
    idle_rx: async_channel::Receiver<mpsc::Sender<Job>>,
    dispatch_cancel: CancellationToken,
    worker_cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        let cache = Arc::new(Cache::new(
            config.cache_capacity,
            config.key_expiry,
            config.workers.max(1) as usize,
        ));
        let (jobs_tx, jobs_rx) = async_channel::bounded(config.concurrency.max(1) as usize);
        let (idle_tx, idle_rx) = async_channel::bounded(config.workers.max(1) as usize);

        Self {
            cache,
            upstream_addr: config.upstream_addr(),
            max_workers: config.workers.max(1) as usize,
            jobs_tx,
            jobs_rx,
            idle_tx,
            idle_rx,
            dispatch_cancel: CancellationToken::new(),
            worker_cancel: CancellationToken::new(),
        }
    }

    /// A clone of the admission queue's sending half, handed to each
    /// front-end so it can submit jobs without borrowing the dispatcher.
    pub fn job_sender(&self) -> async_channel::Sender<Job> {
        self.jobs_tx.clone()
    }

    pub fn cache(&self) -> Arc<Cache> {
        self.cache.clone()
    }

    /// Probes the upstream, spawns the worker pool, starts both front-ends,
    /// then runs the dispatch loop until cancelled. Returns once shutdown
    /// has drained the dispatch loop; front-end tasks are expected to react
    /// to the same cancellation token independently.
    pub async fn run(&self, http_addr: SocketAddr, resp_addr: SocketAddr) -> Result<(), StartupError> {
        RedisUpstreamClient::ping(&self.upstream_addr)
            .await
            .map_err(|e| {
                error!(error = %e, addr = %self.upstream_addr, "error while connecting to upstream");
                StartupError::UpstreamUnreachable(e.to_string())
            })?;
        info!(addr = %self.upstream_addr, "connected to upstream");

        // Bind both listeners before spawning anything: a bind failure here
        // is fatal, and must leave no listener (and no worker pool) running.
        let http_listener = http::server::bind(http_addr).await.map_err(|e| {
            error!(error = %e, addr = %http_addr, "failed to bind HTTP listener");
            StartupError::ListenerBind(e.to_string())
        })?;
        let resp_listener = resp::server::bind(resp_addr).await.map_err(|e| {
            error!(error = %e, addr = %resp_addr, "failed to bind RESP listener");
            StartupError::ListenerBind(e.to_string())
        })?;

        for id in 0..self.max_workers {
            let client = RedisUpstreamClient::connect(&self.upstream_addr)
                .await
                .map_err(|e| StartupError::UpstreamUnreachable(e.to_string()))?;
            let worker = Worker::new(client, self.cache.clone(), self.idle_tx.clone());
            let cancel = self.worker_cancel.clone();
            tokio::spawn(async move {
                worker.run(cancel).await;
            });
            info!(worker = id, "worker started");
        }

        let http_state = http::state::AppState {
            jobs: self.jobs_tx.clone(),
        };
        tokio::spawn(http::server::serve(
            http_listener,
            http_state,
            self.dispatch_cancel.clone(),
        ));
        tokio::spawn(resp::server::serve(
            resp_listener,
            self.jobs_tx.clone(),
            self.dispatch_cancel.clone(),
        ));

        info!(state = ?State::Running, "dispatcher running");
        self.dispatch().await;
        Ok(())
    }

    /// Pulls jobs off the admission queue and hands each to the next idle
    /// worker inbox. Matching a job to a worker happens on its own spawned
    /// task so that one slow upstream lookup never stalls admission of the
    /// next job.
    async fn dispatch(&self) {
        loop {
            tokio::select! {
                _ = self.dispatch_cancel.cancelled() => {
                    return;
                }
                job = self.jobs_rx.recv() => {
                    let Ok(job) = job else { return };
                    let idle_rx = self.idle_rx.clone();
                    tokio::spawn(async move {
                        if let Ok(inbox) = idle_rx.recv().await {
                            let _ = inbox.send(job).await;
                        }
                    });
                }
            }
        }
    }

    /// Stops admitting new jobs and polls every 500ms until every worker has
    /// republished itself as idle, up to `timeout`. If the timeout elapses
    /// first, cancels the workers outright and reports the forced stop.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        info!(state = ?State::Draining, "draining dispatcher");
        self.dispatch_cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.idle_rx.len() == self.max_workers {
                info!(state = ?State::Stopped, "all workers drained, dispatcher stopped");
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    error!(state = ?State::ForcedStopped, "shutdown timed out, forcing workers to stop");
                    self.worker_cancel.cancel();
                    return Err(ShutdownError::Timeout);
                }
                _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn test_config(redis_host: String, redis_port: u16) -> Config {
        Config {
            debug: false,
            key_expiry: Duration::from_secs(5),
            cache_capacity: 10,
            redis_host,
            redis_port,
            workers: 1,
            concurrency: 4,
            http_port: 0,
            resp_port: 0,
            shutdown_timeout: Duration::from_secs(1),
        }
    }

    /// A listener that accepts a connection and immediately drops it without
    /// ever sending a valid `PONG` stands in for an unreachable upstream.
    #[tokio::test]
    async fn run_fails_startup_when_the_upstream_probe_ping_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let config = test_config(addr.ip().to_string(), addr.port());
        let dispatcher = Dispatcher::new(&config);

        let result = dispatcher
            .run(
                "127.0.0.1:0".parse().unwrap(),
                "127.0.0.1:0".parse().unwrap(),
            )
            .await;
        assert!(matches!(result, Err(StartupError::UpstreamUnreachable(_))));
    }
}
