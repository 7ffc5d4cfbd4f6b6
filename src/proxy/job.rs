//! The unit of work a front-end hands to the worker pool, and the reply it
//! gets back.

use tokio::sync::oneshot;

/// Outcome of handling a `Job`, expressed independently of any particular
/// wire format. Front-ends translate this into HTTP status codes or RESP
/// frames as appropriate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    BadRequest,
    MethodNotAllowed,
    ServiceUnavailable,
}

/// A worker's answer to a `Job`.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub body: String,
}

impl Response {
    pub fn ok(body: String) -> Self {
        Self {
            status: Status::Ok,
            body,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            body: String::new(),
        }
    }
}

/// A key lookup in flight. `reply` is a one-shot channel: a worker completes
/// the job exactly once, and a dropped `Job` (front-end gone, connection
/// closed) simply drops its sender, which the front-end observes as a
/// closed channel rather than a panic.
pub struct Job {
    pub key: String,
    reply: oneshot::Sender<Response>,
}

impl Job {
    /// Builds a job for `key`, returning it paired with the receiving half
    /// of its reply channel.
    pub fn new(key: String) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (Self { key, reply: tx }, rx)
    }

    /// Completes the job. Ignores a closed receiver — the caller already
    /// gave up on the answer.
    pub fn respond(self, response: Response) {
        let _ = self.reply.send(response);
    }
}
