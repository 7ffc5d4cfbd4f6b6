use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::proxy::job::{Job, Status};

use super::codec::{decode_command, encode_bulk, encode_error, NIL};

/// Binds the RESP listener. Left to the caller (the dispatcher's startup
/// sequence) so a bind failure is fatal rather than a logged no-op from a
/// detached task.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "RESP listener started");
    Ok(listener)
}

/// Accepts RESP connections on an already-bound `listener` until `cancel`
/// fires. Each connection is handled on its own task and runs a simple
/// request/response loop; a decode error or a closed socket ends that
/// connection only.
pub async fn serve(listener: TcpListener, jobs: async_channel::Sender<Job>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("RESP listener shutting down");
                return;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        debug!(error = %e, "failed to accept RESP connection");
                        continue;
                    }
                };
                let jobs = jobs.clone();
                tokio::spawn(async move {
                    handle_connection(stream, jobs).await;
                    debug!(%peer, "RESP connection closed");
                });
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, jobs: async_channel::Sender<Job>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let args = match decode_command(&mut reader).await {
            Ok(args) => args,
            Err(_) => return,
        };
        if args.is_empty() {
            continue;
        }

        let response = dispatch(args, &jobs).await;
        if writer.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Command tokens are case-folded before matching (`GET`, `get`, `GeT` are
/// equivalent); keys and other arguments are passed through verbatim.
async fn dispatch(mut args: Vec<String>, jobs: &async_channel::Sender<Job>) -> String {
    let cmd = args.remove(0).to_ascii_lowercase();
    match cmd.as_str() {
        "get" => {
            if args.len() > 1 {
                return encode_error("wrong number of arguments for 'get' command");
            }
            let Some(key) = args.into_iter().next() else {
                return encode_error("wrong number of arguments for 'get' command");
            };

            let (job, reply) = Job::new(key);
            if jobs.send(job).await.is_err() {
                return NIL.to_string();
            }
            match reply.await {
                Ok(resp) if resp.status == Status::Ok => encode_bulk(&resp.body),
                _ => NIL.to_string(),
            }
        }
        other => encode_error(&format!("unknown command '{other}'")),
    }
}
