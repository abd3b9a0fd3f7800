use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use reqwest::Url;

use crate::envelope::{ApiPayload, decode_response};
use crate::error::ApiError;
use crate::request::{ApiRequest, HttpMethod};

/// Correlates a submitted request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Result received back on the UI thread.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub ticket: Ticket,
    pub result: Result<ApiPayload, ApiError>,
}

/// Something that runs backend calls off the UI thread.
/// `submit` never blocks; replies are collected with `poll` on every tick.
pub trait Backend {
    fn submit(&mut self, request: ApiRequest) -> Ticket;
    fn poll(&mut self) -> Option<ApiReply>;
}

struct Job {
    ticket: Ticket,
    request: ApiRequest,
}

/// Background executor: one thread with a current-thread tokio runtime,
/// fed through channels.
pub struct ApiExecutor {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<ApiReply>,
    next_ticket: u64,
    /// Replies produced without reaching the thread (it has stopped).
    local: VecDeque<ApiReply>,
}

impl ApiExecutor {
    /// Spawn the executor thread for `base`, sending `token` as a bearer token.
    pub fn spawn(base: Url, token: Option<String>) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (reply_tx, reply_rx) = mpsc::channel::<ApiReply>();

        thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create tokio runtime");
                    reject_all(&job_rx, &reply_tx, &format!("request executor unavailable: {e}"));
                    return;
                }
            };
            let client = reqwest::Client::new();

            rt.block_on(async move {
                while let Ok(job) = job_rx.recv() {
                    let result = execute(&client, &base, token.as_deref(), &job.request).await;
                    let reply = ApiReply {
                        ticket: job.ticket,
                        result,
                    };
                    if reply_tx.send(reply).is_err() {
                        break; // UI dropped the receiver
                    }
                }
            });
        });

        Self {
            sender: job_tx,
            receiver: reply_rx,
            next_ticket: 0,
            local: VecDeque::new(),
        }
    }
}

impl Backend for ApiExecutor {
    fn submit(&mut self, request: ApiRequest) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        if self.sender.send(Job { ticket, request }).is_err() {
            tracing::error!("API executor thread is gone");
            self.local.push_back(ApiReply {
                ticket,
                result: Err(ApiError::Transport("request executor stopped".to_string())),
            });
        }
        ticket
    }

    fn poll(&mut self) -> Option<ApiReply> {
        self.local
            .pop_front()
            .or_else(|| self.receiver.try_recv().ok())
    }
}

/// Answer every job, queued or still to come, with a transport error so no
/// caller waits forever on a worker that cannot run requests.
fn reject_all(jobs: &mpsc::Receiver<Job>, replies: &mpsc::Sender<ApiReply>, message: &str) {
    for job in jobs.iter() {
        let reply = ApiReply {
            ticket: job.ticket,
            result: Err(ApiError::Transport(message.to_string())),
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Execute one request using reqwest.
async fn execute(
    client: &reqwest::Client,
    base: &Url,
    token: Option<&str>,
    request: &ApiRequest,
) -> Result<ApiPayload, ApiError> {
    let url = request.url(base)?;
    let method = match request.method() {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    };
    tracing::debug!(method = request.method().as_str(), %url, "sending request");

    let mut builder = client.request(method, url.clone());
    if let Some(token) = token {
        builder = builder.bearer_auth(token);
    }
    if let Some(body) = request.body() {
        builder = builder.json(body);
    }

    let start = Instant::now();
    let result = async move {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_response(request.response_kind(), status, &body)
    }
    .await;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let method = request.method().as_str();
    match &result {
        Ok(_) if request.is_mutation() => tracing::info!(method, %url, elapsed_ms, "request ok"),
        Ok(_) => tracing::debug!(method, %url, elapsed_ms, "request ok"),
        Err(e) => tracing::warn!(method, %url, elapsed_ms, error = %e, "request failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_all_answers_queued_jobs() {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (reply_tx, reply_rx) = mpsc::channel::<ApiReply>();
        for n in 1..=2 {
            job_tx
                .send(Job {
                    ticket: Ticket(n),
                    request: ApiRequest::FetchTree { id: n as i64 },
                })
                .unwrap();
        }
        drop(job_tx);

        reject_all(&job_rx, &reply_tx, "no runtime");
        let replies: Vec<ApiReply> = reply_rx.try_iter().collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].ticket, Ticket(2));
        assert_eq!(
            replies[0].result,
            Err(ApiError::Transport("no runtime".to_string()))
        );
    }

    #[test]
    fn test_stopped_thread_replies_locally() {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (_reply_tx, reply_rx) = mpsc::channel::<ApiReply>();
        drop(job_rx);
        let mut executor = ApiExecutor {
            sender: job_tx,
            receiver: reply_rx,
            next_ticket: 0,
            local: VecDeque::new(),
        };

        let ticket = executor.submit(ApiRequest::DeleteNode { id: 3 });
        let reply = executor.poll().unwrap();
        assert_eq!(reply.ticket, ticket);
        assert!(reply.result.unwrap_err().is_transport());
    }
}
