//! Background rendering for interactive front ends.
//!
//! The caller submits requests as the viewport changes and polls for
//! results. Submitting supersedes whatever is queued or running; results
//! from superseded requests are dropped and never handed back.

use crate::cancel::{CancelToken, Supersession};
use crate::error::{Error, Result};
use crate::pipeline::{RenderPipeline, RenderRequest, RenderResult};
use crate::store::SignalSource;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct Job {
    request: RenderRequest,
    token: CancelToken,
}

struct Rendered {
    ticket: u64,
    result: Result<RenderResult>,
}

pub struct RenderWorker {
    jobs: Option<Sender<Job>>,
    results: Receiver<Rendered>,
    supersession: Supersession,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub fn spawn<S: SignalSource + ?Sized + 'static>(pipeline: Arc<RenderPipeline<S>>) -> Self {
        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (result_tx, result_rx) = channel::unbounded::<Rendered>();

        let handle = std::thread::Builder::new()
            .name("bsrview-render".to_string())
            .spawn(move || {
                while let Ok(mut job) = job_rx.recv() {
                    // Only the newest queued request is worth running.
                    while let Ok(newer) = job_rx.try_recv() {
                        job = newer;
                    }
                    if job.token.is_cancelled() {
                        continue;
                    }
                    let result = pipeline.render(&job.request, &job.token);
                    if matches!(result, Err(Error::Cancelled)) || job.token.is_cancelled() {
                        log::trace!("render {} superseded", job.token.ticket());
                        continue;
                    }
                    let rendered = Rendered {
                        ticket: job.token.ticket(),
                        result,
                    };
                    if result_tx.send(rendered).is_err() {
                        break;
                    }
                }
                log::debug!("render worker stopped");
            })
            .ok();

        if handle.is_none() {
            log::warn!("could not start render thread; renders will be dropped");
        }

        RenderWorker {
            jobs: Some(job_tx),
            results: result_rx,
            supersession: Supersession::new(),
            handle,
        }
    }

    /// Queue `request`, superseding every earlier one. Returns its ticket.
    pub fn submit(&self, request: RenderRequest) -> u64 {
        let token = self.supersession.issue();
        let ticket = token.ticket();
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(Job { request, token });
        }
        ticket
    }

    /// Cancel the running and queued requests.
    pub fn cancel(&self) {
        self.supersession.cancel_all();
    }

    /// Newest result for the current request, if it has arrived.
    pub fn poll(&self) -> Option<Result<RenderResult>> {
        let mut latest = None;
        while let Ok(rendered) = self.results.try_recv() {
            if let Some(result) = self.accept(rendered) {
                latest = Some(result);
            }
        }
        latest
    }

    /// Block up to `timeout` for the current request's result.
    pub fn wait(&self, timeout: Duration) -> Option<Result<RenderResult>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(rendered) => {
                    if let Some(result) = self.accept(rendered) {
                        return Some(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }

    fn accept(&self, rendered: Rendered) -> Option<Result<RenderResult>> {
        if self.supersession.is_current(rendered.ticket) {
            Some(rendered.result)
        } else {
            log::trace!("dropping stale render {}", rendered.ticket);
            None
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.supersession.cancel_all();
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
