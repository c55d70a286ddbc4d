//! Bounded queue of pending page renders
//!
//! Requests are kept in recency order: the most recently requested one is
//! rendered next. Tiled requests are coalesced by (document, page, tile) so
//! the worker never renders two versions of the same tile back to back.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::debug;

use super::cancel::CancelToken;
use super::request::{PageRenderRequest, RequestKey};
use super::tile::TilePosition;
use super::types::{DocumentId, PageNo, Rotation};

/// The request the worker is rendering right now
#[derive(Clone, Debug)]
pub struct InFlight {
    pub key: Option<RequestKey>,
    pub document: DocumentId,
    pub page: PageNo,
    pub zoom: f32,
    pub rotation: Rotation,
    pub timestamp: Instant,
    pub cancel: CancelToken,
}

impl InFlight {
    fn from_request(req: &PageRenderRequest) -> Self {
        Self {
            key: req.key(),
            document: req.document.id(),
            page: req.page,
            zoom: req.zoom,
            rotation: req.rotation,
            timestamp: req.timestamp,
            cancel: req.cancel.clone(),
        }
    }
}

/// What [`RenderQueue::enqueue`] did with a request
#[derive(Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued as a new request
    Queued,
    /// Merged into an already queued request for the same tile
    Coalesced,
    /// The same tile with the same parameters is being rendered right now
    AlreadyInFlight,
    /// The queue is shut down
    Rejected,
}

#[derive(Default)]
struct QueueState {
    /// Pending requests by recency sequence; the last one is rendered next
    pending: BTreeMap<u64, PageRenderRequest>,
    /// Sequence of the pending tiled request for each identity
    by_key: BTreeMap<RequestKey, u64>,
    next_seq: u64,
    current: Option<InFlight>,
    shutdown: bool,
}

impl QueueState {
    fn push(&mut self, req: PageRenderRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(key) = req.key() {
            self.by_key.insert(key, seq);
        }
        self.pending.insert(seq, req);
    }

    fn remove(&mut self, seq: u64) -> Option<PageRenderRequest> {
        let req = self.pending.remove(&seq)?;
        if let Some(key) = req.key() {
            self.by_key.remove(&key);
        }
        Some(req)
    }
}

/// Request queue shared by the UI thread and the render worker
pub struct RenderQueue {
    state: Mutex<QueueState>,
    /// Signalled whenever the worker is done with its current request
    settled: Condvar,
    wake: Sender<()>,
    capacity: usize,
}

impl RenderQueue {
    /// Create a queue holding at most `capacity` requests, together with the
    /// receiving end of its wake signal for the worker
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<()>) {
        let (wake, wake_rx) = flume::bounded(1);
        let queue = Self {
            state: Mutex::new(QueueState::default()),
            settled: Condvar::new(),
            wake,
            capacity: capacity.max(1),
        };
        (queue, wake_rx)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self) {
        // A pending token is enough to wake the worker.
        let _ = self.wake.try_send(());
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().pending.len() >= self.capacity
    }

    /// Queue a request.
    ///
    /// A tiled request identical to the one in flight is dropped, unless that
    /// render was already aborted; one that
    /// differs only in zoom or rotation aborts the in-flight render. A queued
    /// request for the same tile takes over the new parameters and moves to
    /// the head of the queue. On a full queue the oldest request is dropped.
    pub fn enqueue(&self, req: PageRenderRequest) -> Enqueued {
        let mut evicted = None;
        let outcome = {
            let mut state = self.lock();
            if state.shutdown {
                drop(state);
                req.discard();
                return Enqueued::Rejected;
            }
            let key = req.key();

            let mut outcome = None;
            let in_flight = state
                .current
                .as_ref()
                .filter(|current| key.is_some() && current.key == key);
            if let Some(current) = in_flight {
                if current.cancel.is_cancelled() {
                    debug!("Render of page {} was aborted, queueing it again", req.page);
                } else if current.zoom == req.zoom && current.rotation == req.rotation {
                    outcome = Some(Enqueued::AlreadyInFlight);
                } else {
                    debug!(
                        "Aborting in-flight render of page {} for new zoom {}",
                        req.page, req.zoom
                    );
                    current.cancel.cancel();
                }
            }

            if outcome.is_none() {
                let queued_seq = key.and_then(|key| state.by_key.get(&key).copied());
                if let Some(seq) = queued_seq {
                    if let Some(mut queued) = state.remove(seq) {
                        // keeps its first timestamp: render delay counts from the first request
                        queued.zoom = req.zoom;
                        queued.rotation = req.rotation;
                        queued.page_rect = req.page_rect;
                        state.push(queued);
                    }
                    outcome = Some(Enqueued::Coalesced);
                } else {
                    if state.pending.len() >= self.capacity {
                        let oldest = state.pending.keys().next().copied();
                        evicted = oldest.and_then(|seq| state.remove(seq));
                    }
                    state.push(req);
                    outcome = Some(Enqueued::Queued);
                }
            }
            outcome.unwrap_or(Enqueued::Queued)
        };

        if let Some(old) = evicted {
            debug!("Render queue full, dropping request for page {}", old.page);
            old.discard();
        }
        self.signal();
        outcome
    }

    /// Take the next request to render and mark it as in flight
    pub fn next_request(&self) -> Option<PageRenderRequest> {
        let mut state = self.lock();
        if state.shutdown {
            return None;
        }
        let seq = state.pending.keys().next_back().copied()?;
        let req = state.remove(seq)?;
        state.current = Some(InFlight::from_request(&req));
        Some(req)
    }

    /// The worker is done with the in-flight request
    pub fn finish_current(&self) {
        let mut state = self.lock();
        state.current = None;
        drop(state);
        self.settled.notify_all();
    }

    /// Snapshot of the in-flight request
    #[must_use]
    pub fn current(&self) -> Option<InFlight> {
        self.lock().current.clone()
    }

    /// Abort the in-flight request if it matches
    pub fn abort_current_if(&self, pred: impl Fn(&InFlight) -> bool) -> bool {
        let state = self.lock();
        match state.current.as_ref() {
            Some(current) if pred(current) => {
                current.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Remove every pending request matching `pred`; one-shot callers get `None`
    pub fn clear_matching(&self, pred: impl Fn(&PageRenderRequest) -> bool) -> usize {
        let removed: Vec<PageRenderRequest> = {
            let mut state = self.lock();
            let doomed: Vec<u64> = state
                .pending
                .iter()
                .filter(|(_, req)| pred(req))
                .map(|(seq, _)| *seq)
                .collect();
            doomed
                .into_iter()
                .filter_map(|seq| state.remove(seq))
                .collect()
        };
        let count = removed.len();
        for req in removed {
            req.discard();
        }
        count
    }

    /// When the matching queued or in-flight tile request was first queued
    #[must_use]
    pub fn request_timestamp(
        &self,
        document: DocumentId,
        page: PageNo,
        tile: TilePosition,
    ) -> Option<Instant> {
        let key = RequestKey {
            document,
            page,
            tile,
        };
        let state = self.lock();
        if let Some(current) = state.current.as_ref().filter(|c| c.key == Some(key)) {
            return Some(current.timestamp);
        }
        let seq = state.by_key.get(&key)?;
        state.pending.get(seq).map(|req| req.timestamp)
    }

    /// Block until the worker no longer renders anything for `document`,
    /// re-raising the abort flag every `poll` in case a new request for it
    /// started in the meantime
    pub fn wait_while_rendering(&self, document: DocumentId, poll: Duration) {
        let mut state = self.lock();
        loop {
            match state.current.as_ref() {
                Some(current) if current.document == document => {
                    current.cancel.cancel();
                    state = self
                        .settled
                        .wait_timeout(state, poll)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                _ => return,
            }
        }
    }

    /// Stop handing out requests; everything pending is dropped and the
    /// in-flight render is aborted
    pub fn shutdown(&self) {
        let removed: Vec<PageRenderRequest> = {
            let mut state = self.lock();
            state.shutdown = true;
            if let Some(current) = state.current.as_ref() {
                current.cancel.cancel();
            }
            state.by_key.clear();
            std::mem::take(&mut state.pending).into_values().collect()
        };
        for req in removed {
            req.discard();
        }
        self.signal();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.lock().shutdown
    }
}
