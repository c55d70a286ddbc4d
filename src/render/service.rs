//! Render service - owns the bitmap cache, the request queue and the worker

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::Receiver;
use log::{debug, info, warn};

use super::cache::BitmapCache;
use super::cancel::CancelToken;
use super::engine::DocumentHandle;
use super::geometry::{RectF, SizeI};
use super::queue::{Enqueued, RenderQueue};
use super::request::{PageRenderRequest, RenderCallback, RenderEvent, RequestKind};
use super::tile::{TilePosition, is_tile_visible, tile_rect_user, tile_res_for_view};
use super::types::{DocumentId, PageNo, RenderDelay, Rotation};
use super::worker::render_worker;
use crate::settings::RenderSettings;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to start render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Page render cache: decides what to render, renders it on a background
/// thread and paints whatever is available.
///
/// All methods take `&self` and may be called from any thread. Dropping the
/// cache stops the worker.
pub struct RenderCache {
    pub(super) settings: RenderSettings,
    pub(super) cache: Arc<BitmapCache>,
    queue: Arc<RenderQueue>,
    max_tile_size: Mutex<SizeI>,
    events: Receiver<RenderEvent>,
    worker: Option<JoinHandle<()>>,
}

impl RenderCache {
    pub fn new(settings: &RenderSettings) -> Result<Self, RenderError> {
        let cache = Arc::new(BitmapCache::new(settings.max_bitmaps_cached));
        let (queue, wake) = RenderQueue::new(settings.max_page_requests);
        let queue = Arc::new(queue);
        let (events_tx, events) = flume::unbounded();

        let worker = {
            let queue = queue.clone();
            let cache = cache.clone();
            std::thread::Builder::new()
                .name("render-worker".into())
                .spawn(move || render_worker(queue, wake, cache, events_tx))?
        };

        info!(
            "Render cache started: {} bitmaps, {} queued requests",
            settings.max_bitmaps_cached, settings.max_page_requests
        );
        Ok(Self {
            settings: settings.clone(),
            cache,
            queue,
            max_tile_size: Mutex::new(settings.max_tile_size.into()),
            events,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[must_use]
    pub fn bitmaps(&self) -> &BitmapCache {
        &self.cache
    }

    #[must_use]
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    /// Current tile size limit in device pixels
    #[must_use]
    pub fn max_tile_size(&self) -> SizeI {
        *self
            .max_tile_size
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain pending repaint notifications without blocking
    pub fn poll_events(&self) -> Vec<RenderEvent> {
        self.events.try_iter().collect()
    }

    /// Channel the worker announces finished tiles on
    #[must_use]
    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.events
    }

    /// Resolution level a page should be rendered at right now
    #[must_use]
    pub fn tile_res(&self, doc: &DocumentHandle, page: PageNo) -> u16 {
        tile_res_for_view(doc.view(), page, self.max_tile_size())
    }

    #[must_use]
    pub fn is_render_queue_full(&self) -> bool {
        self.queue.is_full()
    }

    /// How long the request for this tile has been waiting, counted from
    /// when it was first queued
    #[must_use]
    pub fn get_render_delay(
        &self,
        doc: &DocumentHandle,
        page: PageNo,
        tile: TilePosition,
    ) -> RenderDelay {
        match self.queue.request_timestamp(doc.id(), page, tile) {
            Some(queued) => RenderDelay::Pending(queued.elapsed()),
            None => RenderDelay::Undefined,
        }
    }

    /// Request a page that is small enough to need at most two tiles.
    ///
    /// Larger pages are requested tile by tile while painting.
    pub fn request_rendering(&self, doc: &DocumentHandle, page: PageNo) {
        let res = self.tile_res(doc, page);
        if res > 1 {
            return;
        }
        self.request_tile_inner(doc, page, TilePosition::new(res, 0, 0), true);
        if res == 1 && !self.is_render_queue_full() {
            self.request_tile_inner(doc, page, TilePosition::new(res, 0, 1), false);
        }
    }

    /// Request one tile at the view's current zoom and rotation. Queued
    /// requests for the same page at another resolution, or for tiles that
    /// scrolled out of view, are dropped.
    pub fn request_tile(
        &self,
        doc: &DocumentHandle,
        page: PageNo,
        tile: TilePosition,
    ) -> Option<Enqueued> {
        self.request_tile_inner(doc, page, tile, true)
    }

    fn request_tile_inner(
        &self,
        doc: &DocumentHandle,
        page: PageNo,
        tile: TilePosition,
        clear_queue_for_page: bool,
    ) -> Option<Enqueued> {
        let view = doc.view();
        if view.is_render_suspended() {
            return None;
        }
        let rotation = view.rotation();
        let zoom = view.zoom_real(page);

        if clear_queue_for_page {
            let id = doc.id();
            let dropped = self.queue.clear_matching(|req| {
                req.document.id() == id
                    && req.page == page
                    && req.tile().is_some_and(|queued| {
                        queued.res != tile.res || !is_tile_visible(view, page, queued, 0.0)
                    })
            });
            if dropped > 0 {
                debug!("Dropped {dropped} stale requests for page {page}");
            }
        }

        if !view.is_page_visible_nearby(page) {
            return None;
        }

        let req = PageRenderRequest {
            document: doc.clone(),
            page,
            rotation,
            zoom,
            page_rect: tile_rect_user(doc.engine(), page, rotation, zoom, tile),
            kind: RequestKind::Tile(tile),
            timestamp: Instant::now(),
            cancel: CancelToken::new(),
        };
        let outcome = self.queue.enqueue(req);
        debug!("Request page {page} tile {tile:?} at zoom {zoom}: {outcome:?}");
        Some(outcome)
    }

    /// Render part of a page for a one-off consumer (thumbnails, export).
    ///
    /// The result bypasses the cache. `callback` runs exactly once, on the
    /// worker thread, with `None` if the request is dropped, aborted or fails.
    /// Returns false if the request was refused outright.
    pub fn render(
        &self,
        doc: &DocumentHandle,
        page: PageNo,
        rotation: Rotation,
        zoom: f32,
        page_rect: RectF,
        callback: RenderCallback,
    ) -> bool {
        if doc.view().is_render_suspended() {
            callback.deliver(None);
            return false;
        }
        let req = PageRenderRequest {
            document: doc.clone(),
            page,
            rotation,
            zoom,
            page_rect,
            kind: RequestKind::OneShot {
                page_rect,
                callback,
            },
            timestamp: Instant::now(),
            cancel: CancelToken::new(),
        };
        self.queue.enqueue(req) == Enqueued::Queued
    }

    /// Drop every queued request for a document and wait until the worker
    /// is no longer rendering for it. Nothing for the document enters the
    /// cache after this returns.
    pub fn cancel_rendering(&self, doc: &DocumentHandle) {
        let id = doc.id();
        let dropped = self.queue.clear_matching(|req| req.document.id() == id);
        debug!("Cancelled {dropped} queued requests for {id:?}");
        self.queue.wait_while_rendering(
            id,
            Duration::from_millis(self.settings.cancel_poll_interval_ms.max(1)),
        );
    }

    /// The content of `rect` (page units) changed: stop rendering the page
    /// and mark overlapping tiles out of date
    pub fn invalidate(&self, doc: &DocumentHandle, page: PageNo, rect: RectF) {
        let id = doc.id();
        self.queue
            .clear_matching(|req| req.document.id() == id && req.page == page);
        self.queue
            .abort_current_if(|current| current.document == id && current.page == page);
        let marked = self.cache.invalidate_region(id, page, rect);
        debug!("Invalidated {marked} tiles of page {page}");
    }

    /// Forget every bitmap of a document (e.g. on close)
    pub fn free_for_document(&self, doc: DocumentId) -> usize {
        self.cache.purge_document(doc)
    }

    /// Keep the bitmaps of a reloaded document as previews for its new handle
    pub fn keep_for_document(&self, old: DocumentId, new: &DocumentHandle) -> usize {
        self.cache.keep_for_document(old, new)
    }

    /// Halve the tile size after the display refused a surface.
    ///
    /// Returns false once tiles are already at the minimum; otherwise drops
    /// everything queued and cached so pages re-render at the new size.
    pub fn reduce_tile_size(&self) -> bool {
        let min = self.settings.min_tile_dimension;
        {
            let mut size = self
                .max_tile_size
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if size.dx < min || size.dy < min {
                return false;
            }
            if size.dx > size.dy {
                size.dx /= 2;
            } else {
                size.dy /= 2;
            }
            info!("Reduced maximum tile size to {}x{}", size.dx, size.dy);
        }
        self.queue.clear_matching(|_| true);
        self.cache.clear();
        true
    }

    /// Stop the worker and wait for it to exit. Queued one-shot callbacks
    /// receive `None`.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Render worker panicked");
            }
        }
    }
}

impl Drop for RenderCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
