//! Render worker - runs in a dedicated thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::cache::BitmapCache;
use super::engine::RenderArgs;
use super::queue::RenderQueue;
use super::request::{PageRenderRequest, RenderEvent, RequestKind};

/// Render queued requests until the queue shuts down.
///
/// Sleeps on `wake` while the queue is empty. Tiled results go into `cache`
/// followed by a [`RenderEvent::Repaint`]; one-shot results go straight to
/// their callback.
pub fn render_worker(
    queue: Arc<RenderQueue>,
    wake: Receiver<()>,
    cache: Arc<BitmapCache>,
    events: Sender<RenderEvent>,
) {
    info!("Render worker started");
    loop {
        let Some(req) = queue.next_request() else {
            if queue.is_shut_down() || wake.recv().is_err() {
                break;
            }
            continue;
        };
        handle_request(req, &cache, &events);
        // Only now can cancel_rendering observe that nothing is in flight.
        queue.finish_current();
    }
    info!("Render worker stopped");
}

fn handle_request(req: PageRenderRequest, cache: &BitmapCache, events: &Sender<RenderEvent>) {
    let view = req.document.view();
    if !req.is_one_shot() && !view.is_page_visible_nearby(req.page) {
        debug!("Skipping render of page {}, scrolled away", req.page);
        return;
    }
    if view.is_render_suspended() {
        debug!("Rendering suspended, dropping page {}", req.page);
        req.discard();
        return;
    }

    let args = RenderArgs {
        page: req.page,
        zoom: req.zoom,
        rotation: req.rotation,
        page_rect: Some(req.page_rect),
        cancel: req.cancel.clone(),
    };
    let started = std::time::Instant::now();
    let bitmap = req.document.engine().render_page(&args);

    if req.cancel.is_cancelled() {
        debug!("Render of page {} aborted", req.page);
        req.discard();
        return;
    }

    if req.is_one_shot() {
        if let RequestKind::OneShot { callback, .. } = req.kind {
            callback.deliver(bitmap.map(Arc::new));
        }
        return;
    }

    match &bitmap {
        Some(bmp) => debug!(
            "Rendered page {} tile {:?} at zoom {} ({}x{}) in {:?}",
            req.page,
            req.tile(),
            req.zoom,
            bmp.width_px,
            bmp.height_px,
            started.elapsed()
        ),
        None => warn!("Failed to render page {} tile {:?}", req.page, req.tile()),
    }
    cache.insert(&req, bitmap);
    let _ = events.send(RenderEvent::Repaint {
        document: req.document.id(),
        page: req.page,
    });
}
