//! Render request and event types

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::cancel::CancelToken;
use super::engine::DocumentHandle;
use super::geometry::RectF;
use super::tile::TilePosition;
use super::types::{Bitmap, DocumentId, PageNo, Rotation};

type CallbackFn = Box<dyn FnOnce(Option<Arc<Bitmap>>) + Send + 'static>;

/// Receiver of a one-shot render result.
///
/// Invoked exactly once: with the bitmap on success, with `None` when the
/// request is aborted, dropped from a full queue or fails. If the callback is
/// dropped without having been invoked it reports `None` itself.
pub struct RenderCallback {
    inner: Option<CallbackFn>,
}

impl RenderCallback {
    pub fn new(f: impl FnOnce(Option<Arc<Bitmap>>) + Send + 'static) -> Self {
        Self {
            inner: Some(Box::new(f)),
        }
    }

    pub fn deliver(mut self, bitmap: Option<Arc<Bitmap>>) {
        if let Some(f) = self.inner.take() {
            f(bitmap);
        }
    }
}

impl Drop for RenderCallback {
    fn drop(&mut self) {
        if let Some(f) = self.inner.take() {
            f(None);
        }
    }
}

impl fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallback")
            .field("pending", &self.inner.is_some())
            .finish()
    }
}

/// Identity used for coalescing tiled requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    pub document: DocumentId,
    pub page: PageNo,
    pub tile: TilePosition,
}

/// What to do with a finished render
#[derive(Debug)]
pub enum RequestKind {
    /// Store the bitmap in the cache under this tile
    Tile(TilePosition),
    /// Hand the bitmap to a callback, bypassing the cache
    OneShot {
        page_rect: RectF,
        callback: RenderCallback,
    },
}

/// A pending page render
#[derive(Debug)]
pub struct PageRenderRequest {
    pub document: DocumentHandle,
    pub page: PageNo,
    pub rotation: Rotation,
    pub zoom: f32,
    /// Area to rasterize in page units
    pub page_rect: RectF,
    pub kind: RequestKind,
    /// When the request was first queued
    pub timestamp: Instant,
    pub cancel: CancelToken,
}

impl PageRenderRequest {
    #[must_use]
    pub fn tile(&self) -> Option<TilePosition> {
        match self.kind {
            RequestKind::Tile(tile) => Some(tile),
            RequestKind::OneShot { .. } => None,
        }
    }

    /// Coalescing key; one-shot requests are never coalesced
    #[must_use]
    pub fn key(&self) -> Option<RequestKey> {
        self.tile().map(|tile| RequestKey {
            document: self.document.id(),
            page: self.page,
            tile,
        })
    }

    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        matches!(self.kind, RequestKind::OneShot { .. })
    }

    /// Drop the request, telling a one-shot caller it won't get a bitmap
    pub fn discard(self) {
        if let RequestKind::OneShot { callback, .. } = self.kind {
            callback.deliver(None);
        }
    }
}

/// Notifications from the render worker to the UI thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEvent {
    /// A tile of this page landed in the cache; the view should repaint it
    Repaint { document: DocumentId, page: PageNo },
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn callback_reports_none_when_dropped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = RenderCallback::new(move |bmp| sink.lock().unwrap().push(bmp.is_some()));
        drop(callback);
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn callback_fires_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = RenderCallback::new(move |bmp| sink.lock().unwrap().push(bmp.is_some()));
        callback.deliver(Some(Arc::new(Bitmap::filled(1, 1, [0, 0, 0]))));
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }
}
