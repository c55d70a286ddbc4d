//! Boundary to the document engine and to the view that displays it

use std::fmt;
use std::sync::Arc;

use super::cancel::CancelToken;
use super::geometry::{RectF, RectI, SizeI};
use super::types::{Bitmap, DocumentId, PageNo, Rotation, ZoomMode};

/// Parameters for a single rasterization
#[derive(Clone, Debug)]
pub struct RenderArgs {
    pub page: PageNo,
    pub zoom: f32,
    pub rotation: Rotation,
    /// Part of the page to render in page units; whole page when `None`
    pub page_rect: Option<RectF>,
    pub cancel: CancelToken,
}

/// Document engine (PDF, EPUB, ...). Parsing and rasterization live behind this.
pub trait DocumentEngine: Send + Sync {
    /// Logical page bounds in document units
    fn page_mediabox(&self, page: PageNo) -> RectF;

    /// Map a rectangle from page units to device pixels, or back when `inverse` is set
    fn transform(
        &self,
        rect: RectF,
        page: PageNo,
        zoom: f32,
        rotation: Rotation,
        inverse: bool,
    ) -> RectF;

    /// Rasterize; `None` on failure or when cancelled
    fn render_page(&self, args: &RenderArgs) -> Option<Bitmap>;

    /// False when clipping a page to a tile saves little (e.g. a single image
    /// covers most of the page), so larger tiles should be used
    fn has_clip_optimizations(&self, page: PageNo) -> bool;
}

/// State of an on-screen document view that the render cache consults.
///
/// Called from both the UI thread and the render worker, so implementations
/// must be cheap and thread safe.
pub trait DocumentView: Send + Sync {
    fn engine(&self) -> &dyn DocumentEngine;

    /// Current rotation of all pages
    fn rotation(&self) -> Rotation;

    /// Real zoom factor for a page (fit modes resolved)
    fn zoom_real(&self, page: PageNo) -> f32;

    fn zoom_mode(&self) -> ZoomMode;

    /// Size of the visible canvas in pixels
    fn viewport(&self) -> SizeI;

    /// Where the page currently sits relative to the viewport origin
    fn page_on_screen(&self, page: PageNo) -> Option<RectI>;

    fn is_page_visible(&self, page: PageNo) -> bool;

    /// Visible or close enough that it will likely be scrolled into view
    fn is_page_visible_nearby(&self, page: PageNo) -> bool;

    /// While true, no new rendering is started for this view
    fn is_render_suspended(&self) -> bool {
        false
    }
}

/// Cloneable handle to a document view, compared by [`DocumentId`]
#[derive(Clone)]
pub struct DocumentHandle {
    id: DocumentId,
    view: Arc<dyn DocumentView>,
}

impl DocumentHandle {
    #[must_use]
    pub fn new(view: Arc<dyn DocumentView>) -> Self {
        Self {
            id: DocumentId::next(),
            view,
        }
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    #[must_use]
    pub fn view(&self) -> &dyn DocumentView {
        self.view.as_ref()
    }

    #[must_use]
    pub fn engine(&self) -> &dyn DocumentEngine {
        self.view.engine()
    }
}

impl PartialEq for DocumentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DocumentHandle {}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
