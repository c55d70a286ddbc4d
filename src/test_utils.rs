//! In-memory engine, view and paint target for exercising the render cache
//! without a real document

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};

use crate::render::cancel::CancelToken;
use crate::render::engine::{DocumentEngine, DocumentHandle, DocumentView, RenderArgs};
use crate::render::geometry::{RectF, RectI, SizeI};
use crate::render::request::{PageRenderRequest, RequestKind};
use crate::render::surface::{PaintTarget, SurfaceError};
use crate::render::tile::{TilePosition, page_pixel_box, tile_rect_user};
use crate::render::types::{Bitmap, PageNo, Rotation, ZoomMode};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Document engine whose pages are all the same size and render as solid
/// color. Renders can be held at a gate to simulate slow pages.
pub struct FakeEngine {
    page_size: (f64, f64),
    fill: Mutex<[u8; 3]>,
    clip_optimizations: AtomicBool,
    failing: Mutex<HashSet<PageNo>>,
    render_calls: AtomicUsize,
    rendered: Mutex<Vec<RenderArgs>>,
    gate_closed: Mutex<bool>,
    gate: Condvar,
    started_tx: Sender<PageNo>,
    started_rx: Receiver<PageNo>,
}

impl FakeEngine {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let (started_tx, started_rx) = flume::unbounded();
        Self {
            page_size: (width, height),
            fill: Mutex::new([250, 250, 250]),
            clip_optimizations: AtomicBool::new(true),
            failing: Mutex::new(HashSet::new()),
            render_calls: AtomicUsize::new(0),
            rendered: Mutex::new(Vec::new()),
            gate_closed: Mutex::new(false),
            gate: Condvar::new(),
            started_tx,
            started_rx,
        }
    }

    /// US letter pages, 612 x 792 points
    #[must_use]
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    pub fn set_fill(&self, rgb: [u8; 3]) {
        *lock(&self.fill) = rgb;
    }

    pub fn set_clip_optimizations(&self, enabled: bool) {
        self.clip_optimizations.store(enabled, Ordering::SeqCst);
    }

    /// Make every render of `page` fail
    pub fn fail_page(&self, page: PageNo) {
        lock(&self.failing).insert(page);
    }

    /// Park renders until [`open_gate`](Self::open_gate) or cancellation
    pub fn close_gate(&self) {
        *lock(&self.gate_closed) = true;
    }

    pub fn open_gate(&self) {
        *lock(&self.gate_closed) = false;
        self.gate.notify_all();
    }

    #[must_use]
    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    /// Arguments of every render started so far
    #[must_use]
    pub fn rendered(&self) -> Vec<RenderArgs> {
        lock(&self.rendered).clone()
    }

    /// Wait until a render starts; returns its page
    pub fn wait_started(&self, timeout: Duration) -> Option<PageNo> {
        self.started_rx.recv_timeout(timeout).ok()
    }

    /// Wait until at least `count` renders were started
    pub fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.render_calls() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }
}

impl DocumentEngine for FakeEngine {
    fn page_mediabox(&self, _page: PageNo) -> RectF {
        RectF::new(0.0, 0.0, self.page_size.0, self.page_size.1)
    }

    fn transform(
        &self,
        rect: RectF,
        _page: PageNo,
        zoom: f32,
        rotation: Rotation,
        inverse: bool,
    ) -> RectF {
        let z = f64::from(zoom);
        let (w, h) = (self.page_size.0 * z, self.page_size.1 * z);
        if inverse {
            let r = match rotation {
                Rotation::Deg0 => rect,
                Rotation::Deg90 => RectF::new(rect.y, h - rect.x - rect.dx, rect.dy, rect.dx),
                Rotation::Deg180 => {
                    RectF::new(w - rect.x - rect.dx, h - rect.y - rect.dy, rect.dx, rect.dy)
                }
                Rotation::Deg270 => RectF::new(w - rect.y - rect.dy, rect.x, rect.dy, rect.dx),
            };
            return RectF::new(r.x / z, r.y / z, r.dx / z, r.dy / z);
        }
        let r = RectF::new(rect.x * z, rect.y * z, rect.dx * z, rect.dy * z);
        match rotation {
            Rotation::Deg0 => r,
            Rotation::Deg90 => RectF::new(h - (r.y + r.dy), r.x, r.dy, r.dx),
            Rotation::Deg180 => RectF::new(w - (r.x + r.dx), h - (r.y + r.dy), r.dx, r.dy),
            Rotation::Deg270 => RectF::new(r.y, w - (r.x + r.dx), r.dy, r.dx),
        }
    }

    fn render_page(&self, args: &RenderArgs) -> Option<Bitmap> {
        lock(&self.rendered).push(args.clone());
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(args.page);

        let mut closed = lock(&self.gate_closed);
        while *closed {
            if args.cancel.is_cancelled() {
                return None;
            }
            closed = self
                .gate
                .wait_timeout(closed, Duration::from_millis(5))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(closed);

        if args.cancel.is_cancelled() || lock(&self.failing).contains(&args.page) {
            return None;
        }
        let rect = args
            .page_rect
            .unwrap_or_else(|| self.page_mediabox(args.page));
        let device = self
            .transform(rect, args.page, args.zoom, args.rotation, false)
            .round();
        let fill = *lock(&self.fill);
        Some(Bitmap::filled(
            device.dx.max(1) as u32,
            device.dy.max(1) as u32,
            fill,
        ))
    }

    fn has_clip_optimizations(&self, _page: PageNo) -> bool {
        self.clip_optimizations.load(Ordering::SeqCst)
    }
}

struct ViewState {
    rotation: Rotation,
    zoom: f32,
    zoom_mode: ZoomMode,
    viewport: SizeI,
    visible: HashSet<PageNo>,
    nearby: HashSet<PageNo>,
    origins: HashMap<PageNo, (i32, i32)>,
    suspended: bool,
}

/// View onto a [`FakeEngine`] with directly settable visibility and zoom.
///
/// Visible pages sit at the viewport origin unless moved with
/// [`set_page_origin`](Self::set_page_origin).
pub struct FakeView {
    engine: Arc<FakeEngine>,
    state: Mutex<ViewState>,
}

impl FakeView {
    #[must_use]
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(ViewState {
                rotation: Rotation::Deg0,
                zoom: 1.0,
                zoom_mode: ZoomMode::Explicit,
                viewport: SizeI::new(800, 1000),
                visible: HashSet::new(),
                nearby: HashSet::new(),
                origins: HashMap::new(),
                suspended: false,
            }),
        }
    }

    #[must_use]
    pub fn fake_engine(&self) -> &Arc<FakeEngine> {
        &self.engine
    }

    pub fn set_visible_pages(&self, pages: &[PageNo]) {
        lock(&self.state).visible = pages.iter().copied().collect();
    }

    /// Pages that count as nearby in addition to the visible ones
    pub fn set_nearby_pages(&self, pages: &[PageNo]) {
        lock(&self.state).nearby = pages.iter().copied().collect();
    }

    pub fn set_zoom(&self, zoom: f32) {
        lock(&self.state).zoom = zoom;
    }

    pub fn set_zoom_mode(&self, mode: ZoomMode) {
        lock(&self.state).zoom_mode = mode;
    }

    pub fn set_rotation(&self, rotation: Rotation) {
        lock(&self.state).rotation = rotation;
    }

    pub fn set_viewport(&self, viewport: SizeI) {
        lock(&self.state).viewport = viewport;
    }

    pub fn set_page_origin(&self, page: PageNo, x: i32, y: i32) {
        lock(&self.state).origins.insert(page, (x, y));
    }

    pub fn set_suspended(&self, suspended: bool) {
        lock(&self.state).suspended = suspended;
    }
}

impl DocumentView for FakeView {
    fn engine(&self) -> &dyn DocumentEngine {
        self.engine.as_ref()
    }

    fn rotation(&self) -> Rotation {
        lock(&self.state).rotation
    }

    fn zoom_real(&self, _page: PageNo) -> f32 {
        lock(&self.state).zoom
    }

    fn zoom_mode(&self) -> ZoomMode {
        lock(&self.state).zoom_mode
    }

    fn viewport(&self) -> SizeI {
        lock(&self.state).viewport
    }

    fn page_on_screen(&self, page: PageNo) -> Option<RectI> {
        let (rotation, zoom, origin) = {
            let state = lock(&self.state);
            if !state.visible.contains(&page) {
                return None;
            }
            let origin = state.origins.get(&page).copied().unwrap_or((0, 0));
            (state.rotation, state.zoom, origin)
        };
        let size = page_pixel_box(self.engine.as_ref(), page, zoom, rotation)
            .round()
            .size();
        Some(RectI::new(origin.0, origin.1, size.dx, size.dy))
    }

    fn is_page_visible(&self, page: PageNo) -> bool {
        lock(&self.state).visible.contains(&page)
    }

    fn is_page_visible_nearby(&self, page: PageNo) -> bool {
        let state = lock(&self.state);
        state.visible.contains(&page) || state.nearby.contains(&page)
    }

    fn is_render_suspended(&self) -> bool {
        lock(&self.state).suspended
    }
}

/// Fake document: engine, view and the handle the cache sees
pub struct FakeDocument {
    pub engine: Arc<FakeEngine>,
    pub view: Arc<FakeView>,
    pub handle: DocumentHandle,
}

impl FakeDocument {
    /// Letter sized document with the given pages visible
    #[must_use]
    pub fn letter(visible: &[PageNo]) -> Self {
        let engine = Arc::new(FakeEngine::letter());
        let view = Arc::new(FakeView::new(engine.clone()));
        view.set_visible_pages(visible);
        let handle = DocumentHandle::new(view.clone());
        Self {
            engine,
            view,
            handle,
        }
    }
}

/// One recorded [`PaintTarget::blit`]
#[derive(Clone, Debug, PartialEq)]
pub struct Blit {
    pub dest: RectI,
    pub src: RectI,
    pub bitmap_size: SizeI,
}

/// Paint target that records blits instead of drawing them
#[derive(Default)]
pub struct RecordingTarget {
    pub blits: Vec<Blit>,
    /// Number of upcoming blits to refuse with [`SurfaceError::ResourceExhausted`]
    pub exhaust_next: usize,
}

impl RecordingTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total destination area covered, overlaps counted twice
    #[must_use]
    pub fn painted_area(&self) -> i64 {
        self.blits
            .iter()
            .map(|b| i64::from(b.dest.dx) * i64::from(b.dest.dy))
            .sum()
    }
}

impl PaintTarget for RecordingTarget {
    fn blit(&mut self, bitmap: &Bitmap, dest: RectI, src: RectI) -> Result<(), SurfaceError> {
        if self.exhaust_next > 0 {
            self.exhaust_next -= 1;
            return Err(SurfaceError::ResourceExhausted {
                width: bitmap.width_px as i32,
                height: bitmap.height_px as i32,
            });
        }
        self.blits.push(Blit {
            dest,
            src,
            bitmap_size: bitmap.size(),
        });
        Ok(())
    }
}

/// Tiled render request for `tile` at the view's current rotation
#[must_use]
pub fn tile_request(
    doc: &DocumentHandle,
    page: PageNo,
    zoom: f32,
    tile: TilePosition,
) -> PageRenderRequest {
    let rotation = doc.view().rotation();
    PageRenderRequest {
        document: doc.clone(),
        page,
        rotation,
        zoom,
        page_rect: tile_rect_user(doc.engine(), page, rotation, zoom, tile),
        kind: RequestKind::Tile(tile),
        timestamp: Instant::now(),
        cancel: CancelToken::new(),
    }
}
