//! Procedural document used by the command-line driver: letter sized pages
//! with a tinted checkerboard, stacked vertically in a scrolled viewport.

use pagerender::render::{
    Bitmap, DocumentEngine, DocumentView, PageNo, RectF, RectI, RenderArgs, Rotation, SizeI,
    ZoomMode,
};

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const CHECKER: f64 = 72.0;
const PAGE_GAP: i32 = 8;

const TINTS: [[u8; 3]; 4] = [
    [0xcc, 0xdd, 0xee],
    [0xee, 0xdd, 0xcc],
    [0xdd, 0xee, 0xcc],
    [0xe4, 0xd4, 0xee],
];

pub struct DemoEngine {
    page_count: usize,
}

impl DemoEngine {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count: page_count.max(1),
        }
    }

    fn map_point(&self, x: f64, y: f64, zoom: f32, rotation: Rotation) -> (f64, f64) {
        let z = f64::from(zoom);
        let (x, y) = (x * z, y * z);
        let (w, h) = (PAGE_WIDTH * z, PAGE_HEIGHT * z);
        match rotation {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (h - y, x),
            Rotation::Deg180 => (w - x, h - y),
            Rotation::Deg270 => (y, w - x),
        }
    }

    fn unmap_point(&self, x: f64, y: f64, zoom: f32, rotation: Rotation) -> (f64, f64) {
        let z = f64::from(zoom);
        let (w, h) = (PAGE_WIDTH * z, PAGE_HEIGHT * z);
        let (x, y) = match rotation {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (y, h - x),
            Rotation::Deg180 => (w - x, h - y),
            Rotation::Deg270 => (w - y, x),
        };
        (x / z, y / z)
    }

    fn shade(&self, page: PageNo, x: f64, y: f64) -> [u8; 3] {
        if x < CHECKER / 2.0 || y < CHECKER / 2.0 {
            return [0xff, 0xff, 0xff];
        }
        let cell = (x / CHECKER) as i64 + (y / CHECKER) as i64;
        if cell % 2 == 0 {
            TINTS[page % TINTS.len()]
        } else {
            [0xfa, 0xfa, 0xfa]
        }
    }
}

impl DocumentEngine for DemoEngine {
    fn page_mediabox(&self, _page: PageNo) -> RectF {
        RectF::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT)
    }

    fn transform(
        &self,
        rect: RectF,
        _page: PageNo,
        zoom: f32,
        rotation: Rotation,
        inverse: bool,
    ) -> RectF {
        let map = |x, y| {
            if inverse {
                self.unmap_point(x, y, zoom, rotation)
            } else {
                self.map_point(x, y, zoom, rotation)
            }
        };
        let (x0, y0) = map(rect.x, rect.y);
        let (x1, y1) = map(rect.x + rect.dx, rect.y + rect.dy);
        RectF::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    fn render_page(&self, args: &RenderArgs) -> Option<Bitmap> {
        if args.page == 0 || args.page > self.page_count {
            return None;
        }
        let rect = args
            .page_rect
            .unwrap_or_else(|| self.page_mediabox(args.page));
        let device = self
            .transform(rect, args.page, args.zoom, args.rotation, false)
            .round();
        if device.is_empty() {
            return None;
        }

        let mut bitmap = Bitmap::filled(device.dx as u32, device.dy as u32, [0, 0, 0]);
        let stride = device.dx as usize * Bitmap::BYTES_PER_PIXEL;
        for (row, line) in bitmap.pixels.chunks_exact_mut(stride).enumerate() {
            if args.cancel.is_cancelled() {
                return None;
            }
            let dy = f64::from(device.y) + row as f64 + 0.5;
            for (col, px) in line.chunks_exact_mut(Bitmap::BYTES_PER_PIXEL).enumerate() {
                let dx = f64::from(device.x) + col as f64 + 0.5;
                let (x, y) = self.unmap_point(dx, dy, args.zoom, args.rotation);
                px.copy_from_slice(&self.shade(args.page, x, y));
            }
        }
        Some(bitmap)
    }

    fn has_clip_optimizations(&self, _page: PageNo) -> bool {
        true
    }
}

/// Continuous vertical layout scrolled so that `first_page` is at the top
pub struct DemoView {
    engine: DemoEngine,
    zoom: f32,
    rotation: Rotation,
    viewport: SizeI,
    scroll_y: i32,
}

impl DemoView {
    pub fn new(
        page_count: usize,
        zoom: f32,
        rotation: Rotation,
        viewport: SizeI,
        first_page: PageNo,
    ) -> Self {
        let mut view = Self {
            engine: DemoEngine::new(page_count),
            zoom,
            rotation,
            viewport,
            scroll_y: 0,
        };
        let first_page = first_page.clamp(1, view.engine.page_count);
        view.scroll_y = view.page_rect(first_page).y;
        view
    }

    /// Page rectangle in unscrolled layout coordinates
    fn page_rect(&self, page: PageNo) -> RectI {
        let size = self
            .engine
            .transform(
                self.engine.page_mediabox(page),
                page,
                self.zoom,
                self.rotation,
                false,
            )
            .round()
            .size();
        let y = (page as i32 - 1) * (size.dy + PAGE_GAP);
        let x = ((self.viewport.dx - size.dx) / 2).max(0);
        RectI::new(x, y, size.dx, size.dy)
    }

    pub fn visible_pages(&self) -> Vec<PageNo> {
        (1..=self.engine.page_count)
            .filter(|&page| self.is_page_visible(page))
            .collect()
    }
}

impl DocumentView for DemoView {
    fn engine(&self) -> &dyn DocumentEngine {
        &self.engine
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }

    fn zoom_real(&self, _page: PageNo) -> f32 {
        self.zoom
    }

    fn zoom_mode(&self) -> ZoomMode {
        ZoomMode::Explicit
    }

    fn viewport(&self) -> SizeI {
        self.viewport
    }

    fn page_on_screen(&self, page: PageNo) -> Option<RectI> {
        if page == 0 || page > self.engine.page_count {
            return None;
        }
        Some(self.page_rect(page).offset(0, -self.scroll_y))
    }

    fn is_page_visible(&self, page: PageNo) -> bool {
        self.page_on_screen(page)
            .is_some_and(|r| !r.intersect(&RectI::from_size(self.viewport)).is_empty())
    }

    fn is_page_visible_nearby(&self, page: PageNo) -> bool {
        let screen = RectI::from_size(self.viewport).inflate_by_factor(1.0);
        self.page_on_screen(page)
            .is_some_and(|r| !r.intersect(&screen).is_empty())
    }
}
