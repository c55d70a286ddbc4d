//! Quad-tree tiles of a page and the math that places them
//!
//! Resolution level `res` splits the rendered page into `2^res x 2^res` tiles.
//! Tiles are laid out in device space (after zoom and rotation) so that row 0
//! is always the top row on screen.

use super::engine::{DocumentEngine, DocumentView};
use super::geometry::{RectF, RectI, SizeI};
use super::types::{PageNo, Rotation, ZoomMode};

/// Deepest resolution level; keeps `1 << res` inside an `i32`
pub const MAX_TILE_RES: u16 = 30;

/// Position of a tile in the quad-tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePosition {
    pub res: u16,
    pub row: u32,
    pub col: u32,
}

impl TilePosition {
    /// The whole page as a single tile
    pub const WHOLE_PAGE: TilePosition = TilePosition::new(0, 0, 0);

    #[must_use]
    pub const fn new(res: u16, row: u32, col: u32) -> Self {
        Self { res, row, col }
    }

    /// Wildcard matching every tile whose resolution differs from `res`.
    ///
    /// Only used to select tiles for purging, never as a real tile.
    #[must_use]
    pub const fn other_resolutions(res: u16) -> Self {
        Self::new(res, u32::MAX, 0)
    }

    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.row == u32::MAX
    }

    /// Number of tiles per row (and per column) at this resolution
    #[must_use]
    pub const fn tiles_per_side(&self) -> u64 {
        1u64 << self.res
    }

    /// The four tiles one level deeper, in row-major order
    #[must_use]
    pub fn children(&self) -> [TilePosition; 4] {
        let res = self.res + 1;
        let (row, col) = (self.row * 2, self.col * 2);
        [
            TilePosition::new(res, row, col),
            TilePosition::new(res, row, col + 1),
            TilePosition::new(res, row + 1, col),
            TilePosition::new(res, row + 1, col + 1),
        ]
    }
}

impl Default for TilePosition {
    fn default() -> Self {
        Self::WHOLE_PAGE
    }
}

/// Sub-rectangle of `rect` covered by `tile`
#[must_use]
pub fn tile_rect(rect: RectF, tile: TilePosition) -> RectF {
    debug_assert!(tile.res <= MAX_TILE_RES);
    let per_side = tile.tiles_per_side() as f64;
    let dx = rect.dx / per_side;
    let dy = rect.dy / per_side;
    RectF::new(
        rect.x + f64::from(tile.col) * dx,
        rect.y + f64::from(tile.row) * dy,
        dx,
        dy,
    )
}

/// Page bounds in device pixels at the given zoom and rotation
#[must_use]
pub fn page_pixel_box(
    engine: &dyn DocumentEngine,
    page: PageNo,
    zoom: f32,
    rotation: Rotation,
) -> RectF {
    let mediabox = engine.page_mediabox(page);
    engine.transform(mediabox, page, zoom, rotation, false)
}

/// Tile bounds in device pixels, snapped to whole pixels
#[must_use]
pub fn tile_rect_device(
    engine: &dyn DocumentEngine,
    page: PageNo,
    rotation: Rotation,
    zoom: f32,
    tile: TilePosition,
) -> RectI {
    let pixelbox = page_pixel_box(engine, page, zoom, rotation);
    if tile.res == 0 || tile.is_wildcard() {
        return pixelbox.round();
    }
    tile_rect(pixelbox, tile).round()
}

/// Tile bounds in page units, i.e. what the engine has to rasterize.
///
/// Derived from the pixel-snapped device rectangle so neighbouring tiles
/// neither overlap nor leave gaps once rendered.
#[must_use]
pub fn tile_rect_user(
    engine: &dyn DocumentEngine,
    page: PageNo,
    rotation: Rotation,
    zoom: f32,
    tile: TilePosition,
) -> RectF {
    let mediabox = engine.page_mediabox(page);
    if tile.res == 0 || tile.is_wildcard() {
        return mediabox;
    }
    let device = tile_rect_device(engine, page, rotation, zoom, tile);
    engine.transform(RectF::from(device), page, zoom, rotation, true)
}

/// Where a tile lands on screen given where its page is displayed
#[must_use]
pub fn tile_on_screen(
    engine: &dyn DocumentEngine,
    page: PageNo,
    rotation: Rotation,
    zoom: f32,
    tile: TilePosition,
    page_on_screen: RectI,
) -> RectI {
    let origin = page_pixel_box(engine, page, zoom, rotation).round();
    tile_rect_device(engine, page, rotation, zoom, tile).offset(
        page_on_screen.x - origin.x,
        page_on_screen.y - origin.y,
    )
}

/// Inputs to [`tile_res`] besides the page size
#[derive(Clone, Copy, Debug)]
pub struct TileResLimits {
    /// Largest tile the platform is willing to display
    pub max_tile_size: SizeI,
    pub viewport: SizeI,
    pub zoom_mode: ZoomMode,
    pub clip_optimizations: bool,
}

/// Smallest resolution level at which a tile of a page rendered to
/// `pixelbox` stays below `max_tile_size`.
///
/// The geometric mean of the width and height factors is used instead of
/// their maximum so the tile area ends up just below the limit rather than
/// far below it. Larger tiles (one level less) are used for fit modes, for
/// pages smaller than the viewport, and for pages where clipping buys nothing.
#[must_use]
pub fn tile_res(pixelbox: RectF, limits: &TileResLimits) -> u16 {
    let factor_w = pixelbox.dx / f64::from(limits.max_tile_size.dx + 1);
    let factor_h = pixelbox.dy / f64::from(limits.max_tile_size.dy + 1);
    let mut factor = (factor_w * factor_h).sqrt();

    if limits.zoom_mode.prefers_large_tiles()
        || pixelbox.dx <= f64::from(limits.viewport.dx)
        || pixelbox.dy < f64::from(limits.viewport.dy)
        || !limits.clip_optimizations
    {
        factor /= 2.0;
    }

    let res = factor.log2().ceil();
    if res.is_nan() || res <= 0.0 {
        return 0;
    }
    res.min(f64::from(MAX_TILE_RES)) as u16
}

/// Target resolution for a page as the view currently shows it
#[must_use]
pub fn tile_res_for_view(view: &dyn DocumentView, page: PageNo, max_tile_size: SizeI) -> u16 {
    let engine = view.engine();
    let pixelbox = page_pixel_box(engine, page, view.zoom_real(page), view.rotation());
    let limits = TileResLimits {
        max_tile_size,
        viewport: view.viewport(),
        zoom_mode: view.zoom_mode(),
        clip_optimizations: engine.has_clip_optimizations(page),
    };
    tile_res(pixelbox, &limits)
}

/// Whether a tile intersects the viewport once grown by `fuzz` times its size
#[must_use]
pub fn is_tile_visible(
    view: &dyn DocumentView,
    page: PageNo,
    tile: TilePosition,
    fuzz: f32,
) -> bool {
    let Some(page_on_screen) = view.page_on_screen(page) else {
        return false;
    };
    let on_screen = tile_on_screen(
        view.engine(),
        page,
        view.rotation(),
        view.zoom_real(page),
        tile,
        page_on_screen,
    )
    .inflate_by_factor(fuzz);
    let screen = RectI::from_size(view.viewport());
    !on_screen.intersect(&screen).is_empty()
}
