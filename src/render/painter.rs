//! Painting a page from whatever tiles the cache holds
//!
//! The page is walked as a quad-tree, breadth first. A tile that could not
//! be painted up to date at the target resolution is covered by its four
//! children, so any higher resolution bitmaps still cached get a chance to
//! fill in the gap. Missing tiles at the target resolution are requested on
//! the way.

use std::collections::VecDeque;
use std::time::Duration;

use log::warn;

use super::engine::DocumentHandle;
use super::geometry::RectI;
use super::service::RenderCache;
use super::surface::{PaintTarget, SurfaceError};
use super::tile::{TilePosition, tile_on_screen};
use super::types::{Bitmap, PageNo, RenderDelay, ZoomKey};

/// Result of painting one page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaintOutcome {
    /// Best state over all painted tiles; `Ready` once the page is fully up
    /// to date at the target resolution
    pub delay: RenderDelay,
    /// Some of what was painted is known to be out of date
    pub out_of_date_cue: bool,
}

struct TilePaint {
    delay: RenderDelay,
    /// Painted with a bitmap from another zoom, or not at all
    replacement: bool,
    out_of_date: bool,
}

impl RenderCache {
    /// Paint the part of `page` inside `bounds` onto `target`.
    ///
    /// `page_on_screen` is where the whole page sits in target coordinates.
    /// Once every tile at the target resolution is painted up to date, tiles
    /// of other resolutions are dropped from the cache.
    pub fn paint(
        &self,
        target: &mut dyn PaintTarget,
        bounds: RectI,
        doc: &DocumentHandle,
        page: PageNo,
        page_on_screen: RectI,
    ) -> PaintOutcome {
        let view = doc.view();
        let engine = doc.engine();
        let rotation = view.rotation();
        let zoom = view.zoom_real(page);

        let target_res = self.tile_res(doc, page);
        let max_res = self
            .cache
            .max_tile_res(doc.id(), page, rotation)
            .max(target_res);

        let mut queue = VecDeque::from([TilePosition::WHOLE_PAGE]);
        let mut delay_min = RenderDelay::Undefined;
        let mut needed_scaling = false;
        let mut out_of_date_cue = false;

        while let Some(tile) = queue.pop_front() {
            let on_screen = tile_on_screen(engine, page, rotation, zoom, tile, page_on_screen);
            if on_screen.is_empty() {
                delay_min = delay_min.min(RenderDelay::Failed);
                continue;
            }
            let on_screen = page_on_screen.intersect(&on_screen);
            let isect = bounds.intersect(&on_screen);
            if isect.is_empty() {
                continue;
            }

            let is_target_res = tile.res == target_res;
            let painted = self.paint_tile(target, isect, doc, page, tile, on_screen, is_target_res);
            out_of_date_cue |= painted.out_of_date;

            if !(is_target_res && painted.delay.is_ready()) && tile.res < max_res {
                queue.extend(tile.children());
            }
            if is_target_res && (painted.replacement || !painted.delay.is_ready()) {
                needed_scaling = true;
            }
            delay_min = delay_min.min(painted.delay);

            // next level starts: keep it in row-major order
            if tile.res > 0 && queue.front().is_some_and(|next| tile.res < next.res) {
                queue.make_contiguous().sort();
            }
        }

        if !needed_scaling {
            out_of_date_cue = false;
            self.cache.purge_page(
                doc.id(),
                page,
                Some(TilePosition::other_resolutions(target_res)),
            );
        }
        self.cache.purge_invisible(self.settings.visible_tile_fuzz);

        PaintOutcome {
            delay: delay_min,
            out_of_date_cue,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_tile(
        &self,
        target: &mut dyn PaintTarget,
        bounds: RectI,
        doc: &DocumentHandle,
        page: PageNo,
        tile: TilePosition,
        tile_on_screen: RectI,
        render_missing: bool,
    ) -> TilePaint {
        let view = doc.view();
        let rotation = view.rotation();
        let zoom = view.zoom_real(page);
        let mut out = TilePaint {
            delay: RenderDelay::Ready,
            replacement: false,
            out_of_date: false,
        };

        let mut entry = self
            .cache
            .find(doc.id(), page, rotation, ZoomKey::Exact(zoom), Some(tile));
        if entry.is_none() {
            out.replacement = true;
            if self.settings.use_stale_tiles {
                entry = self
                    .cache
                    .find(doc.id(), page, rotation, ZoomKey::Any, Some(tile));
            }
            out.delay = self.get_render_delay(doc, page, tile);
            if render_missing
                && out.delay == RenderDelay::Undefined
                && !self.is_render_queue_full()
            {
                self.request_tile(doc, page, tile);
                out.delay = self.get_render_delay(doc, page, tile);
            }
        }

        let Some(entry) = entry else {
            return out;
        };
        let Some(bitmap) = entry.bitmap() else {
            // a failed stale render says nothing about the pending one
            if !out.replacement {
                out.delay = RenderDelay::Failed;
            }
            return out;
        };

        match blit_tile(target, bitmap, bounds, tile_on_screen) {
            Ok(()) => {}
            Err(SurfaceError::ResourceExhausted { width, height }) => {
                warn!("Display refused a {width}x{height} tile of page {page}");
                drop(entry);
                out.delay = if !self.reduce_tile_size() {
                    RenderDelay::Failed
                } else if out.delay.is_ready() {
                    RenderDelay::Pending(Duration::from_millis(1))
                } else {
                    out.delay
                };
                return out;
            }
            Err(err) => {
                warn!("Failed to paint page {page} tile {tile:?}: {err}");
                out.delay = RenderDelay::Failed;
                return out;
            }
        }

        out.out_of_date = entry.out_of_date;
        if out.replacement {
            // stale content is on screen while the fresh render is pending
            out.delay = match out.delay {
                RenderDelay::Pending(waited) => RenderDelay::Pending(waited),
                _ => RenderDelay::Pending(Duration::ZERO),
            };
        }
        out
    }
}

/// Copy the part of a tile bitmap that lands in `bounds`, scaling for tiles
/// rendered at another zoom
fn blit_tile(
    target: &mut dyn PaintTarget,
    bitmap: &Bitmap,
    bounds: RectI,
    tile_on_screen: RectI,
) -> Result<(), SurfaceError> {
    let size = bitmap.size();
    let factor = (f64::from(size.dx) / f64::from(tile_on_screen.dx))
        .min(f64::from(size.dy) / f64::from(tile_on_screen.dy));
    let scaled = |v: i32| (f64::from(v) * factor).round() as i32;
    let src = RectI::new(
        scaled(bounds.x - tile_on_screen.x),
        scaled(bounds.y - tile_on_screen.y),
        scaled(bounds.dx).max(1),
        scaled(bounds.dy).max(1),
    );
    target.blit(bitmap, bounds, src)
}
