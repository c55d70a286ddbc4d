//! Bounded cache of rendered tiles
//!
//! Entries live in a dense array and are removed by swapping with the last
//! element. Every resident entry holds one reference for the cache itself;
//! [`BitmapCache::find`] hands out [`CachedBitmap`] guards that hold one more
//! each. An entry the cache lets go of while a guard still uses it is retired:
//! no longer findable or counted, and gone once the last guard is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, warn};

use super::engine::DocumentHandle;
use super::geometry::RectF;
use super::request::PageRenderRequest;
use super::tile::{TilePosition, is_tile_visible, tile_rect_user};
use super::types::{Bitmap, DocumentId, PageNo, Rotation, ZoomKey};

/// A rendered tile owned by the cache
pub struct CacheEntry {
    id: u64,
    pub document: DocumentHandle,
    pub page: PageNo,
    pub rotation: Rotation,
    pub zoom: ZoomKey,
    pub tile: TilePosition,
    /// `None` when the engine failed to rasterize the tile
    pub bitmap: Option<Arc<Bitmap>>,
    pub out_of_date: bool,
    refs: u32,
    retired: bool,
}

impl CacheEntry {
    fn matches(
        &self,
        document: DocumentId,
        page: PageNo,
        rotation: Rotation,
        zoom: ZoomKey,
        tile: Option<TilePosition>,
    ) -> bool {
        !self.retired
            && self.document.id() == document
            && self.page == page
            && self.rotation == rotation
            && zoom.matches(self.zoom)
            && tile.is_none_or(|tile| tile == self.tile)
    }

    fn is_for(&self, document: DocumentId, page: PageNo) -> bool {
        !self.retired && self.document.id() == document && self.page == page
    }
}

#[derive(Default)]
struct Slots {
    entries: Vec<CacheEntry>,
    next_id: u64,
}

impl Slots {
    fn live_len(&self) -> usize {
        self.entries.iter().filter(|e| !e.retired).count()
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Give up the cache's own reference to the entry at `idx`.
    /// Returns true if the entry was removed right away.
    fn retire_at(&mut self, idx: usize) -> bool {
        let entry = &mut self.entries[idx];
        if entry.retired {
            return false;
        }
        entry.retired = true;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.entries.swap_remove(idx);
            return true;
        }
        false
    }

    /// Retire every live entry matching `pred`
    fn retire_where(&mut self, mut pred: impl FnMut(&CacheEntry) -> bool) -> usize {
        let mut idx = 0;
        let mut count = 0;
        while idx < self.entries.len() {
            let entry = &self.entries[idx];
            if entry.retired || !pred(entry) {
                idx += 1;
                continue;
            }
            count += 1;
            // Removal swaps a new element into `idx`; look at it next round.
            if !self.retire_at(idx) {
                idx += 1;
            }
        }
        count
    }

    fn release(&mut self, id: u64) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.entries.swap_remove(idx);
            return true;
        }
        false
    }
}

/// A cache entry borrowed for painting.
///
/// Holds a reference on the entry until released, either explicitly through
/// [`BitmapCache::release`] or by dropping the guard. Releasing after the
/// entry (or the whole cache) is gone is a no-op.
pub struct CachedBitmap {
    id: u64,
    pub document: DocumentId,
    pub page: PageNo,
    pub rotation: Rotation,
    pub zoom: ZoomKey,
    pub tile: TilePosition,
    pub out_of_date: bool,
    bitmap: Option<Arc<Bitmap>>,
    owner: Weak<Mutex<Slots>>,
    released: bool,
}

impl CachedBitmap {
    /// The rendered pixels; `None` if rendering this tile failed
    #[must_use]
    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_deref()
    }

    fn release_ref(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        match self.owner.upgrade() {
            Some(slots) => slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .release(self.id),
            None => false,
        }
    }
}

impl Drop for CachedBitmap {
    fn drop(&mut self) {
        self.release_ref();
    }
}

impl std::fmt::Debug for CachedBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBitmap")
            .field("document", &self.document)
            .field("page", &self.page)
            .field("zoom", &self.zoom)
            .field("tile", &self.tile)
            .field("out_of_date", &self.out_of_date)
            .field("has_bitmap", &self.bitmap.is_some())
            .finish()
    }
}

/// Thread safe cache of rendered tiles, bounded to `capacity` entries
pub struct BitmapCache {
    slots: Arc<Mutex<Slots>>,
    capacity: usize,
}

impl BitmapCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident (findable) entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().live_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a tile. `ZoomKey::Any` matches regardless of zoom, which is how
    /// a stale bitmap is found to show while a fresh one renders. Without a
    /// tile any tile of the page matches.
    #[must_use]
    pub fn find(
        &self,
        document: DocumentId,
        page: PageNo,
        rotation: Rotation,
        zoom: ZoomKey,
        tile: Option<TilePosition>,
    ) -> Option<CachedBitmap> {
        let mut slots = self.lock();
        let entry = slots
            .entries
            .iter_mut()
            .find(|e| e.matches(document, page, rotation, zoom, tile))?;
        entry.refs += 1;
        Some(CachedBitmap {
            id: entry.id,
            document,
            page,
            rotation: entry.rotation,
            zoom: entry.zoom,
            tile: entry.tile,
            out_of_date: entry.out_of_date,
            bitmap: entry.bitmap.clone(),
            owner: Arc::downgrade(&self.slots),
            released: false,
        })
    }

    /// Give back a guard obtained from [`find`](Self::find).
    /// Returns true if this was the last reference and the entry got freed.
    pub fn release(&self, mut handle: CachedBitmap) -> bool {
        handle.release_ref()
    }

    /// Store the result of a tiled render.
    ///
    /// A resident entry with the same identity is replaced, and so is an
    /// out-of-date copy of the same tile. When the cache is full an entry is
    /// evicted, in this order of preference: a page of the same document that
    /// is not even nearby visible, then a page of another document, then a
    /// nearby page of this one that is off screen, and only when nothing else
    /// is left the oldest entry. Ties go to the oldest slot.
    ///
    /// Returns false for one-shot requests, which never enter the cache.
    pub fn insert(&self, req: &PageRenderRequest, bitmap: Option<Bitmap>) -> bool {
        let Some(tile) = req.tile() else {
            return false;
        };
        let document = req.document.id();
        let zoom = ZoomKey::Exact(req.zoom);

        let mut slots = self.lock();
        // the fresh render also replaces any out-of-date copy of the tile
        slots.retire_where(|e| {
            e.matches(document, req.page, req.rotation, zoom, Some(tile))
                || (e.zoom == ZoomKey::Any
                    && e.matches(document, req.page, req.rotation, ZoomKey::Any, Some(tile)))
        });

        if slots.live_len() >= self.capacity {
            Self::evict_one(&mut slots, &req.document);
        }

        let id = slots.next_id;
        slots.next_id += 1;
        slots.entries.push(CacheEntry {
            id,
            document: req.document.clone(),
            page: req.page,
            rotation: req.rotation,
            zoom,
            tile,
            bitmap: bitmap.map(Arc::new),
            out_of_date: false,
            refs: 1,
            retired: false,
        });
        true
    }

    fn evict_one(slots: &mut Slots, document: &DocumentHandle) {
        let view = document.view();
        let passes: [&dyn Fn(&CacheEntry) -> bool; 4] = [
            &|e: &CacheEntry| e.document == *document && !view.is_page_visible_nearby(e.page),
            &|e: &CacheEntry| e.document != *document,
            &|e: &CacheEntry| !view.is_page_visible(e.page),
            &|_: &CacheEntry| true,
        ];
        for (pass, pred) in passes.iter().enumerate() {
            let victim = slots.entries.iter().position(|e| !e.retired && pred(e));
            if let Some(idx) = victim {
                let entry = &slots.entries[idx];
                if pass == passes.len() - 1 {
                    warn!(
                        "Bitmap cache full of visible tiles, evicting page {} of {:?}",
                        entry.page,
                        entry.document.id()
                    );
                } else {
                    debug!("Evicting cached page {} (pass {})", entry.page, pass + 1);
                }
                slots.retire_at(idx);
                return;
            }
        }
    }

    /// Mark every tile of `page` overlapping `rect` (page units) as out of
    /// date. Such tiles stay paintable but no longer match their real zoom, so
    /// the next paint requests a fresh render.
    pub fn invalidate_region(&self, document: DocumentId, page: PageNo, rect: RectF) -> usize {
        let mut slots = self.lock();
        let mut count = 0;
        for entry in slots.entries.iter_mut().filter(|e| e.is_for(document, page)) {
            let zoom = match entry.zoom {
                ZoomKey::Exact(zoom) => zoom,
                ZoomKey::Any => 1.0,
            };
            let tile_rect = tile_rect_user(
                entry.document.engine(),
                page,
                entry.rotation,
                zoom,
                entry.tile,
            );
            if !tile_rect.intersect(&rect).is_empty() {
                entry.zoom = ZoomKey::Any;
                entry.out_of_date = true;
                count += 1;
            }
        }
        count
    }

    /// Drop tiles of one page. With a regular tile only that tile goes; with a
    /// wildcard from [`TilePosition::other_resolutions`] every tile at another
    /// resolution goes, except resolution 0 tiles that are still current
    /// (they serve as quick previews while zooming).
    pub fn purge_page(
        &self,
        document: DocumentId,
        page: PageNo,
        tile: Option<TilePosition>,
    ) -> usize {
        self.lock().retire_where(|e| {
            if e.document.id() != document || e.page != page {
                return false;
            }
            match tile {
                None => true,
                Some(t) if t.is_wildcard() => {
                    (e.tile.res > 0 && e.tile.res != t.res) || (e.tile.res == 0 && e.out_of_date)
                }
                Some(t) => e.tile == t,
            }
        })
    }

    /// Drop everything belonging to a document
    pub fn purge_document(&self, document: DocumentId) -> usize {
        self.lock().retire_where(|e| e.document.id() == document)
    }

    /// Drop pages that are not visible nearby, and tiles of visible pages
    /// that lie outside the viewport grown by `fuzz` times the tile size
    pub fn purge_invisible(&self, fuzz: f32) -> usize {
        self.lock().retire_where(|e| {
            let view = e.document.view();
            if !view.is_page_visible_nearby(e.page) {
                return true;
            }
            e.tile.res > 0 && !is_tile_visible(view, e.page, e.tile, fuzz)
        })
    }

    /// Drop everything
    pub fn clear(&self) -> usize {
        self.lock().retire_where(|_| true)
    }

    /// Rebind the tiles of a reloaded document to its new view. They remain
    /// paintable as out-of-date previews until re-rendered.
    pub fn keep_for_document(&self, old: DocumentId, new: &DocumentHandle) -> usize {
        let mut slots = self.lock();
        let mut count = 0;
        for entry in slots
            .entries
            .iter_mut()
            .filter(|e| !e.retired && e.document.id() == old)
        {
            entry.document = new.clone();
            entry.zoom = ZoomKey::Any;
            entry.out_of_date = true;
            count += 1;
        }
        count
    }

    /// Highest resolution level resident for a page at this rotation
    #[must_use]
    pub fn max_tile_res(&self, document: DocumentId, page: PageNo, rotation: Rotation) -> u16 {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.is_for(document, page) && e.rotation == rotation)
            .map(|e| e.tile.res)
            .max()
            .unwrap_or(0)
    }

    /// Outstanding references on the resident entry matching exactly, the
    /// cache's own included
    #[must_use]
    pub fn ref_count(
        &self,
        document: DocumentId,
        page: PageNo,
        rotation: Rotation,
        zoom: ZoomKey,
        tile: TilePosition,
    ) -> Option<u32> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.matches(document, page, rotation, zoom, Some(tile)))
            .map(|e| e.refs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::geometry::SizeI;
    use crate::test_utils::{FakeEngine, FakeView, tile_request};

    fn doc_with_pages(visible: &[PageNo]) -> (Arc<FakeView>, DocumentHandle) {
        let view = Arc::new(FakeView::new(Arc::new(FakeEngine::letter())));
        view.set_visible_pages(visible);
        let handle = DocumentHandle::new(view.clone());
        (view, handle)
    }

    fn bitmap() -> Option<Bitmap> {
        Some(Bitmap::filled(4, 4, [255, 255, 255]))
    }

    #[test]
    fn insert_then_find_pins_entry() {
        let cache = BitmapCache::new(4);
        let (_view, doc) = doc_with_pages(&[1]);
        let req = tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE);
        assert!(cache.insert(&req, bitmap()));

        let found = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Exact(1.0), None)
            .expect("cached tile");
        assert!(found.bitmap().is_some());
        let refs = cache.ref_count(
            doc.id(),
            1,
            Rotation::Deg0,
            ZoomKey::Exact(1.0),
            TilePosition::WHOLE_PAGE,
        );
        assert_eq!(refs, Some(2));

        assert!(!cache.release(found));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reinsert_keeps_identity_unique() {
        let cache = BitmapCache::new(4);
        let (_view, doc) = doc_with_pages(&[1]);
        let req = tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE);
        for _ in 0..3 {
            cache.insert(&req, bitmap());
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn replaced_entry_stays_valid_for_holder() {
        let cache = BitmapCache::new(4);
        let (_view, doc) = doc_with_pages(&[1]);
        let req = tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE);
        cache.insert(&req, bitmap());
        let held = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Exact(1.0), None)
            .expect("cached tile");

        cache.insert(&req, Some(Bitmap::filled(8, 8, [0, 0, 0])));
        assert_eq!(cache.len(), 1);
        assert_eq!(held.bitmap().map(|b| b.width_px), Some(4));

        // last reference to the retired entry frees it
        assert!(cache.release(held));
        let fresh = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Exact(1.0), None)
            .expect("fresh tile");
        assert_eq!(fresh.bitmap().map(|b| b.width_px), Some(8));
    }

    #[test]
    fn purged_entry_freed_by_last_holder() {
        let cache = BitmapCache::new(4);
        let (_view, doc) = doc_with_pages(&[1]);
        cache.insert(&tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        let held = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, None)
            .expect("cached tile");
        assert_eq!(cache.purge_document(doc.id()), 1);
        assert!(cache.is_empty());
        assert!(cache.release(held));

        let cache2 = BitmapCache::new(1);
        cache2.insert(&tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        let orphan = cache2
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, None)
            .expect("cached tile");
        drop(cache2);
        drop(orphan);
    }

    #[test]
    fn eviction_prefers_invisible_pages_of_same_document() {
        let cache = BitmapCache::new(3);
        let (view, doc) = doc_with_pages(&[1, 2, 3]);
        for page in 1..=3 {
            cache.insert(&tile_request(&doc, page, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        }
        view.set_visible_pages(&[1, 3, 4]);
        cache.insert(&tile_request(&doc, 4, 1.0, TilePosition::WHOLE_PAGE), bitmap());

        assert_eq!(cache.len(), 3);
        assert!(cache.find(doc.id(), 2, Rotation::Deg0, ZoomKey::Any, None).is_none());
        for page in [1, 3, 4] {
            assert!(cache.find(doc.id(), page, Rotation::Deg0, ZoomKey::Any, None).is_some());
        }
    }

    #[test]
    fn eviction_takes_other_document_before_visible_page() {
        let cache = BitmapCache::new(2);
        let (_va, doc_a) = doc_with_pages(&[]);
        let (_vb, doc_b) = doc_with_pages(&[1, 2]);
        cache.insert(&tile_request(&doc_b, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc_a, 7, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc_b, 2, 1.0, TilePosition::WHOLE_PAGE), bitmap());

        assert_eq!(cache.len(), 2);
        assert!(cache.find(doc_a.id(), 7, Rotation::Deg0, ZoomKey::Any, None).is_none());
        assert!(cache.find(doc_b.id(), 1, Rotation::Deg0, ZoomKey::Any, None).is_some());
    }

    #[test]
    fn eviction_keeps_nearby_pages_over_other_documents() {
        let cache = BitmapCache::new(2);
        let (_va, doc_a) = doc_with_pages(&[]);
        let (view_b, doc_b) = doc_with_pages(&[1]);
        view_b.set_nearby_pages(&[2]);
        cache.insert(&tile_request(&doc_b, 2, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc_a, 7, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc_b, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());

        assert_eq!(cache.len(), 2);
        assert!(cache.find(doc_a.id(), 7, Rotation::Deg0, ZoomKey::Any, None).is_none());
        assert!(cache.find(doc_b.id(), 2, Rotation::Deg0, ZoomKey::Any, None).is_some());
    }

    #[test]
    fn eviction_takes_offscreen_nearby_page_before_visible_one() {
        let cache = BitmapCache::new(2);
        let (view, doc) = doc_with_pages(&[1, 4]);
        view.set_nearby_pages(&[2]);
        cache.insert(&tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc, 2, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc, 4, 1.0, TilePosition::WHOLE_PAGE), bitmap());

        assert_eq!(cache.len(), 2);
        assert!(cache.find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, None).is_some());
        assert!(cache.find(doc.id(), 2, Rotation::Deg0, ZoomKey::Any, None).is_none());
    }

    #[test]
    fn rerender_replaces_out_of_date_copy() {
        let cache = BitmapCache::new(8);
        let (_view, doc) = doc_with_pages(&[1]);
        let tile = TilePosition::new(1, 0, 0);
        let everywhere = RectF::new(0.0, 0.0, 612.0, 792.0);

        cache.insert(&tile_request(&doc, 1, 2.0, tile), Some(Bitmap::filled(4, 4, [0; 3])));
        cache.invalidate_region(doc.id(), 1, everywhere);
        cache.insert(&tile_request(&doc, 1, 2.0, tile), Some(Bitmap::filled(8, 8, [0; 3])));
        assert_eq!(cache.len(), 1);
        cache.invalidate_region(doc.id(), 1, everywhere);

        assert_eq!(cache.len(), 1);
        let stale = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, Some(tile))
            .expect("stale tile");
        assert_eq!(stale.bitmap().map(|b| b.width_px), Some(8));
    }

    #[test]
    fn eviction_falls_back_to_visible_page_when_nothing_else() {
        let cache = BitmapCache::new(2);
        let (_view, doc) = doc_with_pages(&[1, 2, 3]);
        for page in 1..=3 {
            cache.insert(&tile_request(&doc, page, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, None).is_none());
    }

    #[test]
    fn invalidate_marks_only_overlapping_tiles() {
        let cache = BitmapCache::new(8);
        let (_view, doc) = doc_with_pages(&[1]);
        let top_left = TilePosition::new(1, 0, 0);
        let bottom_right = TilePosition::new(1, 1, 1);
        cache.insert(&tile_request(&doc, 1, 2.0, top_left), bitmap());
        cache.insert(&tile_request(&doc, 1, 2.0, bottom_right), bitmap());

        let touched = cache.invalidate_region(doc.id(), 1, RectF::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(touched, 1);

        let exact = ZoomKey::Exact(2.0);
        assert!(cache.find(doc.id(), 1, Rotation::Deg0, exact, Some(top_left)).is_none());
        let stale = cache
            .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, Some(top_left))
            .expect("stale tile still paintable");
        assert!(stale.out_of_date);
        assert_eq!(stale.zoom, ZoomKey::Any);
        assert!(cache.find(doc.id(), 1, Rotation::Deg0, exact, Some(bottom_right)).is_some());
    }

    #[test]
    fn wildcard_purge_keeps_current_previews() {
        let cache = BitmapCache::new(8);
        let (_view, doc) = doc_with_pages(&[1]);
        cache.insert(&tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc, 1, 4.0, TilePosition::new(1, 0, 0)), bitmap());
        cache.insert(&tile_request(&doc, 1, 8.0, TilePosition::new(2, 0, 0)), bitmap());

        let purged = cache.purge_page(doc.id(), 1, Some(TilePosition::other_resolutions(2)));
        assert_eq!(purged, 1);
        assert_eq!(cache.max_tile_res(doc.id(), 1, Rotation::Deg0), 2);
        assert!(
            cache
                .find(doc.id(), 1, Rotation::Deg0, ZoomKey::Any, Some(TilePosition::WHOLE_PAGE))
                .is_some()
        );
    }

    #[test]
    fn purge_invisible_drops_far_pages() {
        let cache = BitmapCache::new(8);
        let (view, doc) = doc_with_pages(&[1, 2]);
        view.set_viewport(SizeI::new(800, 1000));
        cache.insert(&tile_request(&doc, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        cache.insert(&tile_request(&doc, 2, 1.0, TilePosition::WHOLE_PAGE), bitmap());
        view.set_visible_pages(&[1]);

        assert_eq!(cache.purge_invisible(2.0), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keep_for_document_rebinds_as_stale() {
        let cache = BitmapCache::new(8);
        let (_old_view, old) = doc_with_pages(&[1]);
        let (_new_view, new) = doc_with_pages(&[1]);
        cache.insert(&tile_request(&old, 1, 1.0, TilePosition::WHOLE_PAGE), bitmap());

        assert_eq!(cache.keep_for_document(old.id(), &new), 1);
        assert!(cache.find(old.id(), 1, Rotation::Deg0, ZoomKey::Any, None).is_none());
        assert!(cache.find(new.id(), 1, Rotation::Deg0, ZoomKey::Exact(1.0), None).is_none());
        let stale = cache
            .find(new.id(), 1, Rotation::Deg0, ZoomKey::Any, None)
            .expect("rebound tile");
        assert!(stale.out_of_date);
    }
}
