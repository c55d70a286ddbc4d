//! Tiled page rendering with a bitmap cache and a background render worker

pub mod cache;
pub mod cancel;
pub mod engine;
pub mod geometry;
pub mod painter;
pub mod queue;
pub mod request;
pub mod service;
pub mod surface;
pub mod tile;
pub mod types;
pub mod worker;

/// Default number of bitmaps kept in the cache
pub const MAX_BITMAPS_CACHED: usize = 64;
/// Default number of requests waiting for the render worker
pub const MAX_PAGE_REQUESTS: usize = 8;

pub use cache::{BitmapCache, CachedBitmap};
pub use cancel::CancelToken;
pub use engine::{DocumentEngine, DocumentHandle, DocumentView, RenderArgs};
pub use geometry::{RectF, RectI, SizeI};
pub use painter::PaintOutcome;
pub use queue::{Enqueued, RenderQueue};
pub use request::{RenderCallback, RenderEvent};
pub use service::{RenderCache, RenderError};
pub use surface::{ImageTarget, PaintTarget, SurfaceError};
pub use tile::{MAX_TILE_RES, TilePosition};
pub use types::*;
