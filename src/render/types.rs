//! Core value types for page rendering

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use super::geometry::SizeI;

/// Page number as used by the document engine
pub type PageNo = usize;

/// Identity of an open document view.
///
/// Cache entries and requests are matched on this id rather than on the view
/// object, so a handle that outlives its document never aliases a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl DocumentId {
    /// Allocate a process-unique id
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Page rotation, always one of the four right angles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize an arbitrary angle in degrees, snapping to the closest lower right angle
    #[must_use]
    pub fn normalize(degrees: i32) -> Self {
        match degrees.rem_euclid(360) / 90 {
            1 => Self::Deg90,
            2 => Self::Deg180,
            3 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    #[must_use]
    pub const fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Zoom a bitmap was rendered at, or the wildcard used for stale lookups
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoomKey {
    /// Exact real zoom factor (1.0 = 100%)
    Exact(f32),
    /// Matches any zoom on lookup; stored on entries that must be re-rendered
    Any,
}

impl ZoomKey {
    /// Whether an entry stored with `stored` satisfies a lookup for `self`
    #[must_use]
    pub fn matches(self, stored: ZoomKey) -> bool {
        match self {
            ZoomKey::Any => true,
            ZoomKey::Exact(_) => self == stored,
        }
    }
}

impl From<f32> for ZoomKey {
    fn from(zoom: f32) -> Self {
        ZoomKey::Exact(zoom)
    }
}

/// How the view chose its zoom
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ZoomMode {
    /// The whole page fits into the viewport
    FitPage,
    /// The page width fits into the viewport
    FitWidth,
    /// The page content fits into the viewport
    FitContent,
    /// An explicit zoom factor chosen by the user
    #[default]
    Explicit,
}

impl ZoomMode {
    /// Fit modes expect one large legible page, which favours larger tiles
    #[must_use]
    pub const fn prefers_large_tiles(self) -> bool {
        matches!(self, Self::FitPage | Self::FitWidth)
    }
}

/// Rasterized tile or page.
///
/// Contains RGB pixel data (3 bytes per pixel) as produced by the document
/// engine.
#[derive(Clone)]
pub struct Bitmap {
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width_px: u32,
    /// Height in pixels
    pub height_px: u32,
}

impl Bitmap {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Solid color bitmap
    #[must_use]
    pub fn filled(width_px: u32, height_px: u32, rgb: [u8; 3]) -> Self {
        let count = width_px as usize * height_px as usize;
        let mut pixels = Vec::with_capacity(count * Self::BYTES_PER_PIXEL);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels,
            width_px,
            height_px,
        }
    }

    #[must_use]
    pub fn size(&self) -> SizeI {
        SizeI::new(self.width_px as i32, self.height_px as i32)
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Outcome of painting a page or a tile.
///
/// Ordered so that taking the minimum over several tiles yields the overall
/// page state: anything painted up to date beats anything still rendering,
/// which beats a failed render, which beats a tile nobody asked for yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderDelay {
    /// Fully up to date
    Ready,
    /// Still rendering; time since the request was first queued
    Pending(Duration),
    /// The engine could not rasterize the page
    Failed,
    /// No bitmap and no request known
    Undefined,
}

impl RenderDelay {
    const fn rank(&self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Pending(_) => 1,
            Self::Failed => 2,
            Self::Undefined => 3,
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl Ord for RenderDelay {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Pending(a), Self::Pending(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RenderDelay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
