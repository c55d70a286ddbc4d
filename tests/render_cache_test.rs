use std::sync::{Arc, Mutex};
use std::time::Duration;

use pagerender::render::{
    Enqueued, RectF, RenderCache, RenderCallback, RenderEvent, Rotation, TilePosition, ZoomKey,
};
use pagerender::settings::RenderSettings;
use pagerender::test_utils::FakeDocument;

const WAIT: Duration = Duration::from_secs(5);

fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl Fn() -> RenderCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let make = move || {
        let sink = sink.clone();
        RenderCallback::new(move |bmp| sink.lock().unwrap().push(bmp.is_some()))
    };
    (seen, make)
}

fn wait_for_repaint(cache: &RenderCache) -> RenderEvent {
    cache.events().recv_timeout(WAIT).expect("worker finished a tile")
}

#[test]
fn test_zoom_change_coalesces_queued_request() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1, 2]);
    doc.engine.close_gate();

    // keep the worker busy with page 2
    cache.request_rendering(&doc.handle, 2);
    assert_eq!(doc.engine.wait_started(WAIT), Some(2));

    cache.request_rendering(&doc.handle, 1);
    doc.view.set_zoom(1.5);
    let outcome = cache.request_tile(&doc.handle, 1, TilePosition::WHOLE_PAGE);
    assert_eq!(outcome, Some(Enqueued::Coalesced));
    assert_eq!(cache.queue().len(), 1);

    doc.engine.open_gate();
    while cache.bitmaps().len() < 2 {
        wait_for_repaint(&cache);
    }
    let id = doc.handle.id();
    assert!(
        cache
            .bitmaps()
            .find(id, 1, Rotation::Deg0, ZoomKey::Exact(1.5), None)
            .is_some()
    );
    assert!(
        cache
            .bitmaps()
            .find(id, 1, Rotation::Deg0, ZoomKey::Exact(1.0), None)
            .is_none()
    );
    let page_one_renders = doc
        .engine
        .rendered()
        .iter()
        .filter(|args| args.page == 1)
        .count();
    assert_eq!(page_one_renders, 1);
}

#[test]
fn test_request_rendering_splits_first_row_at_res_one() {
    let settings = RenderSettings {
        max_tile_size: pagerender::settings::TileSize {
            width: 1000,
            height: 1000,
        },
        ..RenderSettings::default()
    };
    let cache = RenderCache::new(&settings).unwrap();
    let doc = FakeDocument::letter(&[1, 2]);
    doc.view.set_zoom(2.0);
    assert_eq!(cache.tile_res(&doc.handle, 1), 1);

    // keep the worker busy with page 2
    doc.engine.close_gate();
    cache.request_tile(&doc.handle, 2, TilePosition::new(1, 0, 0));
    assert_eq!(doc.engine.wait_started(WAIT), Some(2));

    cache.request_rendering(&doc.handle, 1);
    assert_eq!(cache.queue().len(), 2);

    doc.engine.open_gate();
    assert!(doc.engine.wait_for_calls(3, WAIT));
    // most recent first: the top-right tile renders before the top-left one
    let rects: Vec<_> = doc
        .engine
        .rendered()
        .iter()
        .filter(|args| args.page == 1)
        .filter_map(|args| args.page_rect)
        .collect();
    assert_eq!(
        rects,
        vec![
            RectF::new(306.0, 0.0, 306.0, 396.0),
            RectF::new(0.0, 0.0, 306.0, 396.0),
        ]
    );
}

#[test]
fn test_request_rendering_ignores_finely_tiled_pages() {
    let settings = RenderSettings {
        max_tile_size: pagerender::settings::TileSize {
            width: 500,
            height: 500,
        },
        ..RenderSettings::default()
    };
    let cache = RenderCache::new(&settings).unwrap();
    let doc = FakeDocument::letter(&[1]);
    doc.view.set_zoom(4.0);
    assert!(cache.tile_res(&doc.handle, 1) > 1);

    cache.request_rendering(&doc.handle, 1);
    assert!(cache.queue().is_empty());
    assert!(cache.queue().current().is_none());
}

#[test]
fn test_cancel_rendering_waits_for_in_flight_render() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1, 2]);
    doc.engine.close_gate();

    cache.request_rendering(&doc.handle, 1);
    doc.engine.wait_started(WAIT).expect("render started");
    cache.request_rendering(&doc.handle, 2);

    cache.cancel_rendering(&doc.handle);
    assert!(cache.queue().is_empty());
    assert!(cache.queue().current().is_none());

    doc.engine.open_gate();
    std::thread::sleep(Duration::from_millis(50));
    assert!(cache.bitmaps().is_empty());
    assert_eq!(doc.engine.render_calls(), 1);
}

#[test]
fn test_one_shot_callback_fires_exactly_once() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    let (tx, rx) = flume::unbounded();

    let queued = cache.render(
        &doc.handle,
        1,
        Rotation::Deg0,
        0.5,
        RectF::new(0.0, 0.0, 100.0, 100.0),
        RenderCallback::new(move |bmp| {
            let _ = tx.send(bmp.map(|b| (b.width_px, b.height_px)));
        }),
    );
    assert!(queued);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some((50, 50)));
    // the sender moved into the callback is gone once it ran
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert!(cache.bitmaps().is_empty());
}

#[test]
fn test_one_shot_gets_none_when_cancelled() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    let (seen, callback) = recorder();
    doc.engine.close_gate();

    let rect = RectF::new(0.0, 0.0, 612.0, 792.0);
    cache.render(&doc.handle, 1, Rotation::Deg0, 1.0, rect, callback());
    doc.engine.wait_started(WAIT).expect("render started");
    cache.render(&doc.handle, 1, Rotation::Deg0, 1.0, rect, callback());

    cache.cancel_rendering(&doc.handle);
    assert_eq!(*seen.lock().unwrap(), vec![false, false]);
}

#[test]
fn test_suspended_view_refuses_requests() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    let (seen, callback) = recorder();
    doc.view.set_suspended(true);

    assert_eq!(
        cache.request_tile(&doc.handle, 1, TilePosition::WHOLE_PAGE),
        None
    );
    let rect = RectF::new(0.0, 0.0, 10.0, 10.0);
    assert!(!cache.render(&doc.handle, 1, Rotation::Deg0, 1.0, rect, callback()));
    assert_eq!(*seen.lock().unwrap(), vec![false]);
    assert!(cache.queue().is_empty());
}

#[test]
fn test_invalidate_aborts_render_of_that_page() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    doc.engine.close_gate();

    cache.request_rendering(&doc.handle, 1);
    doc.engine.wait_started(WAIT).expect("render started");
    let in_flight = cache.queue().current().expect("in flight");

    cache.invalidate(&doc.handle, 1, RectF::new(0.0, 0.0, 50.0, 50.0));
    assert!(in_flight.cancel.is_cancelled());
    doc.engine.open_gate();
}

#[test]
fn test_rerequest_after_invalidate_renders_again() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    let tile = TilePosition::WHOLE_PAGE;
    doc.engine.close_gate();

    cache.request_tile(&doc.handle, 1, tile);
    doc.engine.wait_started(WAIT).expect("render started");
    cache.invalidate(&doc.handle, 1, RectF::new(0.0, 0.0, 50.0, 50.0));
    assert_eq!(cache.request_tile(&doc.handle, 1, tile), Some(Enqueued::Queued));
    assert_eq!(cache.queue().len(), 1);

    doc.engine.open_gate();
    assert_eq!(
        wait_for_repaint(&cache),
        RenderEvent::Repaint {
            document: doc.handle.id(),
            page: 1
        }
    );
    assert!(
        cache
            .bitmaps()
            .find(doc.handle.id(), 1, Rotation::Deg0, ZoomKey::Exact(1.0), Some(tile))
            .is_some()
    );
    assert_eq!(doc.engine.render_calls(), 2);
}

#[test]
fn test_invisible_pages_are_not_queued() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1]);
    assert_eq!(
        cache.request_tile(&doc.handle, 7, TilePosition::WHOLE_PAGE),
        None
    );
    doc.view.set_nearby_pages(&[2]);
    assert!(
        cache
            .request_tile(&doc.handle, 2, TilePosition::WHOLE_PAGE)
            .is_some()
    );
}

#[test]
fn test_render_delay_tracks_queued_request() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let doc = FakeDocument::letter(&[1, 2]);
    let tile = TilePosition::WHOLE_PAGE;
    assert_eq!(
        cache.get_render_delay(&doc.handle, 1, tile),
        pagerender::render::RenderDelay::Undefined
    );

    doc.engine.close_gate();
    cache.request_rendering(&doc.handle, 1);
    doc.engine.wait_started(WAIT).expect("render started");
    assert!(matches!(
        cache.get_render_delay(&doc.handle, 1, tile),
        pagerender::render::RenderDelay::Pending(_)
    ));
    doc.engine.open_gate();
    wait_for_repaint(&cache);
}

#[test]
fn test_document_reload_keeps_bitmaps_as_previews() {
    let cache = RenderCache::new(&RenderSettings::default()).unwrap();
    let old = FakeDocument::letter(&[1]);
    cache.request_rendering(&old.handle, 1);
    wait_for_repaint(&cache);

    let new = FakeDocument::letter(&[1]);
    assert_eq!(cache.keep_for_document(old.handle.id(), &new.handle), 1);
    let preview = cache
        .bitmaps()
        .find(new.handle.id(), 1, Rotation::Deg0, ZoomKey::Any, None)
        .expect("preview");
    assert!(preview.out_of_date);
    drop(preview);

    assert_eq!(cache.free_for_document(new.handle.id()), 1);
    assert!(cache.bitmaps().is_empty());
}

#[test]
fn test_drop_notifies_pending_one_shots() {
    let doc = FakeDocument::letter(&[1]);
    let (seen, callback) = recorder();
    {
        let cache = RenderCache::new(&RenderSettings::default()).unwrap();
        doc.engine.close_gate();
        let rect = RectF::new(0.0, 0.0, 10.0, 10.0);
        cache.render(&doc.handle, 1, Rotation::Deg0, 1.0, rect, callback());
        doc.engine.wait_started(WAIT).expect("render started");
        cache.render(&doc.handle, 1, Rotation::Deg0, 1.0, rect, callback());
    }
    assert_eq!(*seen.lock().unwrap(), vec![false, false]);
}
