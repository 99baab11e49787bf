//! The per-layer facade a map UI talks to.

use crate::animation::{AnimationDriver, AnimationPhase};
use crate::context::LoopContext;
use crate::core::viewport::Viewport;
use crate::events::{self, EventQueue, EventSender, OverlayEvent};
use crate::tiles::addressing::loop_zoom;
use crate::tiles::progress::FetchProgress;
use crate::tiles::renderer::FrameRenderer;
use crate::tiles::scheduler::{FetchRequest, FetchScheduler, FetchSummary};
use crate::tiles::source::{LayerSource, LayerSpec};
use crate::time::{poll_once, AxisListener, SharedAxis, TimeAxis, ValidTimesPoller};
use crate::Result;
use chrono::NaiveDateTime;
use image::RgbaImage;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One animated weather layer over a map.
///
/// Owns the valid-times poller, the fetch scheduler, the animation driver
/// and the tile renderer of a single [`LayerSpec`]. Everything that happens
/// in the background is reported as an [`OverlayEvent`]; drain them with
/// [`LoopOverlay::try_recv_events`].
///
/// All methods that start work must be called inside a tokio runtime.
pub struct LoopOverlay {
    ctx: LoopContext,
    source: Arc<LayerSource>,
    axis: Arc<SharedAxis>,
    scheduler: Arc<FetchScheduler>,
    driver: Arc<AnimationDriver>,
    renderer: FrameRenderer,
    poller: Mutex<ValidTimesPoller>,
    events: EventSender,
    queue: EventQueue,
}

impl LoopOverlay {
    pub fn new(ctx: LoopContext, layer: LayerSpec) -> Self {
        let (events, queue) = events::channel();
        let source = Arc::new(LayerSource::new(ctx.base_url(), layer));
        let axis = Arc::new(SharedAxis::new());
        let scheduler = Arc::new(FetchScheduler::new(ctx.clone(), source.clone()));
        let driver = Arc::new(AnimationDriver::new(
            ctx.clone(),
            axis.clone(),
            scheduler.clone(),
            events.clone(),
        ));

        let frame_driver = driver.clone();
        let renderer = FrameRenderer::new(
            source.clone(),
            scheduler.loader().clone(),
            events.clone(),
            Arc::new(move || Some(frame_driver.current_timestamp())),
            ctx.config().placeholder_alpha,
        );

        let poller = ValidTimesPoller::new(ctx.clone(), source.clone(), axis.clone(), events.clone())
            .with_listener(axis_listener(&driver));

        Self {
            ctx,
            source,
            axis,
            scheduler,
            driver,
            renderer,
            poller: Mutex::new(poller),
            events,
            queue,
        }
    }

    pub fn layer(&self) -> &LayerSpec {
        self.source.layer()
    }

    pub fn context(&self) -> &LoopContext {
        &self.ctx
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    // Valid times

    /// Polls the valid times once. Returns whether the loop times changed.
    pub async fn query_times(&self) -> Result<bool> {
        let listener = axis_listener(&self.driver);
        poll_once(&self.ctx, &self.source, &self.axis, &self.events, Some(&listener)).await
    }

    /// Re-polls the valid times every `poll_interval`
    pub fn start_updating(&self, immediately: bool) {
        if let Ok(mut poller) = self.poller.lock() {
            poller.start(immediately);
        }
    }

    pub fn stop_updating(&self) {
        if let Ok(mut poller) = self.poller.lock() {
            poller.stop();
        }
    }

    pub fn is_updating(&self) -> bool {
        self.poller.lock().map(|p| p.is_running()).unwrap_or(false)
    }

    pub fn time_axis(&self) -> Arc<TimeAxis> {
        self.axis.load()
    }

    /// Newest base time of the axis
    pub fn latest_date(&self) -> Option<NaiveDateTime> {
        self.axis.load().latest_date()
    }

    // Fetching

    /// Downloads and composites every frame of the viewport at the loop zoom
    pub fn fetch_frames_for_animation<F>(&self, viewport: Viewport, zoom: u8, on_ready: F) -> Arc<FetchProgress>
    where
        F: FnOnce(FetchSummary) + Send + 'static,
    {
        let zoom = loop_zoom(zoom, self.ctx.config().loop_zoom_offset);
        self.fetch(viewport, zoom, true, on_ready)
    }

    /// Downloads every tile of every frame at `zoom` for the tile renderer,
    /// without compositing
    pub fn fetch_tiles_for_animation<F>(&self, viewport: Viewport, zoom: u8, on_ready: F) -> Arc<FetchProgress>
    where
        F: FnOnce(FetchSummary) + Send + 'static,
    {
        self.fetch(viewport, zoom, false, on_ready)
    }

    /// Aborts the fetch in flight and every tile the renderer requested
    pub fn cancel_loading(&self) {
        self.scheduler.cancel();
        self.renderer.cancel_requests();
    }

    pub fn progress(&self) -> Option<Arc<FetchProgress>> {
        self.scheduler.progress()
    }

    pub fn is_loading(&self) -> bool {
        self.scheduler.is_loading()
    }

    /// Composited image of the displayed frame, if it was rendered
    pub fn frame_image(&self) -> Option<Arc<RgbaImage>> {
        self.scheduler.frame(&self.driver.current_timestamp())
    }

    // Animation

    /// Fetches and composites every frame, then starts playing
    pub fn begin_loop(&self, viewport: Viewport, zoom: u8) -> Arc<FetchProgress> {
        self.driver.begin_loop(viewport, zoom)
    }

    /// [`begin_loop`](Self::begin_loop) at the zoom the renderer last drew
    pub fn begin_loop_at_current_zoom(&self, viewport: Viewport) -> Arc<FetchProgress> {
        self.begin_loop(viewport, self.renderer.zoom_level())
    }

    pub fn start_animating(&self) {
        self.driver.start_animating();
    }

    pub fn stop_animating(&self, jump_to_last: bool) {
        self.driver.stop_animating(jump_to_last);
        self.update_image(None);
    }

    pub fn pause_for_move(&self) {
        self.driver.pause_for_move();
    }

    pub fn unpause_for_move<F: FnOnce()>(&self, restart: F) -> bool {
        self.driver.unpause_for_move(restart)
    }

    pub fn is_animating(&self) -> bool {
        self.driver.is_animating()
    }

    pub fn phase(&self) -> AnimationPhase {
        self.driver.phase()
    }

    /// Key of the displayed frame, empty before the first poll
    pub fn frame_timestamp(&self) -> String {
        self.driver.current_timestamp()
    }

    pub fn frame_date(&self) -> Option<NaiveDateTime> {
        self.driver.frame_date()
    }

    // Map interaction

    /// The map started moving: suspend playback and show live tiles
    pub fn region_will_change(&self) {
        self.pause_for_move();
        self.renderer.set_hidden(false);
    }

    /// The map stopped moving: `restart` runs if playback was suspended
    pub fn region_did_change<F: FnOnce()>(&self, restart: F) -> bool {
        self.unpause_for_move(restart)
    }

    /// The layer or its times changed underneath a running loop
    pub fn overlay_updated<F: FnOnce()>(&self, restart: F) -> bool {
        self.region_will_change();
        self.region_did_change(restart)
    }

    /// Tiles are hidden while a composited frame covers them
    pub fn update_image(&self, image: Option<&Arc<RgbaImage>>) {
        self.renderer.set_hidden(image.is_some());
    }

    pub fn alpha(&self) -> f32 {
        self.renderer.alpha()
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.renderer.set_alpha(alpha);
    }

    pub fn is_visible(&self) -> bool {
        !self.renderer.is_hidden()
    }

    // Events

    pub fn try_recv_events(&self) -> Vec<OverlayEvent> {
        self.queue.try_recv_events()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<OverlayEvent> {
        self.queue.recv_timeout(timeout)
    }

    pub fn has_pending_events(&self) -> bool {
        self.queue.has_pending_events()
    }

    /// Stops polling, loading and playback
    pub fn detach(&self) {
        self.stop_updating();
        self.driver.detach();
        self.renderer.cancel_requests();
        log::debug!("overlay {} detached", self.source.layer().name);
    }

    fn fetch<F>(&self, viewport: Viewport, zoom: u8, composite: bool, on_ready: F) -> Arc<FetchProgress>
    where
        F: FnOnce(FetchSummary) + Send + 'static,
    {
        let request = FetchRequest {
            viewport,
            zoom,
            frame_keys: self.axis.load().keys(),
            composite,
        };
        let events = self.events.clone();
        self.scheduler.fetch(
            request,
            Box::new(move |summary| {
                events.send(OverlayEvent::FramesReady {
                    frame_count: summary.frames,
                });
                on_ready(summary);
            }),
        )
    }
}

impl Drop for LoopOverlay {
    fn drop(&mut self) {
        self.detach();
    }
}

fn axis_listener(driver: &Arc<AnimationDriver>) -> AxisListener {
    let driver = Arc::downgrade(driver);
    Arc::new(move |_changed| {
        if let Some(driver) = driver.upgrade() {
            driver.axis_changed();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileCoord;
    use crate::core::viewport::MapRect;
    use crate::net::{ApiKeyCredentials, HttpRequest, HttpResponse};
    use crate::traits::HttpClient;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Server {
        tile_delay: Duration,
    }

    #[async_trait]
    impl HttpClient for Server {
        async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
            if request.url.contains("valid_frames") {
                let body = r#"{"radar": ["2024-05-01T00:00:00", "2024-05-01T00:10:00", "2024-05-01T00:20:00"]}"#;
                return Ok(HttpResponse::new(200, body.as_bytes().to_vec()));
            }
            if !self.tile_delay.is_zero() {
                tokio::time::sleep(self.tile_delay).await;
            }
            let mut bytes = Vec::new();
            RgbaImage::from_pixel(256, 256, image::Rgba([0, 255, 0, 128]))
                .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
                .unwrap();
            Ok(HttpResponse::new(200, bytes))
        }
    }

    fn overlay() -> LoopOverlay {
        overlay_with_delay(Duration::ZERO)
    }

    fn overlay_with_delay(tile_delay: Duration) -> LoopOverlay {
        let ctx = LoopContext::builder()
            .credentials(ApiKeyCredentials::new("id", "key"))
            .http_client(Arc::new(Server { tile_delay }))
            .build()
            .unwrap();
        LoopOverlay::new(ctx, LayerSpec::single("radar"))
    }

    #[tokio::test]
    async fn test_query_times_shows_latest_frame() {
        let overlay = overlay();
        assert_eq!(overlay.frame_timestamp(), "");

        assert!(overlay.query_times().await.unwrap());
        assert_eq!(overlay.frame_timestamp(), "2024-05-01T00:20:00");
        assert_eq!(overlay.frame_date(), overlay.latest_date());
        assert!(!overlay.query_times().await.unwrap());

        let events = overlay.try_recv_events();
        assert!(matches!(events[0], OverlayEvent::TimesUpdated { changed: true }));
        assert!(matches!(events[1], OverlayEvent::TimesUpdated { changed: false }));
    }

    #[tokio::test]
    async fn test_fetch_frames_composites_each_frame() {
        let overlay = overlay();
        overlay.query_times().await.unwrap();
        let span = TileCoord::map_span(6);
        let viewport = MapRect::new(span * 10.5, span * 20.5, span, span);

        let (tx, rx) = tokio::sync::oneshot::channel();
        let progress = overlay.fetch_frames_for_animation(viewport, 6, move |summary| {
            let _ = tx.send(summary);
        });
        let summary = rx.await.unwrap();

        assert_eq!(progress.total(), 13);
        assert_eq!(summary.composited, 3);
        assert_eq!(overlay.frame_image().unwrap().dimensions(), (256, 256));
    }

    #[tokio::test]
    async fn test_region_change_restarts_only_running_loop() {
        let overlay = overlay();
        overlay.query_times().await.unwrap();

        overlay.region_will_change();
        assert!(!overlay.region_did_change(|| panic!("idle overlay restarted")));

        overlay.start_animating();
        overlay.update_image(None);
        let mut restarted = false;
        assert!(overlay.overlay_updated(|| restarted = true));
        assert!(restarted);
        assert!(overlay.is_visible());
    }

    #[tokio::test]
    async fn test_alpha_is_clamped() {
        let overlay = overlay();
        overlay.set_alpha(1.5);
        assert_eq!(overlay.alpha(), 1.0);
        overlay.set_alpha(0.25);
        assert_eq!(overlay.alpha(), 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_silences_renderer_downloads() {
        let overlay = overlay_with_delay(Duration::from_secs(2));
        overlay.query_times().await.unwrap();
        let _ = overlay.try_recv_events();

        // One zoom-4 tile drawn at zoom 5 requests four tiles
        let span = TileCoord::map_span(4);
        let rect = MapRect::new(span * 3.0, span * 5.0, span, span);
        assert!(!overlay.renderer().can_draw(&rect, 2f64.powi(5 - 20), 1.0));
        tokio::task::yield_now().await;
        assert_eq!(overlay.renderer().pending_requests(), 4);

        overlay.detach();
        assert_eq!(overlay.renderer().pending_requests(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(overlay.try_recv_events().is_empty());
        assert!(overlay.context().cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_loading_drops_renderer_requests() {
        let overlay = overlay_with_delay(Duration::from_secs(2));
        overlay.query_times().await.unwrap();
        let _ = overlay.try_recv_events();

        let span = TileCoord::map_span(4);
        let rect = MapRect::new(span * 3.0, span * 5.0, span, span);
        overlay.renderer().can_draw(&rect, 2f64.powi(5 - 20), 1.0);
        tokio::task::yield_now().await;

        overlay.cancel_loading();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(overlay.renderer().pending_requests(), 0);
        assert!(overlay.try_recv_events().is_empty());
    }
}
