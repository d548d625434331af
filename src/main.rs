//! Headless replay of a viewer session.
//!
//! Registers a synthetic feed, then drives open, pinch, double tap, a page
//! swipe and a drag-to-dismiss through the engine at 60 frames per second,
//! logging the frames it produces. `RUST_LOG=lightbox=trace` shows every
//! state change.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use lightbox::gesture::{PointerEvent, PointerPhase};
use lightbox::layout::{ScreenRect, Viewport};
use lightbox::models::{FnHandle, ViewHandle};
use lightbox::pager::PreloadCommand;
use lightbox::viewer::{ChannelNavigator, NavigationEvent, PageScrollState, PointerOutcome};
use lightbox::{EntryRegistry, MediaEntry, MediaType, MediaViewer, OpenRequest, ViewerConfig};

const FRAME: Duration = Duration::from_millis(16);
const GROUP: &str = "replay";
const FEED: [(&str, f64, f64); 5] = [
    ("file:///feed/harbor.jpg", 1200.0, 800.0),
    ("file:///feed/portrait.jpg", 800.0, 1200.0),
    ("file:///feed/square.png", 1000.0, 1000.0),
    ("file:///feed/clip.mp4", 1920.0, 1080.0),
    ("file:///feed/panorama.jpg", 3000.0, 1000.0),
];

struct Replay {
    viewer: MediaViewer<ChannelNavigator>,
    /// Pointer clock.
    now: Duration,
}

impl Replay {
    async fn send(&mut self, id: u64, phase: PointerPhase, x: f64, y: f64) -> PointerOutcome {
        let event = PointerEvent::new(id, phase, x, y, self.now);
        self.viewer.handle_pointer(event).await
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Runs frames until nothing animates, then logs the final frame.
    async fn settle(&mut self, label: &str) {
        let mut interval = tokio::time::interval(FRAME);
        let mut frames = 0;
        let last = loop {
            interval.tick().await;
            self.now += FRAME;
            let frame = self.viewer.tick(FRAME);
            self.feed_decoder();
            frames += 1;
            if !self.viewer.transform().is_animating() || frames >= 240 {
                break frame;
            }
        };

        match &last {
            Some(frame) => info!(
                label,
                frames,
                phase = ?frame.phase,
                focused = frame.focused_index,
                scale = frame.transform.scale_x,
                translate_x = frame.transform.translate_x,
                translate_y = frame.transform.translate_y,
                backdrop = frame.transform.backdrop_opacity,
                chrome = frame.chrome_visible,
                items = frame.items.len(),
                "Settled"
            ),
            None => info!(label, frames, "Viewer closed"),
        }

        let videos = last.iter().flat_map(|frame| &frame.items);
        for (item, phase) in videos.filter_map(|item| item.video_phase.map(|phase| (item, phase))) {
            debug!(
                uri = %item.uri,
                ?phase,
                preview = phase.shows_preview(),
                video = phase.shows_video(),
                play_button = phase.shows_play_button(),
                spinner = phase.shows_spinner(),
                "Video layers"
            );
        }
    }

    /// Stands in for the platform decoder: every load completes at once.
    fn feed_decoder(&mut self) {
        let commands: Vec<PreloadCommand> = self.viewer.preload_commands().try_iter().collect();
        for command in commands {
            match command {
                PreloadCommand::Load { uri, .. } => {
                    if let Some((_, width, height)) = FEED.iter().find(|(u, _, _)| *u == uri) {
                        self.viewer.on_media_loaded(&uri, *width, *height);
                    }
                }
                PreloadCommand::Release { uri } => debug!(%uri, "Decoder released"),
            }
        }
    }

    async fn pinch(&mut self, from: f64, to: f64) {
        let (cx, cy) = (200.0, 420.0);
        self.send(1, PointerPhase::Down, cx - from, cy).await;
        self.send(2, PointerPhase::Down, cx + from, cy).await;
        for step in 1..=10 {
            self.advance(FRAME);
            let half = from + (to - from) * f64::from(step) / 10.0;
            self.send(1, PointerPhase::Move, cx - half, cy).await;
            self.send(2, PointerPhase::Move, cx + half, cy).await;
        }
        self.send(2, PointerPhase::Up, cx + to, cy).await;
        self.send(1, PointerPhase::Up, cx - to, cy).await;
    }

    async fn tap(&mut self, x: f64, y: f64) {
        self.send(1, PointerPhase::Down, x, y).await;
        self.advance(Duration::from_millis(60));
        self.send(1, PointerPhase::Up, x, y).await;
        self.advance(Duration::from_millis(80));
    }

    /// One-finger drag. Returns whether the pager took it and whether it
    /// dismissed the viewer.
    async fn drag(&mut self, dx: f64, dy: f64) -> (bool, bool) {
        let (x, y) = (200.0, 400.0);
        let mut deferred = false;
        self.send(1, PointerPhase::Down, x, y).await;
        for step in 1..=8 {
            self.advance(FRAME);
            let t = f64::from(step) / 8.0;
            let outcome = self.send(1, PointerPhase::Move, x + dx * t, y + dy * t).await;
            deferred |= outcome.defer_to_pager;
        }
        let outcome = self.send(1, PointerPhase::Up, x + dx, y + dy).await;
        (deferred, outcome.dismissed)
    }
}

fn register_feed(registry: &EntryRegistry) -> Vec<Arc<dyn ViewHandle>> {
    let mut handles = Vec::new();
    for (index, (uri, _, _)) in FEED.iter().enumerate() {
        let media_type = MediaType::from_uri(uri).unwrap_or_else(|| MediaType::image("jpeg"));
        let name = uri.rsplit('/').next().unwrap_or(*uri);
        let mut entry = MediaEntry::new(GROUP, uri, media_type)
            .with_id(&format!("{GROUP}-{index}"))
            .with_index(index as i64);
        if entry.is_video() {
            entry = entry.with_preview(&format!("file:///feed/thumbs/{name}.jpg"));
        }

        // Three-column grid of 120pt thumbnails.
        let column = (index % 3) as f64;
        let row = (index / 3) as f64;
        let rect = ScreenRect::new(10.0 + column * 130.0, 120.0 + row * 130.0, 120.0, 120.0);
        let handle: Arc<dyn ViewHandle> = Arc::new(FnHandle(move || Some(rect)));
        registry.register(entry, Some(&handle));
        handles.push(handle);
    }
    handles
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lightbox=info".parse()?),
        )
        .init();

    let config = ViewerConfig::from_env().context("Failed to load viewer configuration")?;
    let registry = EntryRegistry::global();
    let _handles = register_feed(&registry);

    let (nav, nav_rx) = ChannelNavigator::new();
    let nav_task = tokio::spawn(async move {
        while let Ok(event) = nav_rx.recv().await {
            match event {
                NavigationEvent::UpdateParams(params) => info!(
                    uri = %params.uri,
                    aspect_ratio = params.aspect_ratio,
                    source = ?params.source_rect,
                    "Navigation params"
                ),
                NavigationEvent::Close => {
                    info!("Navigation close");
                    break;
                }
            }
        }
    });

    let viewport = Viewport::new(400.0, 800.0).with_insets(44.0, 34.0);
    let mut replay = Replay {
        viewer: MediaViewer::new(config, registry, viewport, nav),
        now: Duration::ZERO,
    };

    let index = replay
        .viewer
        .open_viewer(OpenRequest::new(GROUP, FEED[1].0))
        .await?;
    info!(index, "Opened");
    replay.settle("open").await;

    replay.pinch(40.0, 100.0).await;
    replay.settle("pinch").await;

    replay.tap(200.0, 420.0).await;
    replay.tap(200.0, 420.0).await;
    replay.settle("double tap").await;

    let (deferred, _) = replay.drag(-220.0, 10.0).await;
    if deferred {
        replay.viewer.on_page_scroll_state(PageScrollState::Dragging);
        replay.viewer.on_page_scroll(0.5);
        replay.viewer.on_page_scroll_state(PageScrollState::Settling);
        replay.viewer.on_page_selected(index + 1).await;
        replay.viewer.on_page_scroll(0.0);
        replay.viewer.on_page_scroll_state(PageScrollState::Idle);
    }
    replay.settle("swipe").await;

    replay.tap(300.0, 300.0).await;
    replay.settle("tap").await;

    let (_, dismissed) = replay.drag(0.0, 260.0).await;
    if !dismissed {
        replay.viewer.close_viewer().await?;
    }
    replay.settle("dismiss").await;

    drop(replay);
    nav_task.await?;
    Ok(())
}
