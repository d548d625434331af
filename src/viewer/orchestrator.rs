//! One viewer session over a group of media entries.
//!
//! `MediaViewer` ties the pieces together:
//! - resolves the group list and the focused index from the entry registry
//! - measures thumbnails and starts the mount/unmount transitions
//! - routes pointer input to the transform machine of the focused item
//! - keeps preloading, playback and navigation params in step with paging
//!
//! Measurement is the only suspension point. Every method takes `&mut self`,
//! so calls are applied strictly in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flume::Receiver;
use tracing::{debug, info, trace, warn};

use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::gesture::{
    Frame, GestureEvent, Phase, PointerEvent, PointerRecognizer, Recognized, TransformEvent,
    TransformMachine,
};
use crate::layout::{
    compute_transition_delta, fullscreen_rect_for, normalize_source_rect, ScreenRect,
    TransitionDelta, Viewport,
};
use crate::models::{EntryPatch, EntryRegistry, MediaEntry};
use crate::pager::{
    PlaybackControl, PlaybackCoordinator, PlayerStatus, PreloadCommand, PreloadQueue, Priority,
    VideoPhase,
};
use crate::viewer::navigation::{NavParams, NavigationHost};

/// Inbound request from the feed to open the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub group_id: String,
    pub uri: String,
    /// Thumbnail rect measured by the caller. When absent the registered
    /// view handle is measured instead.
    pub source_rect: Option<ScreenRect>,
    pub aspect_ratio_hint: Option<f64>,
}

impl OpenRequest {
    pub fn new(group_id: &str, uri: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            uri: uri.to_string(),
            source_rect: None,
            aspect_ratio_hint: None,
        }
    }

    pub fn with_source_rect(mut self, rect: ScreenRect) -> Self {
        self.source_rect = Some(rect);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f64) -> Self {
        self.aspect_ratio_hint = Some(aspect_ratio);
        self
    }
}

/// Load state of one paged item. A failure stays local to its item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Ready,
    Failed(String),
}

/// Scroll state reported by the host pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScrollState {
    Idle,
    Dragging,
    Settling,
}

/// Which gestures a paged item receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAttachment {
    None,
    /// Videos keep their native controls; only the dismiss pan is attached.
    DismissOnly,
    Full,
}

impl GestureAttachment {
    fn for_item(priority: Priority, is_video: bool) -> Self {
        match priority {
            Priority::FocusedReady if is_video => GestureAttachment::DismissOnly,
            Priority::FocusedReady => GestureAttachment::Full,
            Priority::Focused | Priority::Next | Priority::NextReady | Priority::Hidden => {
                GestureAttachment::None
            }
        }
    }

    fn allows(self, event: &GestureEvent) -> bool {
        match self {
            GestureAttachment::Full => true,
            GestureAttachment::DismissOnly => matches!(
                event,
                GestureEvent::PanStart { .. }
                    | GestureEvent::PanUpdate { .. }
                    | GestureEvent::PanEnd { .. }
                    | GestureEvent::PanCancel
                    | GestureEvent::Interrupted
            ),
            GestureAttachment::None => matches!(event, GestureEvent::Interrupted),
        }
    }
}

/// Render description of one paged item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub index: usize,
    pub uri: String,
    pub priority: Priority,
    pub status: ItemStatus,
    pub fullscreen_rect: ScreenRect,
    pub video_phase: Option<VideoPhase>,
    pub show_controls: bool,
    pub gestures: GestureAttachment,
    /// The video the viewer was opened on, until the pager first rests.
    pub initial_preview: bool,
}

/// Everything the host renders for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerFrame {
    pub generation: u64,
    pub phase: Phase,
    pub focused_index: usize,
    /// Transform of the focused item.
    pub transform: Frame,
    /// Items the pager renders, in pager order.
    pub items: Vec<ItemView>,
    pub chrome_visible: bool,
    pub status_bar_hidden: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerOutcome {
    /// The pointer sequence belongs to the page-swipe recognizer.
    pub defer_to_pager: bool,
    /// A dismiss drag was committed and the viewer started closing.
    pub dismissed: bool,
}

struct Session {
    generation: u64,
    group_id: String,
    entries: Vec<MediaEntry>,
    focused: usize,
    initial_index: Option<usize>,
    source_rect: Option<ScreenRect>,
    mounted: bool,
    closing: bool,
    statuses: HashMap<String, ItemStatus>,
    chrome_visible: bool,
    scrolling: bool,
    /// Whether the focused item precedes the one focused before it.
    from_above: bool,
}

impl Session {
    fn focused_entry(&self) -> Option<&MediaEntry> {
        self.entries.get(self.focused)
    }
}

fn valid_ratio(ratio: f64) -> bool {
    ratio.is_finite() && ratio > 0.0
}

fn entry_ratio(entry: &MediaEntry) -> f64 {
    entry.aspect_ratio.filter(|r| valid_ratio(*r)).unwrap_or(1.0)
}

pub struct MediaViewer<N: NavigationHost> {
    config: ViewerConfig,
    registry: Arc<EntryRegistry>,
    viewport: Viewport,
    nav: N,
    recognizer: PointerRecognizer,
    machine: TransformMachine,
    preload: PreloadQueue,
    playback: PlaybackCoordinator,
    session: Option<Session>,
    generation: u64,
    /// Latest of the accumulated tick time and the last pointer timestamp.
    clock: Duration,
}

impl<N: NavigationHost> MediaViewer<N> {
    pub fn new(config: ViewerConfig, registry: Arc<EntryRegistry>, viewport: Viewport, nav: N) -> Self {
        Self {
            recognizer: PointerRecognizer::new(config.recognizer),
            machine: TransformMachine::new(config.clone()),
            preload: PreloadQueue::new(config.preload_capacity),
            playback: PlaybackCoordinator::new(config.playback_memory),
            config,
            registry,
            viewport,
            nav,
            session: None,
            generation: 0,
            clock: Duration::ZERO,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.generation)
    }

    pub fn focused_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.focused)
    }

    pub fn transform(&self) -> &TransformMachine {
        &self.machine
    }

    /// Decoder side of the preload queue.
    pub fn preload_commands(&self) -> Receiver<PreloadCommand> {
        self.preload.receiver()
    }

    /// Opens the viewer on `request.uri` and starts the mount transition.
    /// Returns the focused index within the group.
    pub async fn open_viewer(&mut self, request: OpenRequest) -> Result<usize> {
        let entries = self.registry.list_by_group(&request.group_id);
        let Some(index) = entries.iter().position(|e| e.uri == request.uri) else {
            return Err(ViewerError::EntryNotFound {
                group_id: request.group_id,
                uri: request.uri,
            });
        };

        if let Some(session) = &self.session {
            let same_item = session.group_id == request.group_id
                && session.focused_entry().is_some_and(|e| e.uri == request.uri);
            if same_item && !session.closing {
                debug!(uri = %request.uri, "Viewer already open on this item");
                return Ok(session.focused);
            }
        }
        self.supersede_session();

        let aspect_ratio = request
            .aspect_ratio_hint
            .filter(|r| valid_ratio(*r))
            .unwrap_or_else(|| entry_ratio(&entries[index]));
        let fullscreen = fullscreen_rect_for(aspect_ratio, &self.viewport);

        let measured = match request.source_rect {
            Some(rect) => Some(rect),
            None => {
                self.registry
                    .resolve_handle(&request.group_id, &request.uri)
                    .await
            }
        };
        // A thumbnail without layout enters from above the screen.
        let source_rect = measured.map(|r| normalize_source_rect(r, &self.viewport, true));
        let delta = self.transition_delta(source_rect, &fullscreen, &request.group_id, &request.uri);

        self.generation += 1;
        let generation = self.generation;

        self.machine.set_view_size(fullscreen, self.viewport.height);
        self.machine.begin_mount(delta);
        self.playback.begin_session(&request.uri);
        self.preload.plan(&entries, index, false);

        let statuses = entries
            .iter()
            .map(|e| (e.uri.clone(), ItemStatus::Pending))
            .collect();

        info!(
            uri = %request.uri,
            group_id = %request.group_id,
            index,
            count = entries.len(),
            generation,
            "Opening viewer"
        );

        self.session = Some(Session {
            generation,
            group_id: request.group_id,
            entries,
            focused: index,
            initial_index: Some(index),
            source_rect,
            mounted: false,
            closing: false,
            statuses,
            chrome_visible: true,
            scrolling: false,
            from_above: false,
        });
        Ok(index)
    }

    /// Starts the unmount transition toward the focused item's thumbnail as
    /// it is laid out now.
    pub async fn close_viewer(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(ViewerError::NoSession)?;
        if session.closing {
            return Ok(());
        }
        session.closing = true;

        let group_id = session.group_id.clone();
        let from_above = session.from_above;
        let Some(entry) = session.focused_entry().cloned() else {
            self.finish_session();
            return Ok(());
        };
        let fullscreen = fullscreen_rect_for(entry_ratio(&entry), &self.viewport);

        let rect = self
            .registry
            .resolve_handle(&group_id, &entry.uri)
            .await
            .map(|r| normalize_source_rect(r, &self.viewport, from_above));
        let delta = self.transition_delta(rect, &fullscreen, &group_id, &entry.uri);

        self.playback.end_session();
        self.recognizer.reset();
        self.machine.begin_unmount(delta);
        info!(uri = %entry.uri, "Closing viewer");

        if self.machine.phase() == Phase::Idle {
            self.finish_session();
        }
        Ok(())
    }

    pub async fn handle_pointer(&mut self, event: PointerEvent) -> PointerOutcome {
        let mut outcome = PointerOutcome::default();
        if !self.session.as_ref().is_some_and(|s| !s.closing) {
            return outcome;
        }
        self.clock = self.clock.max(event.time);

        let attachment = self.focused_attachment();
        for recognized in self.recognizer.handle(event, &self.machine) {
            match recognized {
                Recognized::DeferToPager => outcome.defer_to_pager = true,
                Recognized::Gesture(gesture) => {
                    if self.route_gesture(gesture, attachment) {
                        outcome.dismissed = true;
                    }
                }
            }
        }

        if outcome.dismissed {
            if let Err(e) = self.close_viewer().await {
                debug!(error = %e, "Dismiss without a session");
            }
        }
        outcome
    }

    /// Pager scroll progress; the first event of a drag pauses video.
    pub fn on_page_scroll(&mut self, offset: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.scrolling {
            session.scrolling = true;
            self.playback.on_drag_start();
        } else if offset == 0.0 {
            session.scrolling = false;
        }
    }

    pub fn on_page_scroll_state(&mut self, state: PageScrollState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match state {
            PageScrollState::Idle => {
                session.scrolling = false;
                session.initial_index = None;
                self.playback.on_pager_idle();
            }
            PageScrollState::Dragging => {
                if !session.scrolling {
                    session.scrolling = true;
                    self.playback.on_drag_start();
                }
            }
            PageScrollState::Settling => {}
        }
    }

    /// The pager settled on `index`.
    pub async fn on_page_selected(&mut self, index: usize) {
        let Some(session) = self.session.as_mut().filter(|s| !s.closing) else {
            return;
        };

        if index == session.focused {
            if let Some(entry) = session.focused_entry() {
                self.playback.on_page_settled(&entry.uri);
            }
            return;
        }
        let Some(snapshot) = session.entries.get(index) else {
            warn!(index, count = session.entries.len(), "Page index out of range");
            return;
        };

        let entry = self
            .registry
            .get(&session.group_id, &snapshot.uri)
            .unwrap_or_else(|| snapshot.clone());
        session.entries[index] = entry.clone();

        let from_above = index <= session.focused;
        let previous = session.focused;
        session.focused = index;
        session.from_above = from_above;
        let group_id = session.group_id.clone();
        let mounted = session.mounted;

        let aspect_ratio = entry_ratio(&entry);
        self.machine
            .set_view_size(fullscreen_rect_for(aspect_ratio, &self.viewport), self.viewport.height);
        self.playback.on_page_settled(&entry.uri);
        self.preload.plan(&session.entries, index, mounted);
        debug!(previous, index, uri = %entry.uri, "Page settled");

        let source_rect = self
            .registry
            .resolve_handle(&group_id, &entry.uri)
            .await
            .map(|r| normalize_source_rect(r, &self.viewport, from_above));
        if source_rect.is_none() {
            let error = ViewerError::MeasurementUnavailable {
                group_id: group_id.clone(),
                uri: entry.uri.clone(),
            };
            debug!(%error, "Navigation params without a source rect");
        }

        self.nav.update_current_params(NavParams {
            uri: entry.uri,
            group_id,
            source_rect,
            aspect_ratio,
        });
    }

    /// Decode finished for `uri`; records its true aspect ratio.
    pub fn on_media_loaded(&mut self, uri: &str, width: f64, height: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.preload.complete(uri);
        session.statuses.insert(uri.to_string(), ItemStatus::Ready);

        if !(width > 0.0 && height > 0.0) {
            return;
        }
        let ratio = height / width;
        self.registry
            .update(&EntryPatch::new(uri).in_group(&session.group_id).aspect_ratio(ratio));

        let mut focused_changed = false;
        for (i, entry) in session.entries.iter_mut().enumerate() {
            if entry.uri == uri && entry.aspect_ratio != Some(ratio) {
                entry.aspect_ratio = Some(ratio);
                focused_changed |= i == session.focused;
            }
        }
        if !focused_changed {
            return;
        }

        let fullscreen = fullscreen_rect_for(ratio, &self.viewport);
        trace!(uri, ratio, "Focused item aspect ratio resolved");
        self.machine.set_view_size(fullscreen, self.viewport.height);
        if self.machine.phase() == Phase::TransitioningIn {
            let delta = session
                .source_rect
                .map(|rect| compute_transition_delta(&rect, &fullscreen))
                .filter(|d| !d.is_identity());
            self.machine.set_source(delta);
        }
    }

    pub fn on_media_error(&mut self, uri: &str, reason: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.preload.complete(uri);
        session
            .statuses
            .insert(uri.to_string(), ItemStatus::Failed(reason.to_string()));
        let error = ViewerError::DecodeFailure {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };
        warn!(%error, "Media item failed to load");
    }

    pub fn register_player(&mut self, uri: &str, control: Arc<dyn PlaybackControl>) {
        self.playback.register(uri, control);
    }

    pub fn unregister_player(&mut self, uri: &str) {
        self.playback.unregister(uri);
    }

    pub fn on_player_status(&mut self, uri: &str, status: PlayerStatus) -> Option<VideoPhase> {
        let phase = self.playback.on_player_status(uri, status)?;
        if phase == VideoPhase::Error {
            if let Some(session) = self.session.as_mut() {
                session
                    .statuses
                    .insert(uri.to_string(), ItemStatus::Failed("playback error".to_string()));
            }
        }
        Some(phase)
    }

    pub fn on_play_to_end(&mut self, uri: &str) {
        self.playback.on_play_to_end(uri);
    }

    pub fn request_play(&mut self, uri: &str) -> bool {
        self.playback.request_play(uri)
    }

    pub fn request_pause(&mut self, uri: &str) {
        self.playback.request_pause(uri);
    }

    /// Viewport changed, e.g. on rotation.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(entry) = self.session.as_ref().and_then(|s| s.focused_entry()) {
            let rect = fullscreen_rect_for(entry_ratio(entry), &self.viewport);
            self.machine.set_view_size(rect, self.viewport.height);
        }
    }

    /// Advances animations by `dt` and returns the frame to render, or
    /// `None` once the viewer is closed.
    pub fn tick(&mut self, dt: Duration) -> Option<ViewerFrame> {
        self.clock += dt;
        if let Some(tap) = self.recognizer.poll(self.clock) {
            let attachment = self.focused_attachment();
            self.route_gesture(tap, attachment);
        }

        let events = self.machine.tick(dt);
        self.apply_events(events);
        self.frame()
    }

    pub fn frame(&self) -> Option<ViewerFrame> {
        let session = self.session.as_ref()?;
        let items = session
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let priority = Priority::classify(index, session.focused, session.mounted);
                if !priority.is_visible() {
                    return None;
                }
                let is_video = entry.is_video();
                Some(ItemView {
                    index,
                    uri: entry.uri.clone(),
                    priority,
                    status: session
                        .statuses
                        .get(&entry.uri)
                        .cloned()
                        .unwrap_or(ItemStatus::Pending),
                    fullscreen_rect: fullscreen_rect_for(entry_ratio(entry), &self.viewport),
                    video_phase: if is_video {
                        self.playback.phase(&entry.uri)
                    } else {
                        None
                    },
                    show_controls: is_video && priority.shows_controls() && !session.closing,
                    gestures: GestureAttachment::for_item(priority, is_video),
                    initial_preview: is_video && session.initial_index == Some(index),
                })
            })
            .collect();

        Some(ViewerFrame {
            generation: session.generation,
            phase: self.machine.phase(),
            focused_index: session.focused,
            transform: self.machine.frame(),
            items,
            chrome_visible: session.chrome_visible,
            status_bar_hidden: !session.chrome_visible,
        })
    }

    fn focused_attachment(&self) -> GestureAttachment {
        match &self.session {
            Some(session) if !session.closing => {
                let priority = Priority::classify(session.focused, session.focused, session.mounted);
                let is_video = session.focused_entry().is_some_and(|e| e.is_video());
                GestureAttachment::for_item(priority, is_video)
            }
            _ => GestureAttachment::None,
        }
    }

    /// Returns true when the gesture committed a dismiss.
    fn route_gesture(&mut self, gesture: GestureEvent, attachment: GestureAttachment) -> bool {
        if !attachment.allows(&gesture) {
            trace!(?gesture, ?attachment, "Gesture not attached to focused item");
            return false;
        }
        let events = self.machine.handle_gesture(gesture);
        self.apply_events(events)
    }

    /// Returns true when a dismiss was requested.
    fn apply_events(&mut self, events: Vec<TransformEvent>) -> bool {
        let mut dismiss = false;
        for event in events {
            match event {
                TransformEvent::Mounted => {
                    if let Some(session) = self.session.as_mut() {
                        session.mounted = true;
                        self.preload.plan(&session.entries, session.focused, true);
                    }
                    self.playback.on_mounted();
                    debug!("Viewer mounted");
                }
                TransformEvent::DismissRequested => dismiss = true,
                TransformEvent::Closed => self.finish_session(),
                TransformEvent::ZoomChanged(zoomed) => trace!(zoomed, "Zoom changed"),
                TransformEvent::ChromeToggled => {
                    if let Some(session) = self.session.as_mut() {
                        session.chrome_visible = !session.chrome_visible;
                        trace!(visible = session.chrome_visible, "Chrome toggled");
                    }
                }
            }
        }
        dismiss
    }

    fn transition_delta(
        &self,
        source: Option<ScreenRect>,
        fullscreen: &ScreenRect,
        group_id: &str,
        uri: &str,
    ) -> Option<TransitionDelta> {
        match source {
            Some(rect) if !rect.is_empty() => {
                Some(compute_transition_delta(&rect, fullscreen)).filter(|d| !d.is_identity())
            }
            _ => {
                let error = ViewerError::MeasurementUnavailable {
                    group_id: group_id.to_string(),
                    uri: uri.to_string(),
                };
                debug!(%error, "Falling back to fade transition");
                None
            }
        }
    }

    /// Drops the running session before a new open. A closing transform
    /// machine is kept so the new mount continues from its current pose.
    fn supersede_session(&mut self) {
        let Some(old) = self.session.take() else {
            return;
        };
        debug!(generation = old.generation, "Superseding viewer session");
        self.playback.end_session();
        self.preload.clear();
        self.recognizer.reset();
        if self.machine.phase() != Phase::TransitioningOut {
            self.machine = TransformMachine::new(self.config.clone());
        }
    }

    fn finish_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.preload.clear();
            self.recognizer.reset();
            self.nav.close();
            info!(generation = session.generation, "Viewer closed");
        }
    }
}
