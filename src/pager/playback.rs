//! Video playback coordination across pages.
//!
//! Only the focused video may play. Dragging between pages pauses it, and a
//! settled page restores the new video's last-known play/pause state. The
//! video that was focused when the viewer opened autoplays a single time when
//! its controls appear, unless the pager has already come to rest.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace, warn};

use crate::error::ViewerError;

/// Commands understood by a platform video player.
///
/// All three must be idempotent; the coordinator issues them redundantly
/// during rapid paging.
pub trait PlaybackControl: Send + Sync {
    fn play(&self);
    fn pause(&self);
    /// Stops playback and returns to the preview frame.
    fn reset(&self);
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// What a video item shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPhase {
    /// Poster frame with a play button.
    Preview,
    /// Play requested; the poster stays up while the player spins up.
    PreviewLoading,
    Playing,
    /// Buffering mid-playback.
    Loading,
    Error,
}

impl VideoPhase {
    pub fn shows_video(self) -> bool {
        !matches!(self, VideoPhase::Preview | VideoPhase::Error)
    }

    pub fn shows_preview(self) -> bool {
        matches!(
            self,
            VideoPhase::Preview | VideoPhase::PreviewLoading | VideoPhase::Error
        )
    }

    pub fn shows_play_button(self) -> bool {
        self == VideoPhase::Preview
    }

    pub fn shows_spinner(self) -> bool {
        matches!(self, VideoPhase::Loading | VideoPhase::PreviewLoading)
    }
}

/// Status reports from the platform player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Loading,
    ReadyToPlay,
    Error(String),
}

struct VideoSlot {
    control: Arc<dyn PlaybackControl>,
    phase: VideoPhase,
    state: PlaybackState,
}

pub struct PlaybackCoordinator {
    videos: HashMap<String, VideoSlot>,
    /// Last-known state per video, kept across unregister.
    memory: LruCache<String, PlaybackState>,
    focused: Option<String>,
    /// Autoplay target; cleared when autoplay fires or the pager goes idle.
    initial: Option<String>,
    controls_ready: bool,
}

impl PlaybackCoordinator {
    pub fn new(memory: usize) -> Self {
        let capacity = NonZeroUsize::new(memory).unwrap_or(NonZeroUsize::MIN);
        Self {
            videos: HashMap::new(),
            memory: LruCache::new(capacity),
            focused: None,
            initial: None,
            controls_ready: false,
        }
    }

    /// Starts a viewer session focused on `uri`.
    pub fn begin_session(&mut self, uri: &str) {
        self.focused = Some(uri.to_string());
        self.initial = Some(uri.to_string());
        self.controls_ready = false;
    }

    /// Pauses everything and forgets the session's focus.
    pub fn end_session(&mut self) {
        let uris: Vec<String> = self.videos.keys().cloned().collect();
        for uri in uris {
            self.pause(&uri, false);
        }
        self.focused = None;
        self.initial = None;
        self.controls_ready = false;
    }

    pub fn register(&mut self, uri: &str, control: Arc<dyn PlaybackControl>) {
        trace!(uri, "Registering video player");
        self.videos.insert(
            uri.to_string(),
            VideoSlot {
                control,
                phase: VideoPhase::Preview,
                state: PlaybackState::Stopped,
            },
        );
        if self.controls_ready && self.should_autoplay(uri) {
            self.autoplay(uri);
        }
    }

    pub fn unregister(&mut self, uri: &str) {
        if let Some(slot) = self.videos.remove(uri) {
            self.memory.put(uri.to_string(), slot.state);
            trace!(uri, "Unregistered video player");
        }
    }

    /// The focused item finished mounting; its controls are now visible.
    pub fn on_mounted(&mut self) {
        self.controls_ready = true;
        if let Some(uri) = self.focused.clone() {
            if self.should_autoplay(&uri) {
                self.autoplay(&uri);
            }
        }
    }

    pub fn on_pager_idle(&mut self) {
        if self.initial.take().is_some() {
            trace!("Initial autoplay window closed");
        }
    }

    /// A page drag began; the focused video must not keep playing.
    pub fn on_drag_start(&mut self) {
        if let Some(uri) = self.focused.clone() {
            self.pause(&uri, false);
        }
    }

    /// The pager came to rest on `uri`.
    pub fn on_page_settled(&mut self, uri: &str) {
        let others: Vec<String> = self
            .videos
            .iter()
            .filter(|(other, slot)| other.as_str() != uri && slot.state == PlaybackState::Playing)
            .map(|(other, _)| other.clone())
            .collect();
        for other in others {
            self.pause(&other, false);
        }

        self.focused = Some(uri.to_string());
        if !self.videos.contains_key(uri) {
            return;
        }

        let remembered = self.memory.get(uri).copied();
        if remembered == Some(PlaybackState::Playing) {
            self.resume(uri);
        } else if self.controls_ready && self.should_autoplay(uri) {
            self.autoplay(uri);
        }
    }

    /// User pressed play, or autoplay fired.
    pub fn request_play(&mut self, uri: &str) -> bool {
        let Some(slot) = self.videos.get_mut(uri) else {
            return false;
        };
        match slot.phase {
            VideoPhase::Preview | VideoPhase::Error => slot.phase = VideoPhase::PreviewLoading,
            VideoPhase::PreviewLoading | VideoPhase::Playing | VideoPhase::Loading => {}
        }
        if slot.state != PlaybackState::Playing {
            slot.control.play();
            slot.state = PlaybackState::Playing;
        }
        self.memory.put(uri.to_string(), PlaybackState::Playing);
        debug!(uri, phase = ?slot.phase, "Play requested");
        true
    }

    /// User pressed pause.
    pub fn request_pause(&mut self, uri: &str) {
        self.pause(uri, true);
    }

    pub fn on_player_status(&mut self, uri: &str, status: PlayerStatus) -> Option<VideoPhase> {
        let slot = self.videos.get_mut(uri)?;
        let next = match (&status, slot.phase) {
            (PlayerStatus::Loading, VideoPhase::PreviewLoading) => VideoPhase::PreviewLoading,
            (PlayerStatus::Loading, _) => VideoPhase::Loading,
            (PlayerStatus::ReadyToPlay | PlayerStatus::Idle, _) => VideoPhase::Playing,
            (PlayerStatus::Error(reason), _) => {
                let error = ViewerError::DecodeFailure {
                    uri: uri.to_string(),
                    reason: reason.clone(),
                };
                warn!(%error, "Video playback failed");
                slot.state = PlaybackState::Stopped;
                VideoPhase::Error
            }
        };
        if next != slot.phase {
            trace!(uri, from = ?slot.phase, to = ?next, "Video phase changed");
            slot.phase = next;
        }
        Some(next)
    }

    pub fn on_play_to_end(&mut self, uri: &str) {
        if let Some(slot) = self.videos.get_mut(uri) {
            slot.control.reset();
            slot.phase = VideoPhase::Preview;
            slot.state = PlaybackState::Stopped;
            self.memory.put(uri.to_string(), PlaybackState::Stopped);
            debug!(uri, "Video finished, back to preview");
        }
    }

    pub fn phase(&self, uri: &str) -> Option<VideoPhase> {
        self.videos.get(uri).map(|slot| slot.phase)
    }

    pub fn state(&self, uri: &str) -> Option<PlaybackState> {
        self.videos.get(uri).map(|slot| slot.state)
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    fn should_autoplay(&self, uri: &str) -> bool {
        self.initial.as_deref() == Some(uri) && self.focused.as_deref() == Some(uri)
    }

    /// Autoplay fires at most once per session.
    fn autoplay(&mut self, uri: &str) {
        self.initial = None;
        debug!(uri, "Autoplaying initial video");
        self.request_play(uri);
    }

    fn resume(&mut self, uri: &str) {
        if let Some(slot) = self.videos.get_mut(uri) {
            if slot.state != PlaybackState::Playing {
                slot.control.play();
                slot.state = PlaybackState::Playing;
                trace!(uri, "Resumed video");
            }
        }
    }

    /// Pauses `uri` if it is playing. `remember` records the pause as the
    /// video's last-known state; otherwise the video resumes on return.
    fn pause(&mut self, uri: &str, remember: bool) {
        let Some(slot) = self.videos.get_mut(uri) else {
            return;
        };
        if slot.state == PlaybackState::Playing {
            slot.control.pause();
            slot.state = PlaybackState::Paused;
            trace!(uri, remember, "Paused video");
        }
        if remember {
            self.memory.put(uri.to_string(), PlaybackState::Paused);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<&'static str> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl PlaybackControl for Recorder {
        fn play(&self) {
            self.calls.lock().push("play");
        }
        fn pause(&self) {
            self.calls.lock().push("pause");
        }
        fn reset(&self) {
            self.calls.lock().push("reset");
        }
    }

    fn setup(initial: &str) -> (PlaybackCoordinator, Arc<Recorder>, Arc<Recorder>) {
        let mut coordinator = PlaybackCoordinator::new(8);
        coordinator.begin_session(initial);
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        coordinator.register("a.mp4", a.clone());
        coordinator.register("b.mp4", b.clone());
        (coordinator, a, b)
    }

    #[test]
    fn test_initial_video_autoplays_after_mount() {
        let (mut coordinator, a, b) = setup("a.mp4");
        assert!(a.take().is_empty());

        coordinator.on_mounted();
        assert_eq!(a.take(), vec!["play"]);
        assert!(b.take().is_empty());
        assert_eq!(coordinator.phase("a.mp4"), Some(VideoPhase::PreviewLoading));
    }

    #[test]
    fn test_no_autoplay_after_pager_idle() {
        let (mut coordinator, _a, b) = setup("a.mp4");
        coordinator.on_pager_idle();
        coordinator.on_mounted();
        coordinator.on_page_settled("b.mp4");
        assert!(b.take().is_empty());
        assert_eq!(coordinator.phase("b.mp4"), Some(VideoPhase::Preview));
    }

    #[test]
    fn test_drag_pauses_and_settle_restores() {
        let (mut coordinator, a, _b) = setup("a.mp4");
        coordinator.on_mounted();
        coordinator.on_pager_idle();
        a.take();

        coordinator.on_drag_start();
        assert_eq!(a.take(), vec!["pause"]);
        // Redundant pauses are not forwarded.
        coordinator.on_drag_start();
        assert!(a.take().is_empty());

        coordinator.on_page_settled("a.mp4");
        assert_eq!(a.take(), vec!["play"]);
        assert_eq!(coordinator.state("a.mp4"), Some(PlaybackState::Playing));
    }

    #[test]
    fn test_paging_away_and_back() {
        let (mut coordinator, a, b) = setup("a.mp4");
        coordinator.on_mounted();
        coordinator.on_pager_idle();

        coordinator.on_drag_start();
        coordinator.on_page_settled("b.mp4");
        assert_eq!(a.take(), vec!["play", "pause"]);
        assert!(b.take().is_empty());

        coordinator.on_drag_start();
        coordinator.on_page_settled("a.mp4");
        assert_eq!(a.take(), vec!["play"]);
    }

    #[test]
    fn test_explicit_pause_is_remembered() {
        let (mut coordinator, a, _b) = setup("a.mp4");
        coordinator.on_mounted();
        coordinator.request_pause("a.mp4");
        coordinator.on_page_settled("b.mp4");
        coordinator.on_page_settled("a.mp4");
        assert_eq!(a.take(), vec!["play", "pause"]);
        assert_eq!(coordinator.state("a.mp4"), Some(PlaybackState::Paused));
    }

    #[test]
    fn test_player_status_transitions() {
        let (mut coordinator, _a, _b) = setup("a.mp4");
        coordinator.request_play("a.mp4");
        assert_eq!(
            coordinator.on_player_status("a.mp4", PlayerStatus::Loading),
            Some(VideoPhase::PreviewLoading)
        );
        assert_eq!(
            coordinator.on_player_status("a.mp4", PlayerStatus::ReadyToPlay),
            Some(VideoPhase::Playing)
        );
        assert_eq!(
            coordinator.on_player_status("a.mp4", PlayerStatus::Loading),
            Some(VideoPhase::Loading)
        );
        assert_eq!(
            coordinator.on_player_status("a.mp4", PlayerStatus::Idle),
            Some(VideoPhase::Playing)
        );
        assert_eq!(
            coordinator.on_player_status("a.mp4", PlayerStatus::Error("codec".into())),
            Some(VideoPhase::Error)
        );
        assert_eq!(coordinator.state("a.mp4"), Some(PlaybackState::Stopped));
        assert_eq!(coordinator.on_player_status("missing.mp4", PlayerStatus::Idle), None);
    }

    #[test]
    fn test_play_to_end_resets_to_preview() {
        let (mut coordinator, a, _b) = setup("a.mp4");
        coordinator.request_play("a.mp4");
        coordinator.on_player_status("a.mp4", PlayerStatus::ReadyToPlay);
        coordinator.on_play_to_end("a.mp4");
        assert_eq!(a.take(), vec!["play", "reset"]);
        assert_eq!(coordinator.phase("a.mp4"), Some(VideoPhase::Preview));
        assert!(VideoPhase::Preview.shows_play_button());
        assert!(!VideoPhase::Preview.shows_video());
        assert!(VideoPhase::Preview.shows_preview());
        assert!(!VideoPhase::Preview.shows_spinner());
        assert!(VideoPhase::PreviewLoading.shows_spinner());
    }
}
