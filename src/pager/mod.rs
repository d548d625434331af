//! Paged virtualization for the viewer.
//!
//! This module provides:
//! - `Priority` - Render tier of each paged item
//! - `PreloadQueue` - Decode/release commands for the focused item's neighborhood
//! - `PlaybackCoordinator` - Play/pause arbitration between video pages

pub mod playback;
pub mod preload;
pub mod priority;

pub use playback::{PlaybackControl, PlaybackCoordinator, PlaybackState, PlayerStatus, VideoPhase};
pub use preload::{PreloadCommand, PreloadQueue};
pub use priority::Priority;
