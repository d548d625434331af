//! Shared-element media viewer engine.
//!
//! Opens a fullscreen pager from a thumbnail in a feed, animates the
//! thumbnail into place, and drives zoom, pan and drag-to-dismiss gestures
//! on the focused item. Rendering and decoding stay with the host; this
//! crate only produces frames and commands.

pub mod animation;
pub mod config;
pub mod error;
pub mod gesture;
pub mod layout;
pub mod models;
pub mod pager;
pub mod viewer;

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use models::{EntryRegistry, MediaEntry, MediaType};
pub use viewer::{MediaViewer, NavigationHost, OpenRequest, ViewerFrame};
