//! Viewer session orchestration and the navigation host seam.

pub mod navigation;
pub mod orchestrator;

pub use navigation::{ChannelNavigator, NavParams, NavigationEvent, NavigationHost};
pub use orchestrator::{
    GestureAttachment, ItemStatus, ItemView, MediaViewer, OpenRequest, PageScrollState,
    PointerOutcome, ViewerFrame,
};
