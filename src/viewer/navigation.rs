//! Outbound calls to the navigation host that owns the viewer screen.

use async_channel::{Receiver, Sender};
use tracing::{debug, trace};

use crate::layout::ScreenRect;

/// Parameters the host needs to rebuild the viewer without re-deriving
/// state, e.g. after a rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavParams {
    pub uri: String,
    pub group_id: String,
    /// Where the focused item's thumbnail sits in the feed, if measurable.
    pub source_rect: Option<ScreenRect>,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    UpdateParams(NavParams),
    Close,
}

pub trait NavigationHost: Send + Sync {
    /// Called on every page settle.
    fn update_current_params(&self, params: NavParams);
    /// Called once the unmount transition has finished.
    fn close(&self);
}

/// Forwards navigation calls over an unbounded channel, for hosts that run
/// their own event loop.
#[derive(Clone)]
pub struct ChannelNavigator {
    tx: Sender<NavigationEvent>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, Receiver<NavigationEvent>) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: NavigationEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!(error = %e, "Navigation receiver dropped");
        }
    }
}

impl NavigationHost for ChannelNavigator {
    fn update_current_params(&self, params: NavParams) {
        trace!(uri = %params.uri, group_id = %params.group_id, "Updating navigation params");
        self.send(NavigationEvent::UpdateParams(params));
    }

    fn close(&self) {
        self.send(NavigationEvent::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_navigator_forwards_events() {
        let (nav, rx) = ChannelNavigator::new();
        let params = NavParams {
            uri: "a.jpg".to_string(),
            group_id: "g1".to_string(),
            source_rect: Some(ScreenRect::new(0.0, 0.0, 10.0, 10.0)),
            aspect_ratio: 1.5,
        };
        nav.update_current_params(params.clone());
        nav.close();

        assert_eq!(rx.recv().await.unwrap(), NavigationEvent::UpdateParams(params));
        assert_eq!(rx.recv().await.unwrap(), NavigationEvent::Close);
    }

    #[test]
    fn test_dropped_receiver_is_tolerated() {
        let (nav, rx) = ChannelNavigator::new();
        drop(rx);
        nav.close();
    }
}
