//! Render priority tiers for paged items.

/// How eagerly a paged item is rendered and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// The focused item while the mount transition is still running.
    Focused,
    /// The focused item once mounted; owns gestures and playback controls.
    FocusedReady,
    /// An immediate neighbor before mount.
    Next,
    /// An immediate neighbor after mount; decoded eagerly, no focus.
    NextReady,
    /// Not rendered; resources released.
    Hidden,
}

impl Priority {
    pub fn classify(item_index: usize, focused_index: usize, is_mounted: bool) -> Priority {
        match (item_index.abs_diff(focused_index), is_mounted) {
            (0, true) => Priority::FocusedReady,
            (0, false) => Priority::Focused,
            (1, true) => Priority::NextReady,
            (1, false) => Priority::Next,
            _ => Priority::Hidden,
        }
    }

    pub fn is_focused(self) -> bool {
        match self {
            Priority::Focused | Priority::FocusedReady => true,
            Priority::Next | Priority::NextReady | Priority::Hidden => false,
        }
    }

    /// Rendered at all; neighbors that are not yet mounted stay offscreen.
    pub fn is_visible(self) -> bool {
        match self {
            Priority::Focused | Priority::FocusedReady | Priority::NextReady => true,
            Priority::Next | Priority::Hidden => false,
        }
    }

    /// Whether the item's media should be decoded now.
    pub fn should_preload(self) -> bool {
        match self {
            Priority::Focused | Priority::FocusedReady | Priority::Next | Priority::NextReady => {
                true
            }
            Priority::Hidden => false,
        }
    }

    /// Playback controls wait until the transition has settled.
    pub fn shows_controls(self) -> bool {
        match self {
            Priority::FocusedReady => true,
            Priority::Focused | Priority::Next | Priority::NextReady | Priority::Hidden => false,
        }
    }

    pub fn has_gestures(self) -> bool {
        self.shows_controls()
    }

    /// Lower loads first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::FocusedReady | Priority::Focused => 0,
            Priority::NextReady | Priority::Next => 1,
            Priority::Hidden => u8::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_focused() {
        assert_eq!(Priority::classify(3, 3, true), Priority::FocusedReady);
        assert_eq!(Priority::classify(3, 3, false), Priority::Focused);
    }

    #[test]
    fn test_classify_neighbors() {
        assert_eq!(Priority::classify(2, 3, true), Priority::NextReady);
        assert_eq!(Priority::classify(4, 3, false), Priority::Next);
        assert_eq!(Priority::classify(0, 1, true), Priority::NextReady);
    }

    #[test]
    fn test_classify_is_total() {
        for focused in 0..6 {
            for item in 0..6 {
                for mounted in [false, true] {
                    let priority = Priority::classify(item, focused, mounted);
                    let expected_hidden = item.abs_diff(focused) > 1;
                    assert_eq!(priority == Priority::Hidden, expected_hidden);
                    assert_eq!(priority.is_focused(), item == focused);
                }
            }
        }
    }

    #[test]
    fn test_controls_only_when_ready() {
        assert!(Priority::FocusedReady.shows_controls());
        assert!(!Priority::Focused.shows_controls());
        assert!(!Priority::NextReady.has_gestures());
        assert!(Priority::Next.should_preload());
        assert!(!Priority::Hidden.should_preload());
        assert!(!Priority::Next.is_visible());
        assert!(Priority::Focused.is_visible());
    }
}
