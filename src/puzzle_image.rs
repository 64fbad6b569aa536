use serde::Serialize;

/// Whether the photographic fill can be drawn. Gameplay never depends on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageLoadState {
    #[default]
    Unknown,
    Loaded,
    Failed,
}

/// Tracks the load state of the current source image. Reports for an image that is no
/// longer current are dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageSlot {
    src: String,
    state: ImageLoadState,
}

impl ImageSlot {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.to_string(),
            state: ImageLoadState::Unknown,
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn state(&self) -> ImageLoadState {
        self.state
    }

    pub fn use_photo_fill(&self) -> bool {
        self.state == ImageLoadState::Loaded
    }

    /// Returns true when the state changed.
    pub fn report(&mut self, src: &str, loaded: bool) -> bool {
        if src != self.src {
            return false;
        }
        let next = if loaded {
            ImageLoadState::Loaded
        } else {
            ImageLoadState::Failed
        };
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_reports_are_ignored() {
        let mut slot = ImageSlot::new("a.jpg");
        assert!(!slot.report("b.jpg", true));
        assert_eq!(slot.state(), ImageLoadState::Unknown);
        assert!(slot.report("a.jpg", false));
        assert!(!slot.use_photo_fill());
        assert!(slot.report("a.jpg", true));
        assert!(slot.use_photo_fill());
        assert!(!slot.report("a.jpg", true));
    }
}
