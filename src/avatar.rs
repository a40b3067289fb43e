//! Avatar animation state
//!
//! The assistant loop publishes layer changes; the render loop observes them
//! through a watch channel and never blocks on the producer.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Animation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvatarLayer {
    Waiting,
    Listening,
    Thinking,
    Speaking,
}

impl AvatarLayer {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        }
    }
}

impl fmt::Display for AvatarLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which layers are active
///
/// At most one non-waiting layer is active; `waiting` is active exactly when
/// none of the others are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AvatarLayers {
    waiting: bool,
    listening: bool,
    thinking: bool,
    speaking: bool,
}

impl Default for AvatarLayers {
    fn default() -> Self {
        Self {
            waiting: true,
            listening: false,
            thinking: false,
            speaking: false,
        }
    }
}

impl AvatarLayers {
    /// Turn a layer on or off
    ///
    /// Activating a non-waiting layer deactivates the others. Activating
    /// `waiting` clears everything else; deactivating it directly is ignored.
    pub fn set_state(&mut self, layer: AvatarLayer, active: bool) {
        match (layer, active) {
            (AvatarLayer::Waiting, true) => *self = Self::default(),
            (AvatarLayer::Waiting, false) => {}
            (layer, true) => {
                *self = Self {
                    waiting: false,
                    listening: layer == AvatarLayer::Listening,
                    thinking: layer == AvatarLayer::Thinking,
                    speaking: layer == AvatarLayer::Speaking,
                };
            }
            (layer, false) => {
                if self.is_active(layer) {
                    *self = Self::default();
                }
            }
        }
    }

    #[must_use]
    pub const fn is_active(&self, layer: AvatarLayer) -> bool {
        match layer {
            AvatarLayer::Waiting => self.waiting,
            AvatarLayer::Listening => self.listening,
            AvatarLayer::Thinking => self.thinking,
            AvatarLayer::Speaking => self.speaking,
        }
    }

    /// The single active layer
    #[must_use]
    pub const fn dominant(&self) -> AvatarLayer {
        if self.listening {
            AvatarLayer::Listening
        } else if self.thinking {
            AvatarLayer::Thinking
        } else if self.speaking {
            AvatarLayer::Speaking
        } else {
            AvatarLayer::Waiting
        }
    }
}

/// Shared avatar state cell
#[derive(Debug, Clone)]
pub struct AvatarState {
    tx: Arc<watch::Sender<AvatarLayers>>,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarState {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AvatarLayers::default());
        Self { tx: Arc::new(tx) }
    }

    /// Update one layer, notifying observers only on change
    pub fn set_state(&self, layer: AvatarLayer, active: bool) {
        self.tx.send_if_modified(|layers| {
            let before = *layers;
            layers.set_state(layer, active);
            let changed = before != *layers;
            if changed {
                tracing::debug!(layer = %layers.dominant(), "avatar state changed");
            }
            changed
        });
    }

    /// Mirror the speech worker's flag onto the speaking layer
    pub fn sync_speaking(&self, speaking: bool) {
        let layers = self.current();
        if speaking && !layers.is_active(AvatarLayer::Speaking) {
            self.set_state(AvatarLayer::Speaking, true);
        } else if !speaking && layers.is_active(AvatarLayer::Speaking) {
            self.set_state(AvatarLayer::Speaking, false);
        }
    }

    #[must_use]
    pub fn current(&self) -> AvatarLayers {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AvatarLayers> {
        self.tx.subscribe()
    }
}
