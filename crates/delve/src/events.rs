//! # World Event System
//!
//! Non-blocking notifications from the world engine to front ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │  Generator  │─────>│   Event     │─────>│  Front end  │
//! │  Mutations  │      │   Channel   │      │  (console,  │
//! │  Respawn    │      │  (bounded)  │      │   logs)     │
//! │  Autosave   │      └─────────────┘      └─────────────┘
//! └─────────────┘
//! ```
//!
//! Producers never block: a full channel drops the event.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use delve_core::{BiomeTheme, ChunkId, ChunkLevel, NodeId};
use tracing::trace;

/// Events emitted by the world engine.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    // =========================================================================
    // Generation
    // =========================================================================
    /// A chunk was created and persisted.
    ChunkGenerated {
        /// New chunk.
        chunk: ChunkId,
        /// Its level.
        level: ChunkLevel,
    },

    /// A Subzone graph passed validation and was persisted.
    SubzoneGenerated {
        /// The Subzone.
        subzone: ChunkId,
        /// Node count.
        nodes: usize,
        /// Topology attempts it took.
        attempts: u32,
    },

    /// A stub received its content.
    SpaceFilled {
        /// The space.
        space: NodeId,
    },

    /// A Frontier node was linked to a new Subzone.
    FrontierExpanded {
        /// The Frontier node.
        from: NodeId,
        /// The new Subzone.
        subzone: ChunkId,
    },

    /// A breakout edge into a new Region was opened.
    BreakoutOpened {
        /// The Frontier node.
        from: NodeId,
        /// The new Region.
        region: ChunkId,
        /// Theme of the new Region.
        theme: BiomeTheme,
    },

    // =========================================================================
    // Navigation and mutation
    // =========================================================================
    /// A player moved between spaces.
    PlayerMoved {
        /// Player identity.
        player: String,
        /// Origin space.
        from: NodeId,
        /// Destination space.
        to: NodeId,
    },

    /// Hidden edges were revealed to a player.
    EdgesRevealed {
        /// Player identity.
        player: String,
        /// Space searched.
        space: NodeId,
        /// Labels revealed.
        directions: Vec<String>,
    },

    /// A passage was carved.
    EdgeCarved {
        /// Origin space.
        from: NodeId,
        /// Destination space.
        to: NodeId,
    },

    /// A passage was collapsed.
    EdgeCollapsed {
        /// Origin space.
        from: NodeId,
        /// Label removed at the origin.
        direction: String,
    },

    /// A carve or collapse was refused.
    MutationRejected {
        /// Space where it was attempted.
        space: NodeId,
        /// Human-readable reason.
        reason: String,
    },

    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// A space was repopulated.
    SpaceRespawned {
        /// The space.
        space: NodeId,
        /// Creatures now present.
        entities: usize,
    },

    /// Staged space content was saved.
    WorldSaved {
        /// Contents written.
        contents: usize,
    },
}

/// Bounded event channel.
pub struct EventBus {
    sender: Sender<WorldEvent>,
    receiver: Receiver<WorldEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// A producer handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// A consumer handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<WorldEvent>,
}

impl EventSender {
    /// Sends without blocking. Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: WorldEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!(?event, "event channel full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<WorldEvent>,
}

impl EventReceiver {
    /// Takes every pending event.
    #[inline]
    pub fn drain(&self) -> Vec<WorldEvent> {
        self.receiver.try_iter().collect()
    }

    /// Takes one pending event.
    #[inline]
    pub fn try_recv(&self) -> Option<WorldEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Sends through an optional sender.
pub(crate) fn emit(sender: Option<&EventSender>, event: WorldEvent) {
    if let Some(sender) = sender {
        sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_drain() {
        let bus = EventBus::new(4);
        let sender = bus.sender();
        let receiver = bus.receiver();
        assert!(sender.send(WorldEvent::SpaceFilled {
            space: NodeId::new("world/r0/z0/s0/n1"),
        }));
        assert_eq!(receiver.pending_count(), 1);
        assert_eq!(receiver.drain().len(), 1);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_full_channel_drops() {
        let bus = EventBus::new(1);
        let sender = bus.sender();
        let saved = WorldEvent::WorldSaved { contents: 1 };
        assert!(sender.send(saved.clone()));
        assert!(!sender.send(saved));
        assert_eq!(bus.receiver().pending_count(), 1);
    }
}
