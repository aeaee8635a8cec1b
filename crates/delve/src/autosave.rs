//! # Autosave
//!
//! Background task that flushes staged space content.
//!
//! ```text
//!            ┌── interval tick ───────┐
//! autosave ──┼── move threshold hit ──┼──> save_world_state
//!            └── shutdown signal ─────┘──> final save, exit
//! ```
//!
//! Saves are last-write-wins per row, so a timed save racing a foreground
//! save is harmless.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use delve_persistence::WorldPersistence;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::AutosaveConfig;
use crate::events::{emit, EventSender, WorldEvent};

/// Control handle for a running autosave task.
#[derive(Debug)]
pub struct AutosaveHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    trigger: Arc<Notify>,
    moves: Arc<AtomicU32>,
    move_threshold: u32,
}

impl AutosaveHandle {
    /// Counts one player move; every `move_threshold` moves trigger a save.
    pub fn note_move(&self) {
        if self.move_threshold == 0 {
            return;
        }
        let moves = self.moves.fetch_add(1, Ordering::Relaxed) + 1;
        if moves >= self.move_threshold {
            self.moves.store(0, Ordering::Relaxed);
            self.trigger.notify_one();
        }
    }

    /// Asks for a save as soon as possible.
    pub fn request_save(&self) {
        self.trigger.notify_one();
    }

    /// Stops the task after one final save.
    pub async fn shutdown(self) {
        // Err only if the task already exited.
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "autosave task ended abnormally");
        }
    }
}

/// Starts the autosave task on the current tokio runtime.
#[must_use]
pub fn spawn_autosave(
    persistence: Arc<WorldPersistence>,
    config: &AutosaveConfig,
    events: Option<EventSender>,
) -> AutosaveHandle {
    let (shutdown, mut stop) = watch::channel(false);
    let trigger = Arc::new(Notify::new());
    let notified = trigger.clone();
    let period = config.interval();

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        debug!(?period, "autosave started");

        loop {
            tokio::select! {
                _ = ticker.tick() => save(&persistence, events.as_ref(), "interval"),
                () = notified.notified() => save(&persistence, events.as_ref(), "moves"),
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        save(&persistence, events.as_ref(), "shutdown");
        info!("autosave stopped");
    });

    AutosaveHandle {
        task,
        shutdown,
        trigger,
        moves: Arc::new(AtomicU32::new(0)),
        move_threshold: config.move_threshold,
    }
}

fn save(persistence: &WorldPersistence, events: Option<&EventSender>, reason: &str) {
    match persistence.save_world_state() {
        Ok(summary) if summary.is_empty() => debug!(reason, "autosave: nothing dirty"),
        Ok(summary) => {
            debug!(reason, contents = summary.contents, "autosave");
            emit(
                events,
                WorldEvent::WorldSaved {
                    contents: summary.contents,
                },
            );
        }
        Err(err) => warn!(reason, error = %err, "autosave failed, will retry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use delve_core::{BiomeTheme, ChunkLevel, ChunkNode, GraphNode, NodeId, SpaceContent};
    use delve_persistence::MemoryStore;
    use std::time::Duration;

    fn persistence_with_dirty_content() -> Arc<WorldPersistence> {
        let persistence = Arc::new(WorldPersistence::new(Arc::new(MemoryStore::new())));
        let root = ChunkNode::root("lore", BiomeTheme::Mines);
        let subzone = ChunkNode {
            id: root.id.child(ChunkLevel::Subzone, 0),
            level: ChunkLevel::Subzone,
            parent: Some(root.id.clone()),
            ..root.clone()
        };
        let node = GraphNode::new(NodeId::in_subzone(&subzone.id, 0), subzone.id.clone(), None);
        let space = ChunkNode {
            id: node.id.chunk_id(),
            level: ChunkLevel::Space,
            parent: Some(subzone.id.clone()),
            ..subzone.clone()
        };
        persistence.persist_batch(&[root, subzone, space], &[], &[]).unwrap();
        let mut content = SpaceContent::stub(&node);
        content.set_flag("torch_lit", true);
        persistence.stage_content(content);
        assert_eq!(persistence.dirty_count(), 1);
        persistence
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_save() {
        let persistence = persistence_with_dirty_content();
        let bus = EventBus::new(8);
        let handle = spawn_autosave(persistence.clone(), &AutosaveConfig::default(), Some(bus.sender()));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(persistence.dirty_count(), 0);
        assert!(matches!(
            bus.receiver().try_recv(),
            Some(WorldEvent::WorldSaved { contents: 1 })
        ));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_threshold_triggers_save() {
        let persistence = persistence_with_dirty_content();
        let config = AutosaveConfig {
            interval_secs: 3_600,
            move_threshold: 2,
        };
        let handle = spawn_autosave(persistence.clone(), &config, None);

        handle.note_move();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(persistence.dirty_count(), 1);

        handle.note_move();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(persistence.dirty_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_saves_once_more() {
        let persistence = persistence_with_dirty_content();
        let handle = spawn_autosave(persistence.clone(), &AutosaveConfig::default(), None);
        handle.shutdown().await;
        assert_eq!(persistence.dirty_count(), 0);
    }
}
