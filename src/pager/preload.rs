//! Neighbor preloading for the pager.
//!
//! - Every page change produces a plan: decode the focused item and its
//!   immediate neighbors, release everything else
//! - Commands go to the platform decoder over a bounded flume channel
//! - Loads are sent before releases, so a full queue never starves the
//!   focused item
//! - A pending set prevents duplicate loads while a decode is in flight
//! - Commands that did not fit are retried on the next plan or completion
//! - A plan generation discards plans overtaken by a newer page change

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use flume::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use crate::models::MediaEntry;
use crate::pager::Priority;

/// Work for the platform decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadCommand {
    Load {
        uri: String,
        /// Low-resolution preview to show while the full media decodes.
        preview_uri: Option<String>,
        priority: Priority,
        generation: u64,
    },
    Release {
        uri: String,
    },
}

#[derive(Debug, Clone)]
struct Wanted {
    uri: String,
    preview_uri: Option<String>,
    priority: Priority,
}

#[derive(Default)]
struct Tracking {
    /// Loads sent and not yet completed.
    pending: HashSet<String>,
    /// Loads completed and not yet released.
    resident: HashSet<String>,
    /// Media the decoder still holds whose release has not been sent yet.
    releasing: HashSet<String>,
    /// Current plan in load order.
    wanted: Vec<Wanted>,
    generation: u64,
}

pub struct PreloadQueue {
    command_tx: Sender<PreloadCommand>,
    command_rx: Receiver<PreloadCommand>,
    tracking: RwLock<Tracking>,
    generation: AtomicU64,
}

impl PreloadQueue {
    pub fn new(capacity: usize) -> Self {
        let (command_tx, command_rx) = flume::bounded(capacity.max(1));
        Self {
            command_tx,
            command_rx,
            tracking: RwLock::new(Tracking::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Receiving end for the decoder. Every clone shares the same queue.
    pub fn receiver(&self) -> Receiver<PreloadCommand> {
        self.command_rx.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Plans loads and releases for `entries` with `focused` in view.
    /// Returns the number of commands sent.
    pub fn plan(&self, entries: &[MediaEntry], focused: usize, mounted: bool) -> usize {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut wanted: Vec<Wanted> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (Priority::classify(index, focused, mounted), entry))
            .filter(|(priority, _)| priority.should_preload())
            .map(|(priority, entry)| Wanted {
                uri: entry.uri.clone(),
                preview_uri: entry.preview_uri.clone(),
                priority,
            })
            .collect();
        wanted.sort_by_key(|w| w.priority.rank());
        let wanted_uris: HashSet<&str> = wanted.iter().map(|w| w.uri.as_str()).collect();

        let mut tracking = self.tracking.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            trace!(generation, "Discarding stale preload plan");
            return 0;
        }

        let unwanted: Vec<String> = tracking
            .pending
            .iter()
            .chain(tracking.resident.iter())
            .filter(|uri| !wanted_uris.contains(uri.as_str()))
            .cloned()
            .collect();
        for uri in unwanted {
            tracking.pending.remove(&uri);
            tracking.resident.remove(&uri);
            tracking.releasing.insert(uri);
        }
        tracking.wanted = wanted;
        tracking.generation = generation;

        let sent = self.flush(&mut tracking);
        debug!(
            generation,
            focused,
            sent,
            deferred = tracking.releasing.len(),
            "Planned preloads"
        );
        sent
    }

    /// Marks a load as finished. Completions for released media are ignored.
    /// Commands that did not fit earlier are retried.
    pub fn complete(&self, uri: &str) -> bool {
        let mut tracking = self.tracking.write();
        let completed = if tracking.pending.remove(uri) {
            tracking.resident.insert(uri.to_string());
            true
        } else {
            trace!(uri, "Ignoring completion for released media");
            false
        };

        let retried = self.flush(&mut tracking);
        if retried > 0 {
            trace!(retried, "Retried preload commands");
        }
        completed
    }

    /// Whether a load command is still worth running.
    pub fn is_wanted(&self, uri: &str) -> bool {
        self.tracking.read().pending.contains(uri)
    }

    pub fn pending_len(&self) -> usize {
        self.tracking.read().pending.len()
    }

    pub fn resident_len(&self) -> usize {
        self.tracking.read().resident.len()
    }

    /// Releases everything, e.g. when the viewer closes.
    pub fn clear(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut tracking = self.tracking.write();
        let Tracking {
            pending,
            resident,
            releasing,
            wanted,
            ..
        } = &mut *tracking;
        let count = pending.len() + resident.len();
        releasing.extend(pending.drain());
        releasing.extend(resident.drain());
        wanted.clear();

        self.flush(&mut tracking);
        debug!(
            count,
            deferred = tracking.releasing.len(),
            "Released all preloaded media"
        );
        count
    }

    /// Sends missing loads of the current plan, then deferred releases.
    /// Stops at the first command that does not fit.
    fn flush(&self, tracking: &mut Tracking) -> usize {
        let Tracking {
            pending,
            resident,
            releasing,
            wanted,
            generation,
        } = tracking;
        let mut sent = 0;

        for want in wanted.iter() {
            if pending.contains(&want.uri) || resident.contains(&want.uri) {
                continue;
            }
            if releasing.remove(&want.uri) {
                // Its release never went out; the decoder still holds it.
                resident.insert(want.uri.clone());
                continue;
            }
            let command = PreloadCommand::Load {
                uri: want.uri.clone(),
                preview_uri: want.preview_uri.clone(),
                priority: want.priority,
                generation: *generation,
            };
            if !self.send(command) {
                return sent;
            }
            trace!(uri = %want.uri, priority = ?want.priority, "Queued preload");
            pending.insert(want.uri.clone());
            sent += 1;
        }

        let mut released = Vec::new();
        for uri in releasing.iter() {
            if !self.send(PreloadCommand::Release { uri: uri.clone() }) {
                break;
            }
            trace!(uri = %uri, "Releasing preloaded media");
            released.push(uri.clone());
        }
        sent += released.len();
        for uri in released {
            releasing.remove(&uri);
        }
        sent
    }

    fn send(&self, command: PreloadCommand) -> bool {
        match self.command_tx.try_send(command) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(command)) => {
                warn!(?command, "Preload queue full, dropping command");
                false
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                error!("Preload queue disconnected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn entries(n: usize) -> Vec<MediaEntry> {
        (0..n)
            .map(|i| MediaEntry::new("g1", &format!("{i}.jpg"), MediaType::image("jpeg")))
            .collect()
    }

    fn drain(rx: &Receiver<PreloadCommand>) -> Vec<PreloadCommand> {
        rx.try_iter().collect()
    }

    fn loads(commands: &[PreloadCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|c| match c {
                PreloadCommand::Load { uri, .. } => Some(uri.as_str()),
                PreloadCommand::Release { .. } => None,
            })
            .collect()
    }

    fn releases(commands: &[PreloadCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|c| match c {
                PreloadCommand::Release { uri } => Some(uri.as_str()),
                PreloadCommand::Load { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_plan_loads_focused_first() {
        let queue = PreloadQueue::new(16);
        let rx = queue.receiver();
        let list = entries(5);

        assert_eq!(queue.plan(&list, 2, false), 3);
        let commands = drain(&rx);
        assert_eq!(loads(&commands)[0], "2.jpg");
        assert_eq!(loads(&commands).len(), 3);
        assert!(matches!(
            commands[0],
            PreloadCommand::Load {
                priority: Priority::Focused,
                generation: 1,
                ..
            }
        ));
        assert_eq!(queue.pending_len(), 3);
    }

    #[test]
    fn test_paging_releases_and_dedupes() {
        let queue = PreloadQueue::new(16);
        let rx = queue.receiver();
        let list = entries(6);

        queue.plan(&list, 0, true);
        drain(&rx);
        assert!(queue.complete("0.jpg"));

        queue.plan(&list, 1, true);
        let commands = drain(&rx);
        assert_eq!(loads(&commands), vec!["2.jpg"]);
        assert!(releases(&commands).is_empty());

        queue.plan(&list, 4, true);
        let commands = drain(&rx);
        let mut released = releases(&commands);
        released.sort();
        assert_eq!(released, vec!["0.jpg", "1.jpg", "2.jpg"]);
        assert_eq!(loads(&commands), vec!["4.jpg", "3.jpg", "5.jpg"]);
        assert_eq!(queue.resident_len(), 0);
    }

    #[test]
    fn test_completion_after_release_is_ignored() {
        let queue = PreloadQueue::new(16);
        let list = entries(6);
        queue.plan(&list, 0, true);
        queue.plan(&list, 5, true);
        assert!(!queue.is_wanted("0.jpg"));
        assert!(!queue.complete("0.jpg"));
        assert!(queue.is_wanted("5.jpg"));
    }

    #[test]
    fn test_full_queue_drops_loads() {
        let queue = PreloadQueue::new(1);
        let list = entries(3);
        assert_eq!(queue.plan(&list, 1, true), 1);
        assert_eq!(queue.pending_len(), 1);
        assert!(queue.is_wanted("1.jpg"));
    }

    #[test]
    fn test_full_queue_sends_focused_loads_before_releases() {
        let queue = PreloadQueue::new(3);
        let rx = queue.receiver();
        let list = entries(10);

        queue.plan(&list, 1, true);
        for uri in loads(&drain(&rx)) {
            queue.complete(uri);
        }
        assert_eq!(queue.resident_len(), 3);

        // Room for the three new loads only; the releases wait.
        assert_eq!(queue.plan(&list, 8, true), 3);
        let commands = drain(&rx);
        assert_eq!(loads(&commands), vec!["8.jpg", "7.jpg", "9.jpg"]);
        assert!(releases(&commands).is_empty());
        assert!(queue.is_wanted("8.jpg"));

        // The next completion frees the queue and flushes the releases.
        assert!(queue.complete("8.jpg"));
        let commands = drain(&rx);
        let mut released = releases(&commands);
        released.sort();
        assert_eq!(released, vec!["0.jpg", "1.jpg", "2.jpg"]);
        assert_eq!(queue.resident_len(), 1);
        assert_eq!(queue.pending_len(), 2);
    }

    #[test]
    fn test_unsent_release_is_kept_when_wanted_again() {
        let queue = PreloadQueue::new(2);
        let rx = queue.receiver();
        let list = entries(6);

        queue.plan(&list, 0, true);
        for uri in loads(&drain(&rx)) {
            queue.complete(uri);
        }

        // 4.jpg and 5.jpg fill the queue; 0.jpg and 1.jpg stay held.
        queue.plan(&list, 5, true);
        assert_eq!(loads(&drain(&rx)), vec!["5.jpg", "4.jpg"]);

        // Paging back: the decoder never dropped 0.jpg or 1.jpg.
        queue.plan(&list, 0, true);
        let commands = drain(&rx);
        assert!(loads(&commands).is_empty());
        let mut released = releases(&commands);
        released.sort();
        assert_eq!(released, vec!["4.jpg", "5.jpg"]);
        assert_eq!(queue.resident_len(), 2);
    }

    #[test]
    fn test_clear_releases_everything() {
        let queue = PreloadQueue::new(16);
        let rx = queue.receiver();
        queue.plan(&entries(3), 1, true);
        drain(&rx);
        queue.complete("1.jpg");

        assert_eq!(queue.clear(), 3);
        assert_eq!(releases(&drain(&rx)).len(), 3);
        assert_eq!(queue.pending_len(), 0);
    }
}
