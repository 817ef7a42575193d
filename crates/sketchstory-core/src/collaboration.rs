//! Collaboration session: participant roster and shared stroke history.
//!
//! A session moves `Uninitialized -> Active -> Ended`. While active it
//! accepts local strokes (returning the event to publish) and remote events
//! from the sync channel. Once ended it is inert: local mutations fail with
//! [`Error::SessionEnded`] and remote events are ignored.

use crate::config::OrderingMode;
use crate::error::{Error, Result};
use crate::stroke::{Path, PathId, now_millis};
use crate::sync::{EventPayload, SyncEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Active,
    Ended,
}

/// A participant in a shared session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// When the collaborator left, in milliseconds since the Unix epoch.
    #[serde(skip)]
    inactive_since: Option<u64>,
}

fn default_active() -> bool {
    true
}

impl Collaborator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            is_active: true,
            inactive_since: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn inactive_since(&self) -> Option<u64> {
        self.inactive_since
    }
}

/// A stroke in the shared history with its author and sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeEntry {
    pub path: Path,
    pub author_id: String,
    pub seq: u64,
}

impl StrokeEntry {
    fn sort_key(&self) -> (u64, &str) {
        (self.seq, &self.author_id)
    }
}

/// What applying a remote event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A stroke was inserted at `index` of the stroke history.
    Stroke { index: usize },
    Joined(String),
    Left(String),
    /// The session was not active; nothing changed.
    Ignored,
}

/// Shared drawing context spanning several participants.
#[derive(Debug, Clone)]
pub struct CollaborationSession {
    id: String,
    status: SessionStatus,
    ordering: OrderingMode,
    collaborators: Vec<Collaborator>,
    strokes: Vec<StrokeEntry>,
    /// Strokes removed by `undo_stroke`, most recent last.
    undone: Vec<StrokeEntry>,
    /// Lamport clock: highest sequence number seen or issued.
    clock: u64,
    created_at: u64,
    last_modified: u64,
}

impl CollaborationSession {
    pub fn new(id: impl Into<String>, ordering: OrderingMode) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            status: SessionStatus::Uninitialized,
            ordering,
            collaborators: Vec::new(),
            strokes: Vec::new(),
            undone: Vec::new(),
            clock: 0,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// Current logical clock value.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    fn ensure_active(&self) -> Result<()> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Uninitialized => Err(Error::SessionNotStarted),
            SessionStatus::Ended => Err(Error::SessionEnded(self.id.clone())),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Activate the session, seeding the history with paths drawn before
    /// collaboration started. They are attributed to `author_id`.
    pub fn start(&mut self, seed: impl IntoIterator<Item = Path>, author_id: &str) -> Result<()> {
        match self.status {
            SessionStatus::Active => return Err(Error::SessionAlreadyActive),
            SessionStatus::Ended => return Err(Error::SessionEnded(self.id.clone())),
            SessionStatus::Uninitialized => {}
        }

        for path in seed {
            let seq = self.tick();
            self.strokes.push(StrokeEntry {
                path,
                author_id: author_id.to_string(),
                seq,
            });
        }
        self.status = SessionStatus::Active;
        self.last_modified = now_millis();
        log::info!(
            "Collaboration session {} started with {} seed stroke(s)",
            self.id,
            self.strokes.len()
        );
        Ok(())
    }

    /// End the session. Idempotent.
    pub fn end(&mut self) {
        if self.status != SessionStatus::Ended {
            log::info!("Collaboration session {} ended", self.id);
        }
        self.status = SessionStatus::Ended;
    }

    // --- Roster ---

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    pub fn active_collaborators(&self) -> impl Iterator<Item = &Collaborator> {
        self.collaborators.iter().filter(|c| c.is_active)
    }

    pub fn collaborator(&self, id: &str) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.id == id)
    }

    /// Add or reactivate a collaborator.
    fn upsert(&mut self, collaborator: Collaborator) {
        match self.collaborators.iter_mut().find(|c| c.id == collaborator.id) {
            Some(existing) => {
                existing.name = collaborator.name;
                existing.avatar = collaborator.avatar;
                existing.is_active = true;
                existing.inactive_since = None;
            }
            None => self.collaborators.push(Collaborator {
                is_active: true,
                inactive_since: None,
                ..collaborator
            }),
        }
    }

    /// Register a collaborator locally, e.g. the participant itself.
    pub fn add_collaborator(&mut self, collaborator: Collaborator) -> Result<()> {
        self.ensure_active()?;
        self.upsert(collaborator);
        Ok(())
    }

    /// Mark a collaborator inactive. They stay in the roster until
    /// [`prune_inactive`](Self::prune_inactive) removes them.
    fn mark_left(&mut self, id: &str, at: u64) -> bool {
        match self.collaborators.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                if c.is_active {
                    c.is_active = false;
                    c.inactive_since = Some(at);
                }
                true
            }
            None => false,
        }
    }

    /// Remove collaborators that have been inactive for at least `timeout`.
    /// Returns the removed ids.
    pub fn prune_inactive(&mut self, now: u64, timeout: Duration) -> Vec<String> {
        let timeout_ms = timeout.as_millis() as u64;
        let mut removed = Vec::new();
        self.collaborators.retain(|c| {
            let expired = !c.is_active
                && c.inactive_since
                    .is_some_and(|since| now.saturating_sub(since) >= timeout_ms);
            if expired {
                removed.push(c.id.clone());
            }
            !expired
        });
        if !removed.is_empty() {
            log::debug!("Pruned {} inactive collaborator(s) from {}", removed.len(), self.id);
        }
        removed
    }

    // --- Strokes ---

    /// The shared stroke history in its current order.
    pub fn strokes(&self) -> &[StrokeEntry] {
        &self.strokes
    }

    pub fn stroke_paths(&self) -> impl Iterator<Item = &Path> {
        self.strokes.iter().map(|entry| &entry.path)
    }

    /// Insert an entry according to the ordering mode. Returns its index.
    fn insert(&mut self, entry: StrokeEntry) -> usize {
        let index = match self.ordering {
            OrderingMode::ReceiptOrder => self.strokes.len(),
            OrderingMode::Sequenced => {
                let key = entry.sort_key();
                self.strokes.partition_point(|e| e.sort_key() <= key)
            }
        };
        self.strokes.insert(index, entry);
        index
    }

    /// Append a locally drawn stroke and return the event to publish.
    pub fn add_stroke(&mut self, path: Path, author_id: &str) -> Result<SyncEvent> {
        self.ensure_active()?;
        let seq = self.tick();
        let event = SyncEvent::stroke(path.clone(), author_id, seq);
        self.insert(StrokeEntry {
            path,
            author_id: author_id.to_string(),
            seq,
        });
        self.undone.clear();
        self.last_modified = event.timestamp;
        Ok(event)
    }

    /// Remove the most recent stroke. Local only; nothing is published.
    pub fn undo_stroke(&mut self) -> Result<Option<StrokeEntry>> {
        self.ensure_active()?;
        let entry = self.strokes.pop();
        Ok(entry.map(|entry| self.withdraw(entry)))
    }

    /// Remove the stroke drawn as `id`, wherever it sits. Local only.
    pub fn undo_path(&mut self, id: PathId) -> Result<Option<StrokeEntry>> {
        self.ensure_active()?;
        let position = self.strokes.iter().rposition(|e| e.path.id() == id);
        Ok(position.map(|i| {
            let entry = self.strokes.remove(i);
            self.withdraw(entry)
        }))
    }

    fn withdraw(&mut self, entry: StrokeEntry) -> StrokeEntry {
        self.undone.push(entry.clone());
        self.last_modified = now_millis();
        entry
    }

    /// Put back the most recently undone stroke. Local only. Returns its
    /// index in the stroke history.
    pub fn redo_stroke(&mut self) -> Result<Option<usize>> {
        self.ensure_active()?;
        let entry = self.undone.pop();
        Ok(entry.map(|entry| self.restore(entry)))
    }

    /// Put back the undone stroke drawn as `id`. `None` if it was not
    /// undone here.
    pub fn redo_path(&mut self, id: PathId) -> Result<Option<usize>> {
        self.ensure_active()?;
        let position = self.undone.iter().rposition(|e| e.path.id() == id);
        Ok(position.map(|i| {
            let entry = self.undone.remove(i);
            self.restore(entry)
        }))
    }

    fn restore(&mut self, entry: StrokeEntry) -> usize {
        self.last_modified = now_millis();
        self.insert(entry)
    }

    /// Index of the stroke drawn as `id`.
    pub fn position_of(&self, id: PathId) -> Option<usize> {
        self.strokes.iter().position(|e| e.path.id() == id)
    }

    /// Next sequence number to stamp on an outgoing non-stroke event.
    pub fn next_seq(&mut self) -> u64 {
        self.tick()
    }

    /// Apply an event received from another participant.
    pub fn apply(&mut self, event: &SyncEvent) -> Applied {
        if !self.is_active() {
            log::debug!(
                "Ignoring {:?} event for {} session {}",
                event.kind(),
                if self.status == SessionStatus::Ended { "ended" } else { "unstarted" },
                self.id
            );
            return Applied::Ignored;
        }

        self.clock = self.clock.max(event.seq);

        match &event.payload {
            EventPayload::Stroke { path } => {
                let mut path = path.clone();
                path.refresh_rendered_form();
                let index = self.insert(StrokeEntry {
                    path,
                    author_id: event.author_id.clone(),
                    seq: event.seq,
                });
                self.last_modified = event.timestamp;
                Applied::Stroke { index }
            }
            EventPayload::Joined { collaborator } => {
                log::debug!("Collaborator {} joined {}", collaborator.id, self.id);
                self.upsert(collaborator.clone());
                Applied::Joined(collaborator.id.clone())
            }
            EventPayload::Left { collaborator_id } => {
                if !self.mark_left(collaborator_id, event.timestamp) {
                    log::debug!("Left event for unknown collaborator {}", collaborator_id);
                }
                Applied::Left(collaborator_id.clone())
            }
        }
    }
}
