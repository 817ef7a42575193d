//! A canvas that may be shared with other participants.
//!
//! [`CollaborativeCanvas`] is the single owner of a drawing session and, while
//! collaborating, of its collaboration session and sync channel. Gestures,
//! history commands and remote events are all applied through `&mut self`,
//! so the three sources are serialized by construction.

use crate::canvas::DrawingSession;
use crate::collaboration::{Applied, CollaborationSession, Collaborator};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::input::GestureEvent;
use crate::stroke::{Path, now_millis};
use crate::sync::{ConnectionState, SyncChannel, SyncEvent, Transport};
use std::sync::Arc;

/// Input accepted by [`CollaborativeCanvas::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCommand {
    Gesture(GestureEvent),
    Undo,
    Redo,
    Clear,
    /// Apply everything the sync channel has received so far.
    PumpRemote,
}

impl From<GestureEvent> for CanvasCommand {
    fn from(event: GestureEvent) -> Self {
        CanvasCommand::Gesture(event)
    }
}

/// Drawing session plus optional collaboration.
pub struct CollaborativeCanvas {
    config: SessionConfig,
    me: Collaborator,
    drawing: DrawingSession,
    collaboration: Option<CollaborationSession>,
    channel: Option<SyncChannel>,
    /// Sync failures not yet collected by the host.
    failures: Vec<Error>,
}

impl CollaborativeCanvas {
    pub fn new(me: Collaborator, config: SessionConfig) -> Self {
        Self {
            drawing: DrawingSession::with_config(&config),
            config,
            me,
            collaboration: None,
            channel: None,
            failures: Vec::new(),
        }
    }

    /// Wrap an existing drawing, e.g. one restored from storage.
    pub fn with_drawing(me: Collaborator, config: SessionConfig, drawing: DrawingSession) -> Self {
        Self {
            drawing,
            ..Self::new(me, config)
        }
    }

    pub fn me(&self) -> &Collaborator {
        &self.me
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn drawing(&self) -> &DrawingSession {
        &self.drawing
    }

    /// Mutable access for style changes (tool, colour, width).
    pub fn drawing_mut(&mut self) -> &mut DrawingSession {
        &mut self.drawing
    }

    pub fn collaboration(&self) -> Option<&CollaborationSession> {
        self.collaboration.as_ref()
    }

    /// True while a collaboration session is active.
    pub fn is_collaborating(&self) -> bool {
        self.collaboration.as_ref().is_some_and(|c| c.is_active())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel
            .as_ref()
            .map_or(ConnectionState::Disconnected, SyncChannel::state)
    }

    // --- Commands ---

    /// Apply one command.
    pub fn handle(&mut self, command: CanvasCommand) {
        match command {
            CanvasCommand::Gesture(event) => {
                self.handle_gesture(event);
            }
            CanvasCommand::Undo => {
                self.undo();
            }
            CanvasCommand::Redo => {
                self.redo();
            }
            CanvasCommand::Clear => self.clear(),
            CanvasCommand::PumpRemote => {
                self.pump_remote();
            }
        }
    }

    /// Feed a gesture. When it completes a stroke, the stroke is committed
    /// locally and, while collaborating, published. Returns the committed
    /// path.
    pub fn handle_gesture(&mut self, event: GestureEvent) -> Option<Path> {
        let path = self.drawing.handle_gesture(event)?.clone();
        self.share_stroke(&path);
        Some(path)
    }

    fn share_stroke(&mut self, path: &Path) {
        let Some(collaboration) = self.collaboration.as_mut() else {
            return;
        };
        match collaboration.add_stroke(path.clone(), &self.me.id) {
            Ok(event) => self.publish(&event),
            Err(e) => log::debug!("Stroke kept local: {}", e),
        }
    }

    /// Undo the last visible stroke. While collaborating the shared history
    /// drops the same stroke too; this is not published.
    pub fn undo(&mut self) -> bool {
        let Some(id) = self.drawing.committed_paths().last().map(Path::id) else {
            return false;
        };
        if !self.drawing.undo() {
            return false;
        }
        if let Some(collaboration) = self.collaboration.as_mut().filter(|c| c.is_active()) {
            let _ = collaboration.undo_path(id);
        }
        true
    }

    /// Redo the last hidden stroke. While collaborating it goes back into
    /// the shared history, and the canvas follows the shared order.
    pub fn redo(&mut self) -> bool {
        if !self.drawing.redo() {
            return false;
        }
        let Some(collaboration) = self.collaboration.as_mut().filter(|c| c.is_active()) else {
            return true;
        };
        let Some(id) = self.drawing.committed_paths().last().map(Path::id) else {
            return true;
        };
        // Paths hidden by clear never left the shared history.
        let index = match collaboration.redo_path(id) {
            Ok(Some(index)) => Some(index),
            _ => collaboration.position_of(id),
        };
        if let Some(index) = index.filter(|i| i + 1 < collaboration.strokes().len()) {
            let position = canvas_position(collaboration, index, &self.drawing);
            self.drawing.move_last_to(position);
        }
        true
    }

    /// Clear the canvas. The shared history is untouched.
    pub fn clear(&mut self) {
        self.drawing.clear();
    }

    // --- Collaboration ---

    /// Share this canvas under `session_id`.
    ///
    /// Strokes already on the canvas seed the shared history and are
    /// published, followed by a `joined` announcement. Publish failures do
    /// not prevent the session from starting; they are reported through
    /// [`take_failures`](Self::take_failures).
    pub fn start_collaboration(
        &mut self,
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<()> {
        match &self.collaboration {
            Some(c) if c.is_active() => return Err(Error::SessionAlreadyActive),
            _ => {}
        }

        let session_id = session_id.into();
        let mut collaboration = CollaborationSession::new(session_id.clone(), self.config.ordering);
        collaboration.start(self.drawing.committed_paths().to_vec(), &self.me.id)?;
        collaboration.add_collaborator(self.me.clone())?;

        let channel = SyncChannel::open(session_id, transport, &self.config)?;

        let mut outgoing: Vec<SyncEvent> = collaboration
            .strokes()
            .iter()
            .map(|entry| SyncEvent::stroke(entry.path.clone(), &self.me.id, entry.seq))
            .collect();
        outgoing.push(SyncEvent::joined(self.me.clone(), collaboration.next_seq()));

        self.collaboration = Some(collaboration);
        self.channel = Some(channel);
        for event in &outgoing {
            self.publish(event);
        }
        Ok(())
    }

    /// Leave the shared session: announce departure (best effort), stop
    /// receiving and end the session. The canvas keeps its strokes.
    pub fn end_collaboration(&mut self) -> Result<()> {
        let Some(collaboration) = self.collaboration.as_mut() else {
            return Err(Error::SessionNotStarted);
        };
        if !collaboration.is_active() {
            return Err(Error::SessionEnded(collaboration.id().to_string()));
        }

        let left = SyncEvent::left(self.me.id.clone(), collaboration.next_seq());
        self.publish(&left);

        if let Some(mut channel) = self.channel.take() {
            channel.close();
            self.failures.extend(channel.take_failures());
        }
        if let Some(collaboration) = self.collaboration.as_mut() {
            collaboration.end();
        }
        Ok(())
    }

    /// Register a callback for every event received from other participants.
    pub fn on_remote_event(&mut self, handler: impl FnMut(&SyncEvent) + Send + 'static) -> Result<()> {
        match self.channel.as_mut() {
            Some(channel) => {
                channel.on_event(handler);
                Ok(())
            }
            None => Err(Error::SessionNotStarted),
        }
    }

    /// Apply every event received since the last pump. Returns how many
    /// events changed the session.
    pub fn pump_remote(&mut self) -> usize {
        let Some(channel) = self.channel.as_mut() else {
            return 0;
        };
        let events = channel.poll();
        self.failures.extend(channel.take_failures());

        let Some(collaboration) = self.collaboration.as_mut() else {
            return 0;
        };

        let mut applied = 0;
        for event in &events {
            match collaboration.apply(event) {
                Applied::Stroke { index } => {
                    applied += 1;
                    let path = collaboration.strokes()[index].path.clone();
                    if index + 1 == collaboration.strokes().len() {
                        self.drawing.apply_remote(path);
                    } else {
                        let position = canvas_position(collaboration, index, &self.drawing);
                        log::debug!("Placing remote stroke at {} to follow shared order", position);
                        self.drawing.insert_remote(position, path);
                    }
                }
                Applied::Joined(_) | Applied::Left(_) => applied += 1,
                Applied::Ignored => {}
            }
        }
        applied
    }

    /// Drop collaborators that left longer ago than the configured timeout.
    pub fn prune_inactive(&mut self) -> Vec<String> {
        let timeout = self.config.inactive_timeout();
        match self.collaboration.as_mut() {
            Some(c) => c.prune_inactive(now_millis(), timeout),
            None => Vec::new(),
        }
    }

    /// Take the sync failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.failures)
    }

    fn publish(&mut self, event: &SyncEvent) {
        let Some(channel) = self.channel.as_ref() else {
            return;
        };
        if let Err(e) = channel.publish(event) {
            log::warn!("Publish of {:?} event failed: {}", event.kind(), e);
            self.failures.push(e);
        }
    }
}

/// Where the shared stroke at `index` goes among the visible paths: right
/// after the closest earlier shared stroke still on the canvas.
fn canvas_position(collaboration: &CollaborationSession, index: usize, drawing: &DrawingSession) -> usize {
    let visible = drawing.committed_paths();
    collaboration.strokes()[..index]
        .iter()
        .rev()
        .find_map(|entry| visible.iter().position(|p| p.id() == entry.path.id()))
        .map_or(0, |position| position + 1)
}
