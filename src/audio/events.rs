use crossbeam_channel::Sender;

use super::backend::{AudioBackend, DeckEvent};
use super::resources::{MediaSession, RemoteAction};
use super::transport::TransportController;
use crate::commands::{self, PlayerCommand};
use crate::error::EngineResult;

/// Seek distance of the seek-backward / seek-forward remote actions.
pub const SEEK_STEP_SECS: f64 = 10.0;

pub enum Message {
    Command(PlayerCommand),
    Deck(DeckEvent),
    Remote(RemoteAction),
}

#[derive(Debug, Default)]
pub struct EventBridge {
    registered_for: Option<u64>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_for(&self) -> Option<u64> {
        self.registered_for
    }

    /// Register the remote-action handlers for `controller_id`. A second call
    /// with the same id does nothing; a new id replaces every handler.
    pub fn bind(
        &mut self,
        session: &mut dyn MediaSession,
        controller_id: u64,
        tx: &Sender<Message>,
    ) -> EngineResult<bool> {
        if self.registered_for == Some(controller_id) {
            return Ok(false);
        }
        for action in RemoteAction::ALL {
            let tx = tx.clone();
            session.set_action_handler(
                action,
                Box::new(move || {
                    if tx.try_send(Message::Remote(action)).is_err() {
                        log::warn!("Dropped remote action {}", action.name());
                    }
                }),
            )?;
        }
        log::debug!("Remote actions bound to transport {}", controller_id);
        self.registered_for = Some(controller_id);
        Ok(true)
    }

    /// Route one message. Returns false when the engine should shut down.
    pub fn dispatch<B: AudioBackend>(
        &mut self,
        ctl: &mut TransportController<B>,
        message: Message,
    ) -> bool {
        let result = match message {
            Message::Command(PlayerCommand::Shutdown) => return false,
            Message::Command(cmd) => commands::apply(ctl, cmd),
            Message::Deck(event) => ctl.handle_deck_event(event),
            Message::Remote(action) => remote(ctl, action),
        };
        if let Err(e) = result {
            log::error!("{}", e);
        }
        true
    }
}

/// Map a remote action onto the transport.
pub fn remote<B: AudioBackend>(ctl: &mut TransportController<B>, action: RemoteAction) -> EngineResult<()> {
    log::debug!("Remote action: {}", action.name());
    match action {
        RemoteAction::Play => ctl.play(),
        RemoteAction::Pause => ctl.pause(),
        RemoteAction::PreviousTrack => ctl.prev(),
        RemoteAction::NextTrack => ctl.next(false),
        RemoteAction::SeekBackward => ctl.seek_relative(-SEEK_STEP_SECS),
        RemoteAction::SeekForward => ctl.seek_relative(SEEK_STEP_SECS),
    }
}
