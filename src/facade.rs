//! Operator intents translated into protocol commands.

use crate::error::{FillerError, Result};
use crate::protocol::Command;
use crate::session::SerialSession;
use crate::types::{ConnectionParams, FillParameters, Notification, SessionState};

/// Drives the filling machine through a `SerialSession`.
///
/// Tracks the last commanded repeat mode. The firmware does not confirm
/// `TOGGLE REPEAT`, so the flag reflects what was sent, not what the
/// machine accepted.
pub struct ControlFacade {
    session: SerialSession,
    repeat: bool,
}

impl Default for ControlFacade {
    fn default() -> Self {
        Self::new(SerialSession::new())
    }
}

impl ControlFacade {
    /// Facade over `session`, repeat mode off
    pub fn new(session: SerialSession) -> Self {
        Self {
            session,
            repeat: false,
        }
    }

    /// Connection and last commanded repeat mode
    pub fn state(&self) -> SessionState {
        if self.session.is_connected() {
            SessionState::Connected {
                repeat: self.repeat,
            }
        } else {
            SessionState::Disconnected
        }
    }

    /// Underlying session, e.g. for `notifications()`
    pub fn session(&self) -> &SerialSession {
        &self.session
    }

    /// Mutable session, e.g. for `set_wire_trace`
    pub fn session_mut(&mut self) -> &mut SerialSession {
        &mut self.session
    }

    /// Open a session with repeat mode off
    pub fn connect(&mut self, params: ConnectionParams) -> Result<()> {
        self.session.connect(params)?;
        self.repeat = false;
        Ok(())
    }

    /// Close the session and clear repeat mode
    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.repeat = false;
    }

    /// Connect when disconnected, disconnect otherwise
    pub fn toggle_connection(&mut self, params: ConnectionParams) -> Result<SessionState> {
        if self.session.is_connected() {
            self.disconnect();
        } else {
            self.connect(params)?;
        }
        Ok(self.state())
    }

    /// Configure the run and start it.
    ///
    /// Parameters are clamped into range, then sent as four `SET` lines and
    /// `START`. A failed write aborts the rest; nothing is rolled back.
    pub fn start(&mut self, params: &FillParameters) -> Result<()> {
        if !self.session.is_connected() {
            return Err(FillerError::NotConnected);
        }
        let lines = Command::start_sequence(&params.clamped()).map(|cmd| cmd.to_string());
        self.session.send_batch(&lines)?;
        log::info!("Started filling process");
        self.session.notify(Notification::info("Started filling process"));
        Ok(())
    }

    /// Send `STOP`. Inert while disconnected.
    pub fn stop(&mut self) -> Result<()> {
        if !self.session.is_connected() {
            log::debug!("Stop ignored while disconnected");
            return Ok(());
        }
        self.session.send(&Command::Stop.to_string())?;
        log::info!("Stopped filling process");
        self.session.notify(Notification::info("Stopped filling process"));
        Ok(())
    }

    /// Send `TOGGLE REPEAT` and flip the local flag once the write succeeded
    pub fn toggle_repeat(&mut self) -> Result<bool> {
        if !self.session.is_connected() {
            return Err(FillerError::NotConnected);
        }
        self.session.send(&Command::ToggleRepeat.to_string())?;
        self.repeat = !self.repeat;
        let status = if self.repeat {
            "Repeat mode ON"
        } else {
            "Repeat mode OFF"
        };
        log::info!("{}", status);
        self.session.notify(Notification::info(status));
        Ok(self.repeat)
    }

    /// Last commanded repeat mode
    pub fn repeat_enabled(&self) -> bool {
        self.repeat
    }
}
