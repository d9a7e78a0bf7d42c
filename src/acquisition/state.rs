// src/acquisition/state.rs
//! Host-side connection and session state

use crate::error::{AcqError, AcqResult};
use crate::protocol::StatusKind;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// What a connected host is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Calibrating,
    Recording,
}

/// Recording and calibrating only exist inside a connection, so the
/// "connected" flag cannot disagree with the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connected(SessionPhase),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connected(SessionPhase::Idle) => f.write_str("connected"),
            ConnectionState::Connected(SessionPhase::Calibrating) => f.write_str("calibrating"),
            ConnectionState::Connected(SessionPhase::Recording) => f.write_str("recording"),
        }
    }
}

/// Control actions a front end can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Connect,
    Disconnect,
    Calibrate,
    StartRecording,
    StopRecording,
    SelectUser,
}

impl ControlAction {
    pub fn name(&self) -> &'static str {
        match self {
            ControlAction::Connect => "connect",
            ControlAction::Disconnect => "disconnect",
            ControlAction::Calibrate => "calibrate",
            ControlAction::StartRecording => "start recording",
            ControlAction::StopRecording => "stop recording",
            ControlAction::SelectUser => "select user",
        }
    }
}

/// Which actions are enabled right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermittedActions {
    pub connect: bool,
    pub disconnect: bool,
    pub calibrate: bool,
    pub start: bool,
    pub stop: bool,
    pub select_user: bool,
}

impl PermittedActions {
    pub fn allows(&self, action: ControlAction) -> bool {
        match action {
            ControlAction::Connect => self.connect,
            ControlAction::Disconnect => self.disconnect,
            ControlAction::Calibrate => self.calibrate,
            ControlAction::StartRecording => self.start,
            ControlAction::StopRecording => self.stop,
            ControlAction::SelectUser => self.select_user,
        }
    }
}

/// Connection state plus the user recordings are filed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConnectionState {
    connection: ConnectionState,
    selected_user: u32,
}

impl Default for HostConnectionState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl HostConnectionState {
    pub fn new(selected_user: u32) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            selected_user,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        match self.connection {
            ConnectionState::Disconnected => None,
            ConnectionState::Connected(phase) => Some(phase),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase().is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == Some(SessionPhase::Recording)
    }

    pub fn is_calibrating(&self) -> bool {
        self.phase() == Some(SessionPhase::Calibrating)
    }

    pub fn selected_user(&self) -> u32 {
        self.selected_user
    }

    pub fn permitted(&self) -> PermittedActions {
        let phase = self.phase();
        PermittedActions {
            connect: phase.is_none(),
            disconnect: phase.is_some(),
            calibrate: phase == Some(SessionPhase::Idle),
            start: phase == Some(SessionPhase::Idle),
            stop: phase == Some(SessionPhase::Recording),
            select_user: !matches!(phase, Some(SessionPhase::Recording | SessionPhase::Calibrating)),
        }
    }

    /// `Ok` if `action` is permitted, otherwise `InvalidState`
    pub fn check(&self, action: ControlAction) -> AcqResult<()> {
        if self.permitted().allows(action) {
            Ok(())
        } else {
            Err(AcqError::InvalidState {
                action: action.name(),
                state: self.connection.to_string(),
            })
        }
    }

    pub fn on_connected(&mut self) {
        self.connection = ConnectionState::Connected(SessionPhase::Idle);
    }

    pub fn on_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }

    /// Idle to Recording
    pub fn begin_recording(&mut self) -> AcqResult<()> {
        self.check(ControlAction::StartRecording)?;
        self.connection = ConnectionState::Connected(SessionPhase::Recording);
        Ok(())
    }

    /// Recording to Idle. Returns false (and changes nothing) otherwise.
    pub fn end_recording(&mut self) -> bool {
        if self.is_recording() {
            self.connection = ConnectionState::Connected(SessionPhase::Idle);
            true
        } else {
            false
        }
    }

    pub fn select_user(&mut self, user: u32) -> AcqResult<()> {
        self.check(ControlAction::SelectUser)?;
        self.selected_user = user;
        Ok(())
    }

    /// Apply a classified status line. Returns true if the phase changed.
    pub fn on_status(&mut self, kind: StatusKind) -> bool {
        let next = match (self.connection, kind) {
            (ConnectionState::Connected(SessionPhase::Idle), StatusKind::CalibrationPrompt) => {
                SessionPhase::Calibrating
            }
            (ConnectionState::Connected(SessionPhase::Calibrating), StatusKind::CalibrationComplete) => {
                SessionPhase::Idle
            }
            (ConnectionState::Connected(SessionPhase::Recording), StatusKind::CalibrationPrompt) => {
                warn!("calibration prompt received while recording; staying in recording");
                return false;
            }
            _ => return false,
        };
        debug!(from = %self.connection, to = ?next, "session phase changed");
        self.connection = ConnectionState::Connected(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_phase(phase: Option<SessionPhase>) -> HostConnectionState {
        let mut state = HostConnectionState::default();
        if let Some(phase) = phase {
            state.on_connected();
            state.connection = ConnectionState::Connected(phase);
        }
        state
    }

    #[test]
    fn test_permitted_action_table() {
        // (phase, calibrate, start, stop)
        let table = [
            (None, false, false, false),
            (Some(SessionPhase::Idle), true, true, false),
            (Some(SessionPhase::Calibrating), false, false, false),
            (Some(SessionPhase::Recording), false, false, true),
        ];
        for (phase, calibrate, start, stop) in table {
            let permitted = in_phase(phase).permitted();
            assert_eq!(
                (permitted.calibrate, permitted.start, permitted.stop),
                (calibrate, start, stop),
                "{phase:?}"
            );
        }
    }

    #[test]
    fn test_connect_and_user_selection_permissions() {
        let disconnected = in_phase(None).permitted();
        assert!(disconnected.connect && !disconnected.disconnect && disconnected.select_user);

        let idle = in_phase(Some(SessionPhase::Idle)).permitted();
        assert!(!idle.connect && idle.disconnect && idle.select_user);

        assert!(!in_phase(Some(SessionPhase::Recording)).permitted().select_user);
        assert!(!in_phase(Some(SessionPhase::Calibrating)).permitted().select_user);
    }

    #[test]
    fn test_calibration_status_flow() {
        let mut state = in_phase(Some(SessionPhase::Idle));
        assert!(state.on_status(StatusKind::CalibrationPrompt));
        assert!(state.is_calibrating());
        assert!(!state.on_status(StatusKind::CalibrationPrompt));
        assert!(!state.on_status(StatusKind::Info));
        assert!(state.on_status(StatusKind::CalibrationComplete));
        assert_eq!(state.phase(), Some(SessionPhase::Idle));
    }

    #[test]
    fn test_status_ignored_while_disconnected_or_recording() {
        let mut state = HostConnectionState::default();
        assert!(!state.on_status(StatusKind::CalibrationPrompt));
        assert_eq!(state.connection(), ConnectionState::Disconnected);

        let mut state = in_phase(Some(SessionPhase::Recording));
        assert!(!state.on_status(StatusKind::CalibrationPrompt));
        assert!(state.is_recording());
    }

    #[test]
    fn test_recording_transitions() {
        let mut state = HostConnectionState::default();
        assert!(matches!(state.begin_recording(), Err(AcqError::InvalidState { .. })));
        assert!(!state.end_recording());

        state.on_connected();
        state.begin_recording().unwrap();
        assert!(state.is_recording());
        assert!(state.select_user(2).is_err());
        assert!(state.end_recording());
        state.select_user(2).unwrap();
        assert_eq!(state.selected_user(), 2);
    }

    #[test]
    fn test_invalid_state_message() {
        let err = in_phase(None).check(ControlAction::Calibrate).unwrap_err();
        assert_eq!(err.to_string(), "action 'calibrate' not permitted while disconnected");
    }
}
