//! Command — the action a request asks its target to perform.
//!
//! The wire vocabulary is open (adapters hand us arbitrary strings), so the
//! enum carries an explicit [`Other`](Command::Other) arm. An unknown
//! command is *not* an error: targets fall through to the default
//! interaction-stamp behavior.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A command kind, parsed from its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    /// No-op; only refreshes the target's interaction timestamp.
    Dummy,
    /// Update the target's settings from the payload (unknown keys ignored).
    SetSettings,
    /// Echo the target's status back to the sender's outbound channel.
    GetStatus,
    /// Echo the target's settings back to the sender's outbound channel.
    GetSettings,
    /// Drive the target element's external state (e.g. turn a plug off).
    SetStatus,
    /// Render and send an alert through the target's outbound channel.
    SendAlert,
    /// Request a named mode transition.
    UpdateFsm,
    /// Signal that the current mode's duration timer fired.
    TimeoutFsm,
    /// Reset the detection counter after the grace window elapsed.
    TimeoutDetection,
    /// Accumulate a weighted detection event.
    DetectionEvent,
    /// Refresh the controller clock status.
    UpdateTime,
    /// Flip the day/night flag.
    UpdateTimelight,
    /// Update the aggregated door status.
    UpdateDoor,
    /// Update the aggregated window status.
    UpdateWindow,
    /// Update the averaged temperature.
    UpdateTemperature,
    /// Persist item settings for one or all categories.
    SaveSettings,
    /// Echo the identifiers of one item category back to the sender.
    GetList,
    /// Anything else — not handled, falls through to the default arm.
    Other(String),
}

impl Command {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dummy => "dummy_command",
            Self::SetSettings => "set_settings",
            Self::GetStatus => "get_status",
            Self::GetSettings => "get_settings",
            Self::SetStatus => "set_status",
            Self::SendAlert => "send_alert",
            Self::UpdateFsm => "update_fsm",
            Self::TimeoutFsm => "timeout_fsm",
            Self::TimeoutDetection => "timeout_detection",
            Self::DetectionEvent => "detection_event",
            Self::UpdateTime => "update_time",
            Self::UpdateTimelight => "update_timelight",
            Self::UpdateDoor => "update_door",
            Self::UpdateWindow => "update_window",
            Self::UpdateTemperature => "update_temperature",
            Self::SaveSettings => "update_settings",
            Self::GetList => "get_list",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "dummy_command" => Self::Dummy,
            "set_settings" => Self::SetSettings,
            "get_status" => Self::GetStatus,
            "get_settings" => Self::GetSettings,
            "set_status" => Self::SetStatus,
            "send_alert" => Self::SendAlert,
            "update_fsm" => Self::UpdateFsm,
            "timeout_fsm" => Self::TimeoutFsm,
            "timeout_detection" => Self::TimeoutDetection,
            "detection_event" => Self::DetectionEvent,
            "update_time" => Self::UpdateTime,
            "update_timelight" => Self::UpdateTimelight,
            "update_door" => Self::UpdateDoor,
            "update_window" => Self::UpdateWindow,
            "update_temperature" => Self::UpdateTemperature,
            "update_settings" => Self::SaveSettings,
            "get_list" => Self::GetList,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Command {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_known_wire_names() {
        assert_eq!(Command::from("set_status"), Command::SetStatus);
        assert_eq!(Command::from("detection_event"), Command::DetectionEvent);
        assert_eq!(Command::from("update_settings"), Command::SaveSettings);
    }

    #[test]
    fn should_keep_unknown_names_in_fallback_arm() {
        let cmd = Command::from("open_pod_bay_doors");
        assert_eq!(cmd, Command::Other("open_pod_bay_doors".to_string()));
        assert_eq!(cmd.as_str(), "open_pod_bay_doors");
    }

    #[test]
    fn should_roundtrip_every_wire_name_through_display() {
        for name in [
            "dummy_command",
            "set_settings",
            "get_status",
            "get_settings",
            "set_status",
            "send_alert",
            "update_fsm",
            "timeout_fsm",
            "timeout_detection",
            "detection_event",
            "update_time",
            "update_timelight",
            "update_door",
            "update_window",
            "update_temperature",
            "update_settings",
            "get_list",
        ] {
            assert_eq!(Command::from(name).to_string(), name);
        }
    }

    #[test]
    fn should_serialize_as_plain_wire_name() {
        let json = serde_json::to_string(&Command::SendAlert).unwrap();
        assert_eq!(json, "\"send_alert\"");
        let parsed: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Command::SendAlert);
    }
}
