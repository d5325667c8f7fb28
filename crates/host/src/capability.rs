//! Operations the untrusted UI may reach.

use crate::error::BridgeError;
use std::fmt;
use std::str::FromStr;

/// A channel name the UI is allowed to use.
///
/// Names are parsed once at the boundary; everything past it matches on the
/// enum, so adding a capability is a compile-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Run a command line in the shell session.
    TerminalCommand,
    /// Receive the raw output the shell prints.
    TerminalOutput,
}

/// How a capability is used from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// Request/response.
    Invoke,
    /// Event subscription.
    Subscribe,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::TerminalCommand, Capability::TerminalOutput];

    pub fn name(self) -> &'static str {
        match self {
            Self::TerminalCommand => "terminal-command",
            Self::TerminalOutput => "terminal-output",
        }
    }

    pub fn kind(self) -> CapabilityKind {
        match self {
            Self::TerminalCommand => CapabilityKind::Invoke,
            Self::TerminalOutput => CapabilityKind::Subscribe,
        }
    }

    /// Parse `name`, accepting it only for the given kind of use.
    pub fn parse_for(name: &str, kind: CapabilityKind) -> Result<Self, BridgeError> {
        let capability: Self = name.parse()?;
        if capability.kind() != kind {
            tracing::warn!(channel = name, ?kind, "Rejected channel used the wrong way");
            return Err(BridgeError::ChannelNotAllowed(name.to_string()));
        }
        Ok(capability)
    }
}

impl FromStr for Capability {
    type Err = BridgeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.name() == name)
            .ok_or_else(|| {
                tracing::warn!(channel = name, "Rejected channel outside the allow-list");
                BridgeError::ChannelNotAllowed(name.to_string())
            })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("terminal-command", Capability::TerminalCommand ; "command")]
    #[test_case("terminal-output", Capability::TerminalOutput ; "output")]
    fn allowed_names_parse(name: &str, expected: Capability) {
        assert_eq!(name.parse::<Capability>().ok(), Some(expected));
        assert_eq!(expected.to_string(), name);
    }

    #[test_case("save-file" ; "host only operation")]
    #[test_case("Terminal-Command" ; "case matters")]
    #[test_case("" ; "empty")]
    #[test_case("terminal-command " ; "trailing space")]
    fn other_names_are_rejected(name: &str) {
        match name.parse::<Capability>() {
            Err(e) => assert_eq!(e.to_string(), format!("channel \"{name}\" is not allowed")),
            Ok(capability) => panic!("{name:?} parsed as {capability:?}"),
        }
    }

    #[test]
    fn kinds_are_enforced() {
        assert!(Capability::parse_for("terminal-command", CapabilityKind::Invoke).is_ok());
        assert!(Capability::parse_for("terminal-output", CapabilityKind::Subscribe).is_ok());
        assert!(matches!(
            Capability::parse_for("terminal-output", CapabilityKind::Invoke),
            Err(BridgeError::ChannelNotAllowed(name)) if name == "terminal-output"
        ));
        assert!(Capability::parse_for("terminal-command", CapabilityKind::Subscribe).is_err());
    }
}
