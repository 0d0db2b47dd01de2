//! Commands sent while establishing a connection.
pub mod authenticate;
pub mod handshake;
pub mod sasl;
pub mod status_probe;

use crate::document::{command_name, Document};

/// Database which receives handshake and status commands.
pub const ADMIN_DATABASE: &str = "admin";

/// Commands whose bodies must never be published to listeners or logs.
pub const SECURITY_SENSITIVE_COMMANDS: &[&str] = &[
    "authenticate",
    "saslStart",
    "saslContinue",
    "getnonce",
    "createUser",
    "updateUser",
    "copydbgetnonce",
    "copydbsaslstart",
    "copydb",
];

/// Checks if a command (or its reply) may carry secrets. Handshakes are sensitive only when they
/// piggyback the first authentication step.
pub fn is_security_sensitive(command: &Document) -> bool {
    match command_name(command) {
        Some(name) if handshake::is_handshake_command_name(name) => {
            command.contains_key(handshake::SPECULATIVE_AUTHENTICATE)
        }
        Some(name) => SECURITY_SENSITIVE_COMMANDS
            .iter()
            .any(|sensitive| sensitive.eq_ignore_ascii_case(name)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::command_document;
    use serde_json::json;

    #[test]
    fn should_detect_sensitive_commands() {
        assert!(is_security_sensitive(&command_document("saslStart")));
        assert!(is_security_sensitive(&command_document("saslcontinue")));
        assert!(!is_security_sensitive(&command_document("ping")));
        assert!(!is_security_sensitive(&Document::new()));
    }

    #[test]
    fn should_treat_handshake_as_sensitive_only_with_speculative_payload() {
        let mut handshake = command_document("isMaster");
        assert!(!is_security_sensitive(&handshake));

        handshake.insert(
            handshake::SPECULATIVE_AUTHENTICATE.into(),
            json!({"saslStart": 1}),
        );
        assert!(is_security_sensitive(&handshake));
    }
}
