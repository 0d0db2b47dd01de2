//! The handshake command: capability probe, client metadata and the optional extensions which
//! are negotiated in the same round trip.
use serde_json::Value;

use crate::compression::Compressor;
use crate::document::{command_document, get_document, Document};

/// Capability probe understood by every server version.
pub const LEGACY_HELLO: &str = "isMaster";
/// Capability probe used when a server API version is declared.
pub const HELLO: &str = "hello";
pub const CLIENT: &str = "client";
pub const COMPRESSION: &str = "compression";
pub const SASL_SUPPORTED_MECHS: &str = "saslSupportedMechs";
pub const SPECULATIVE_AUTHENTICATE: &str = "speculativeAuthenticate";

#[inline]
pub fn is_handshake_command_name(name: &str) -> bool {
    name == HELLO || name.eq_ignore_ascii_case(LEGACY_HELLO)
}

/// Outbound handshake. Only the capability probe is mandatory; every other field is present only
/// when configured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandshakeCommand {
    use_hello: bool,
    client_metadata: Option<Document>,
    compressors: Vec<Compressor>,
    sasl_supported_mechs: Option<String>,
    speculative_authenticate: Option<Document>,
}

impl HandshakeCommand {
    /// Creates a handshake using either `hello` or the legacy probe.
    pub fn new(use_hello: bool) -> Self {
        HandshakeCommand {
            use_hello,
            ..Default::default()
        }
    }

    pub fn with_client_metadata(mut self, client_metadata: Option<Document>) -> Self {
        self.client_metadata = client_metadata;
        self
    }

    pub fn with_compressors(mut self, compressors: &[Compressor]) -> Self {
        self.compressors = compressors.to_vec();
        self
    }

    /// Asks the server to list the mechanisms available for `<source>.<user>`.
    pub fn with_sasl_supported_mechs(mut self, source: &str, user_name: &str) -> Self {
        self.sasl_supported_mechs = Some(format!("{source}.{user_name}"));
        self
    }

    pub fn with_speculative_authenticate(mut self, payload: Option<Document>) -> Self {
        self.speculative_authenticate = payload;
        self
    }

    #[inline]
    pub fn command_name(&self) -> &'static str {
        if self.use_hello {
            HELLO
        } else {
            LEGACY_HELLO
        }
    }

    #[inline]
    pub fn sasl_supported_mechs(&self) -> Option<&str> {
        self.sasl_supported_mechs.as_deref()
    }

    #[inline]
    pub fn speculative_authenticate(&self) -> Option<&Document> {
        self.speculative_authenticate.as_ref()
    }

    pub fn into_document(self) -> Document {
        let mut command = command_document(self.command_name());

        if self.use_hello {
            command.insert("helloOk".into(), Value::from(true));
        }

        if let Some(client_metadata) = self.client_metadata {
            command.insert(CLIENT.into(), Value::Object(client_metadata));
        }

        if !self.compressors.is_empty() {
            command.insert(
                COMPRESSION.into(),
                Value::Array(
                    self.compressors
                        .iter()
                        .map(|compressor| Value::from(compressor.name()))
                        .collect(),
                ),
            );
        }

        if let Some(sasl_supported_mechs) = self.sasl_supported_mechs {
            command.insert(SASL_SUPPORTED_MECHS.into(), Value::from(sasl_supported_mechs));
        }

        if let Some(speculative_authenticate) = self.speculative_authenticate {
            command.insert(
                SPECULATIVE_AUTHENTICATE.into(),
                Value::Object(speculative_authenticate),
            );
        }

        command
    }
}

impl From<HandshakeCommand> for Document {
    #[inline]
    fn from(command: HandshakeCommand) -> Self {
        command.into_document()
    }
}

/// Extracts the speculative authentication reply, if the server accepted the first step.
pub fn speculative_authenticate_reply(reply: &Document) -> Option<Document> {
    get_document(reply, SPECULATIVE_AUTHENTICATE).cloned()
}
