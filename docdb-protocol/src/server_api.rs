use derive_more::Display;
use serde_json::Value;

use crate::document::Document;

/// Declared server API version.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ServerApiVersion {
    #[display("1")]
    V1,
}

/// Stable API declaration sent with every command, including the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerApi {
    version: ServerApiVersion,
    strict: Option<bool>,
    deprecation_errors: Option<bool>,
}

impl ServerApi {
    pub fn new(version: ServerApiVersion) -> Self {
        ServerApi {
            version,
            strict: None,
            deprecation_errors: None,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_deprecation_errors(mut self, deprecation_errors: bool) -> Self {
        self.deprecation_errors = Some(deprecation_errors);
        self
    }

    #[inline]
    pub fn version(&self) -> ServerApiVersion {
        self.version
    }

    /// Appends API fields to a command.
    pub fn append_to(&self, command: &mut Document) {
        command.insert("apiVersion".into(), Value::from(self.version.to_string()));

        if let Some(strict) = self.strict {
            command.insert("apiStrict".into(), Value::from(strict));
        }

        if let Some(deprecation_errors) = self.deprecation_errors {
            command.insert("apiDeprecationErrors".into(), Value::from(deprecation_errors));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::command_document;
    use serde_json::json;

    #[test]
    fn should_append_only_declared_fields() {
        let mut command = command_document("ping");
        ServerApi::new(ServerApiVersion::V1).append_to(&mut command);
        assert_eq!(Value::Object(command), json!({"ping": 1, "apiVersion": "1"}));

        let mut command = command_document("ping");
        ServerApi::new(ServerApiVersion::V1)
            .with_strict(true)
            .with_deprecation_errors(false)
            .append_to(&mut command);
        assert_eq!(
            Value::Object(command),
            json!({"ping": 1, "apiVersion": "1", "apiStrict": true, "apiDeprecationErrors": false})
        );
    }
}
