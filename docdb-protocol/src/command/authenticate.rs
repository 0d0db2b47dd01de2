use serde_json::Value;

use crate::authenticators::AuthMechanism;
use crate::document::{command_document, Document};

pub const AUTHENTICATE: &str = "authenticate";

/// Single-step `authenticate` command used by certificate-based authentication.
pub fn x509_authenticate_command(user_name: Option<&str>) -> Document {
    let mut command = command_document(AUTHENTICATE);
    command.insert(
        "mechanism".into(),
        Value::from(AuthMechanism::MongoX509.as_str()),
    );

    if let Some(user_name) = user_name {
        command.insert("user".into(), Value::from(user_name));
    }

    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_omit_user_when_not_given() {
        assert_eq!(
            Value::Object(x509_authenticate_command(None)),
            json!({"authenticate": 1, "mechanism": "MONGODB-X509"})
        );
        assert_eq!(
            Value::Object(x509_authenticate_command(Some("CN=client"))),
            json!({"authenticate": 1, "mechanism": "MONGODB-X509", "user": "CN=client"})
        );
    }
}
