//! Client metadata sent in the `client` field of the handshake. Servers log it and show it in
//! diagnostics, so it describes the application, the driver and the host it runs on.
use itertools::Itertools;
use serde_json::{json, Value};

use crate::document::Document;
use crate::error::{Error, Result};

pub const DRIVER_NAME: &str = "docdb-rust";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const MAX_METADATA_SIZE: usize = 512;
const MAX_APPLICATION_NAME_SIZE: usize = 128;
const SEPARATOR: &str = "|";

/// Information about libraries wrapping this driver. Each entry is appended to the driver's own
/// name, version and platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverInformation {
    names: Vec<String>,
    versions: Vec<String>,
    platforms: Vec<String>,
}

impl DriverInformation {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_name<S: ToString>(mut self, name: S) -> Self {
        self.names.push(name.to_string());
        self
    }

    pub fn with_version<S: ToString>(mut self, version: S) -> Self {
        self.versions.push(version.to_string());
        self
    }

    pub fn with_platform<S: ToString>(mut self, platform: S) -> Self {
        self.platforms.push(platform.to_string());
        self
    }
}

fn join_with(base: &str, extra: &[String]) -> String {
    std::iter::once(base).chain(extra.iter().map(String::as_str)).join(SEPARATOR)
}

fn os_type() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        _ => "Unknown",
    }
}

fn encoded_size(document: &Document) -> usize {
    serde_json::to_vec(document)
        .map(|encoded| encoded.len())
        .unwrap_or(usize::MAX)
}

/// Builds the `client` document. Optional parts are dropped to stay within the server's size
/// limit; `None` is returned if even the minimal document does not fit.
pub fn client_metadata_document(
    application_name: Option<&str>,
    driver_information: &DriverInformation,
) -> Result<Option<Document>> {
    let mut document = Document::new();

    if let Some(application_name) = application_name {
        if application_name.len() > MAX_APPLICATION_NAME_SIZE {
            return Err(Error::Configuration(format!(
                "Application name exceeds {MAX_APPLICATION_NAME_SIZE} bytes: {application_name}"
            )));
        }

        document.insert("application".into(), json!({ "name": application_name }));
    }

    document.insert(
        "driver".into(),
        json!({
            "name": join_with(DRIVER_NAME, &driver_information.names),
            "version": join_with(DRIVER_VERSION, &driver_information.versions),
        }),
    );
    document.insert(
        "os".into(),
        json!({
            "type": os_type(),
            "name": std::env::consts::OS,
            "architecture": std::env::consts::ARCH,
        }),
    );
    document.insert(
        "platform".into(),
        Value::from(join_with("Rust", &driver_information.platforms)),
    );

    if encoded_size(&document) <= MAX_METADATA_SIZE {
        return Ok(Some(document));
    }

    document.remove("platform");
    if encoded_size(&document) <= MAX_METADATA_SIZE {
        return Ok(Some(document));
    }

    document.insert("os".into(), json!({ "type": os_type() }));
    if encoded_size(&document) <= MAX_METADATA_SIZE {
        return Ok(Some(document));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::get_document;

    #[test]
    fn should_describe_application_driver_and_os() {
        let document = client_metadata_document(Some("inventory"), &Default::default())
            .unwrap()
            .unwrap();

        assert_eq!(document["application"], json!({"name": "inventory"}));
        assert_eq!(document["driver"]["name"], json!(DRIVER_NAME));
        assert_eq!(document["driver"]["version"], json!(DRIVER_VERSION));
        assert_eq!(
            get_document(&document, "os").unwrap()["architecture"],
            json!(std::env::consts::ARCH)
        );
        assert_eq!(document["platform"], json!("Rust"));
    }

    #[test]
    fn should_append_wrapping_library_information() {
        let info = DriverInformation::new()
            .with_name("odm")
            .with_version("2.0")
            .with_platform("tokio");
        let document = client_metadata_document(None, &info).unwrap().unwrap();

        assert!(!document.contains_key("application"));
        assert_eq!(document["driver"]["name"], json!("docdb-rust|odm"));
        assert_eq!(
            document["driver"]["version"],
            json!(format!("{DRIVER_VERSION}|2.0"))
        );
        assert_eq!(document["platform"], json!("Rust|tokio"));
    }

    #[test]
    fn should_drop_platform_when_too_large() {
        let info = DriverInformation::new().with_platform("p".repeat(400));
        let document = client_metadata_document(Some("app"), &info)
            .unwrap()
            .unwrap();

        assert!(!document.contains_key("platform"));
        assert!(document.contains_key("os"));
    }

    #[test]
    fn should_reject_long_application_name() {
        assert!(client_metadata_document(Some(&"a".repeat(129)), &Default::default()).is_err());
    }

    #[test]
    fn should_give_up_when_driver_information_does_not_fit() {
        let info = DriverInformation::new().with_name("n".repeat(600));
        assert_eq!(client_metadata_document(None, &info).unwrap(), None);
    }
}
