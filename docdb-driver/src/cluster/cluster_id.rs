use std::fmt;
use uuid::Uuid;

/// Identifies one logical cluster for diagnostics. A new value is minted every time a cluster is
/// created, so events from separate clients never share an id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId {
    value: String,
    description: Option<String>,
}

impl ClusterId {
    pub fn new(description: Option<String>) -> Self {
        ClusterId {
            value: Uuid::new_v4().simple().to_string(),
            description,
        }
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        ClusterId::new(None)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({})", self.value, description),
            None => f.write_str(&self.value),
        }
    }
}
