use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, case-sensitive identifier of one tenant's state.
///
/// A `Ref` is the only isolation boundary in the backend: two requests that
/// resolve to the same ref share state, locks, and history. The backend
/// assigns no meaning to its contents beyond using it as a storage-key
/// segment, which is why construction normalizes surrounding slashes and
/// rejects path segments that could escape the ref's namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ref(String);

impl Ref {
    /// Build a ref from raw input, trimming leading and trailing `/`.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TypeError> {
        let raw = raw.as_ref();
        let trimmed = raw.trim_matches('/');
        let invalid = |reason| TypeError::InvalidRef {
            value: raw.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("ref is empty"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(invalid("ref contains control characters"));
        }
        for segment in trimmed.split('/') {
            match segment {
                "" => return Err(invalid("ref contains an empty path segment")),
                "." | ".." => return Err(invalid("ref contains a relative path segment")),
                _ => {}
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Join `child` below this ref, e.g. a tenant subject and a state path.
    pub fn join(&self, child: &str) -> Result<Self, TypeError> {
        Self::new(format!("{}/{}", self.0, child.trim_start_matches('/')))
    }

    /// The first path segment, used to count distinct tenants.
    pub fn root_segment(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ref {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ref {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ref> for String {
    fn from(value: Ref) -> Self {
        value.0
    }
}

impl std::str::FromStr for Ref {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.0)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
