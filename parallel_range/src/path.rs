//! Object path parsing.
//!
//! Accepted form: `[scheme://]container/key`. The scheme is optional and
//! ignored. The container name is limited to `[-_.a-z0-9]`, matched without
//! regard to case and kept as written; the key is everything after the first
//! separator and may contain further separators.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ReaderError;

static OBJECT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*://)?(?P<container>[\-_.a-z0-9]+)[/\\](?P<key>.*)$")
        .expect("object path pattern is valid")
});

/// A parsed `container/key` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    pub container: String,
    pub key: String,
}

impl ObjectPath {
    /// Parses an object path.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Config`] when the input has no container segment,
    /// the container contains characters outside `[-_.a-zA-Z0-9]`, or the key is
    /// empty.
    pub fn parse(input: &str) -> Result<Self, ReaderError> {
        let caps = OBJECT_PATH
            .captures(input.trim())
            .ok_or_else(|| ReaderError::Config(format!("malformed object path: {input:?}")))?;

        let container = caps["container"].to_string();
        let key = caps["key"].to_string();
        if key.is_empty() {
            return Err(ReaderError::Config(format!(
                "object path {input:?} has no key"
            )));
        }

        Ok(Self { container, key })
    }

    /// Last segment of the key.
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.key.as_str())
    }
}

impl FromStr for ObjectPath {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}
