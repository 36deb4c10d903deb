//! Params-directory flag store.
//!
//! Each flag is a file named after its key holding a decimal integer, the layout the
//! vehicle's settings UI writes to.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use navi_core::{parse_payload, FlagStore, NaviError, NaviResult};

/// Reads flags from `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct ParamsDirStore {
    root: PathBuf,
}

impl ParamsDirStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the flag files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FlagStore for ParamsDirStore {
    fn get_int(&self, key: &str) -> NaviResult<Option<i64>> {
        match std::fs::read_to_string(self.root.join(key)) {
            // Unparseable content reads as 0, like an empty param.
            Ok(content) => Ok(Some(parse_payload(content.trim()).unwrap_or(0))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NaviError::FlagStore {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
