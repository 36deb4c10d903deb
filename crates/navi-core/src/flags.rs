//! Persisted feature-flag lookup.

use crate::error::NaviResult;

/// Key of the "map enabled" flag.
pub const MAP_ENABLE_KEY: &str = "OpkrMapEnable";

/// Read access to integer feature flags.
///
/// Implementations may hit the filesystem; the reconciler calls them at a coarse,
/// rate-limited cadence only.
pub trait FlagStore {
    /// Read flag `key`. `Ok(None)` means the flag is not set.
    fn get_int(&self, key: &str) -> NaviResult<Option<i64>>;
}

/// A flag store returning the same value for every key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedFlags(pub Option<i64>);

impl FlagStore for FixedFlags {
    fn get_int(&self, _key: &str) -> NaviResult<Option<i64>> {
        Ok(self.0)
    }
}

impl<T: FlagStore + ?Sized> FlagStore for &T {
    fn get_int(&self, key: &str) -> NaviResult<Option<i64>> {
        (**self).get_int(key)
    }
}
