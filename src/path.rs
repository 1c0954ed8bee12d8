//! Path normalization.
//!
//! The packet filter reports programs by kernel device path
//! (`\Device\HarddiskVolume3\Windows\notepad.exe`). Users and the rule store
//! speak drive-letter paths (`C:\Windows\notepad.exe`). A [`PathNormalizer`]
//! maps the former to the latter before the path is case folded and used as a
//! dedup key.

use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::instrument;

const DEVICE_ROOT: &str = r"\device\";

/// Translates raw event paths into user-facing paths.
pub trait PathNormalizer: Send + Sync {
    /// Normalizes a raw path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be translated. The event carrying
    /// it is then discarded.
    fn normalize(&self, raw: &str) -> Result<String>;
}

/// Passes every path through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNormalizer;

impl PathNormalizer for IdentityNormalizer {
    fn normalize(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }
}

/// Maps `\Device\<Volume>` prefixes to drive letters.
///
/// The device name is everything before the third backslash. Matching is
/// case-insensitive. Paths outside `\Device\` pass through unchanged; device
/// paths with no mapping are rejected.
#[derive(Debug, Default, Clone)]
pub struct DevicePathNormalizer {
    /// Lowercased device name to drive, e.g. `\device\harddiskvolume3` to `C:`.
    devices: BTreeMap<String, String>,
}

impl DevicePathNormalizer {
    /// Creates a normalizer with no device mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer from a device to drive table.
    #[must_use]
    pub fn from_map<I, K, V>(devices: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut normalizer = Self::new();
        for (device, drive) in devices {
            normalizer = normalizer.with_device(device.as_ref(), drive);
        }
        normalizer
    }

    /// Adds a device mapping.
    #[must_use]
    pub fn with_device(mut self, device: &str, drive: impl Into<String>) -> Self {
        let key = device.trim_end_matches('\\').to_lowercase();
        self.devices.insert(key, drive.into());
        self
    }

    /// Returns the number of configured devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no devices are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Splits a device path at its third backslash.
    ///
    /// Returns `(device, rest)`, where `rest` keeps its leading backslash.
    fn split_device(raw: &str) -> Option<(&str, &str)> {
        let (index, _) = raw.match_indices('\\').nth(2)?;
        Some(raw.split_at(index))
    }
}

impl PathNormalizer for DevicePathNormalizer {
    #[instrument(skip(self), level = "trace")]
    fn normalize(&self, raw: &str) -> Result<String> {
        let is_device = raw
            .get(..DEVICE_ROOT.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DEVICE_ROOT));
        if !is_device {
            return Ok(raw.to_string());
        }

        let (device, rest) = Self::split_device(raw)
            .ok_or_else(|| Error::InvalidInput(format!("malformed device path: {raw}")))?;

        let drive = self
            .devices
            .get(&device.to_lowercase())
            .filter(|drive| !drive.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("unknown device: {device}")))?;

        Ok(format!("{drive}{rest}"))
    }
}
