// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static per-link capacities.
//!
//! Devices are addressed by a numeric index derived from their identifier,
//! and the capacity table maps directed `(src, dst)` index pairs to a
//! capacity in Mbps. The table is loaded once when the application
//! activates and is read-only afterwards.

use crate::error::ConfigError;
use crate::types::{DeviceId, Link};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

/// Maps device identifiers to capacity table indices by stripping a fixed
/// prefix and parsing the rest as an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIndexer {
    prefix: String,
    radix: u32,
}

impl Default for DeviceIndexer {
    fn default() -> Self {
        Self {
            prefix: crate::DEFAULT_DEVICE_PREFIX.to_owned(),
            radix: crate::DEFAULT_DEVICE_INDEX_RADIX,
        }
    }
}

impl DeviceIndexer {
    pub fn new(
        prefix: impl Into<String>,
        radix: u32,
    ) -> Result<Self, ConfigError> {
        if !(2..=36).contains(&radix) {
            return Err(ConfigError::Invalid(format!(
                "device index radix {radix} not in 2..=36"
            )));
        }
        Ok(Self {
            prefix: prefix.into(),
            radix,
        })
    }

    pub fn index(&self, device: &DeviceId) -> Result<usize, ConfigError> {
        let digits = device.0.strip_prefix(self.prefix.as_str()).ok_or_else(
            || ConfigError::DeviceIndex {
                device: device.to_string(),
                reason: format!("missing prefix {:?}", self.prefix),
            },
        )?;
        usize::from_str_radix(digits, self.radix).map_err(|e| {
            ConfigError::DeviceIndex {
                device: device.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityMatrix {
    entries: BTreeMap<(usize, usize), f64>,
}

impl CapacityMatrix {
    /// Build a table from `(src, dst, mbps)` entries. Capacities must be
    /// finite and non-negative, each directed pair may appear once, and the
    /// table may not be empty.
    pub fn from_entries<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut m = Self::default();
        for (i, (src, dst, mbps)) in entries.into_iter().enumerate() {
            m.insert(i + 1, src, dst, mbps)?;
        }
        if m.entries.is_empty() {
            return Err(ConfigError::EmptyCapacity);
        }
        Ok(m)
    }

    /// Parse a capacity table. Each non-blank line that does not start
    /// with `#` holds `<src-index> <dst-index> <mbps>`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut m = Self::default();
        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [src, dst, mbps] = fields.as_slice() else {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    reason: format!(
                        "expected 3 fields, found {}",
                        fields.len()
                    ),
                });
            };
            let syntax = |what: &str, e: &dyn std::fmt::Display| {
                ConfigError::Syntax {
                    line: line_no,
                    reason: format!("{what}: {e}"),
                }
            };
            let src: usize =
                src.parse().map_err(|e| syntax("source index", &e))?;
            let dst: usize =
                dst.parse().map_err(|e| syntax("destination index", &e))?;
            let mbps: f64 = mbps.parse().map_err(|e| syntax("capacity", &e))?;
            m.insert(line_no, src, dst, mbps)?;
        }
        if m.entries.is_empty() {
            return Err(ConfigError::EmptyCapacity);
        }
        Ok(m)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::parse(&text)
    }

    fn insert(
        &mut self,
        line: usize,
        src: usize,
        dst: usize,
        mbps: f64,
    ) -> Result<(), ConfigError> {
        if !mbps.is_finite() || mbps < 0.0 {
            return Err(ConfigError::InvalidCapacity {
                src,
                dst,
                value: mbps,
            });
        }
        match self.entries.entry((src, dst)) {
            Entry::Occupied(_) => {
                Err(ConfigError::DuplicateCapacity { line, src, dst })
            }
            Entry::Vacant(e) => {
                e.insert(mbps);
                Ok(())
            }
        }
    }

    /// Capacity from `src` to `dst` in Mbps. Pairs without an entry report
    /// zero.
    pub fn get(&self, src: usize, dst: usize) -> f64 {
        self.entry(src, dst).unwrap_or(0.0)
    }

    pub fn entry(&self, src: usize, dst: usize) -> Option<f64> {
        self.entries.get(&(src, dst)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every device indexes and every active link has a
    /// capacity entry.
    pub fn validate_topology(
        &self,
        indexer: &DeviceIndexer,
        devices: &[DeviceId],
        links: &[Link],
    ) -> Result<(), ConfigError> {
        for d in devices {
            indexer.index(d)?;
        }
        for l in links.iter().filter(|l| l.is_active()) {
            let src = indexer.index(&l.src.device)?;
            let dst = indexer.index(&l.dst.device)?;
            if self.entry(src, dst).is_none() {
                return Err(ConfigError::MissingCapacity(l.to_string()));
            }
        }
        Ok(())
    }
}
