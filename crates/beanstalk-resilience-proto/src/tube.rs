//! Tube and tube-set names.
//!
//! These carry no connection; commands that need them take them by
//! reference so whichever [`Conn`](crate::Conn) is live at call time
//! receives the `use` / `watch` adjustments.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Longest tube name the server accepts.
pub const MAX_NAME_LEN: usize = 200;

/// Name of the tube every fresh connection uses and watches.
pub const DEFAULT_TUBE: &str = "default";

/// A single named tube.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tube {
    name: String,
}

impl Tube {
    /// Creates a tube handle; the name is validated when first sent.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The tube name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Tube {
    fn default() -> Self {
        Self::new(DEFAULT_TUBE)
    }
}

/// The set of tubes a reservation draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TubeSet {
    names: BTreeSet<String>,
}

impl TubeSet {
    /// Creates a tube set from the given names. Duplicates collapse.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The tube names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns true if `name` is part of the set.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of tubes in the set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the set names no tube.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn as_set(&self) -> &BTreeSet<String> {
        &self.names
    }
}

impl Default for TubeSet {
    fn default() -> Self {
        Self::new([DEFAULT_TUBE])
    }
}

/// Checks `name` against the server's tube-name grammar.
pub fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LEN {
        "name is too long"
    } else if name.starts_with('-') || !name.bytes().all(is_name_byte) {
        "name has bad char"
    } else {
        return Ok(());
    };

    Err(Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-+/;.$_()".contains(&b)
}
