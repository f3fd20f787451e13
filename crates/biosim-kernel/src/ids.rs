//! Identifiers and principals.
//!
//! Every registry keeps its own monotonic counter. Ids start at 1, are never
//! reused, and are assigned at creation time (`next = last + 1`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// An opaque caller/account identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Self(value)
    }
}

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

registry_id!(
    /// Universe id (hierarchy registry).
    UniverseId
);
registry_id!(
    /// Ecosystem id (hierarchy registry).
    EcosystemId
);
registry_id!(
    /// Species token id (asset registry).
    SpeciesId
);
registry_id!(
    /// AI model id (prediction registry).
    ModelId
);
registry_id!(
    /// Ecosystem prediction id (prediction registry).
    PredictionId
);
registry_id!(
    /// Marketplace listing id.
    ListingId
);

/// Monotonic id source owned by one registry.
///
/// Serialized as the last assigned id so a reloaded registry resumes at the
/// correct next id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdCounter {
    last: u64,
}

impl IdCounter {
    /// Counter that has already handed out `last`.
    pub fn resume(last: u64) -> Self {
        Self { last }
    }

    /// Last assigned id, `0` when nothing was created yet.
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Id the next call to [`IdCounter::assign`] will return.
    pub fn peek(&self) -> u64 {
        self.last + 1
    }

    pub fn assign(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
