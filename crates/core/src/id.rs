//! Record identifiers and their generation.
//!
//! Every persisted row is keyed by an opaque [`RecordId`] (UUID-backed).
//! Domain crates wrap it in typed newtypes via [`impl_record_id!`] so a
//! product id cannot be handed to an invoice lookup by accident.

use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::DomainError;

/// Opaque primary key of a persisted record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<RecordId> for Uuid {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("record id: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Declare a typed wrapper around [`RecordId`].
///
/// The wrapper keeps `#[serde(transparent)]` semantics up to the caller: the
/// newtype itself must be declared at the use site so its derives stay
/// visible there.
#[macro_export]
macro_rules! impl_record_id {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(id: $crate::RecordId) -> Self {
                Self(id)
            }

            pub fn record_id(&self) -> $crate::RecordId {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$crate::RecordId> for $t {
            fn from(value: $crate::RecordId) -> Self {
                Self(value)
            }
        }

        impl From<$t> for $crate::RecordId {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl core::str::FromStr for $t {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = s
                    .parse::<$crate::RecordId>()
                    .map_err(|_| $crate::DomainError::invalid_id(format!("{}: '{}'", $name, s)))?;
                Ok(Self(id))
            }
        }
    };
}

/// Marker error: the secure entropy source could not produce bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("secure entropy source unavailable")]
pub struct EntropyUnavailable;

/// Pluggable source of cryptographic-quality random bytes.
///
/// The production source is [`OsEntropy`]; tests inject a failing source to
/// exercise the clock-seeded fallback path of [`IdGenerator`].
pub trait EntropySource: Send + Sync {
    /// Fill `buf` with random bytes, or report the source as unavailable.
    fn fill(&self, buf: &mut [u8; 16]) -> Result<(), EntropyUnavailable>;
}

/// Operating-system entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8; 16]) -> Result<(), EntropyUnavailable> {
        OsRng.try_fill_bytes(buf).map_err(|_| EntropyUnavailable)
    }
}

/// Generates record identifiers.
///
/// The happy path draws 128 random bits from the entropy source and lays
/// them out as a v4 UUID. If the source is unavailable the generator falls
/// back to pseudo-random bits seeded from the nanosecond clock mixed with a
/// process-local counter; the counter keeps two same-tick calls distinct.
/// The fallback's collision resistance is weaker than 128 random bits and is
/// accepted for the offline, single-store use case.
pub struct IdGenerator {
    source: Box<dyn EntropySource>,
    fallback_seq: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_source(Box::new(OsEntropy))
    }

    pub fn with_source(source: Box<dyn EntropySource>) -> Self {
        Self {
            source,
            fallback_seq: AtomicU64::new(0),
        }
    }

    /// Produce the next identifier.
    pub fn next_id(&self) -> RecordId {
        let mut bytes = [0u8; 16];
        match self.source.fill(&mut bytes) {
            Ok(()) => RecordId(uuid::Builder::from_random_bytes(bytes).into_uuid()),
            Err(EntropyUnavailable) => self.fallback_id(),
        }
    }

    fn fallback_id(&self) -> RecordId {
        let seq = self.fallback_seq.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut rng = SmallRng::seed_from_u64(nanos ^ seq.rotate_left(32));
        let hi = nanos ^ seq.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        let lo = rng.next_u64();
        RecordId(Uuid::from_u128((u128::from(hi) << 64) | u128::from(lo)))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}
