use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

pub mod error;
pub mod harness;
pub mod ingest;
pub mod oqs;
pub mod record;
pub mod schema;
pub mod scheme;
pub mod summary;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BenchError, ParseError, Result};
pub use record::{BenchmarkRecord, LogSchema};

/// Build flavour of the signature implementation that produced a log.
#[derive(
    Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Variant {
    /// Portable reference implementation.
    #[default]
    #[serde(rename = "REF")]
    #[value(name = "ref")]
    Ref,
    /// AVX2-vectorized implementation.
    #[serde(rename = "AVX2")]
    #[value(name = "avx2")]
    Avx2,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Ref => "REF",
            Variant::Avx2 => "AVX2",
        }
    }
}

/// Digest applied to the message before signing.
#[derive(
    Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Prehash {
    /// Sign the message itself.
    #[default]
    None,
    Sha256,
    Sha512,
}

impl Prehash {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prehash::None => "none",
            Prehash::Sha256 => "sha256",
            Prehash::Sha512 => "sha512",
        }
    }

    /// Bytes handed to `sign`: the message or its digest.
    pub fn apply(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Prehash::None => message.to_vec(),
            Prehash::Sha256 => Sha256::digest(message).to_vec(),
            Prehash::Sha512 => Sha512::digest(message).to_vec(),
        }
    }
}
