//! Wire compression is negotiated during the handshake: the client sends the names of the
//! compressors it can use, in priority order, and the server replies with the subset it accepts.
//! Messages are compressed by the transport once a compressor has been agreed upon.
use derive_more::Display;
use itertools::Itertools;
use std::str::FromStr;

use crate::error::Error;

pub const SNAPPY: &str = "snappy";
pub const ZLIB: &str = "zlib";
pub const ZSTD: &str = "zstd";

/// Compressor which can be requested during the handshake. Levels are passed to the compressing
/// transport and are not part of the negotiation.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Display)]
pub enum Compressor {
    /// [snappy](https://github.com/google/snappy) compression
    #[display("snappy")]
    Snappy,
    /// [zlib](https://zlib.net) compression
    #[display("zlib")]
    Zlib { level: Option<i8> },
    /// [zstd](https://github.com/facebook/zstd) compression
    #[display("zstd")]
    Zstd { level: Option<i8> },
}

impl Compressor {
    /// Name used in the handshake.
    pub fn name(&self) -> &'static str {
        match self {
            Compressor::Snappy => SNAPPY,
            Compressor::Zlib { .. } => ZLIB,
            Compressor::Zstd { .. } => ZSTD,
        }
    }

    pub fn level(&self) -> Option<i8> {
        match self {
            Compressor::Snappy => None,
            Compressor::Zlib { level } | Compressor::Zstd { level } => *level,
        }
    }
}

impl FromStr for Compressor {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            SNAPPY => Ok(Compressor::Snappy),
            ZLIB => Ok(Compressor::Zlib { level: None }),
            ZSTD => Ok(Compressor::Zstd { level: None }),
            _ => Err(Error::Configuration(format!("Unsupported compressor: {name}"))),
        }
    }
}

/// Formats compressor names for logging.
pub fn compressor_names(compressors: &[Compressor]) -> String {
    compressors.iter().map(Compressor::name).join(",")
}

/// Picks the first requested compressor which the server accepted.
pub fn negotiate<'a>(requested: &'a [Compressor], accepted: &[String]) -> Option<&'a Compressor> {
    requested
        .iter()
        .find(|compressor| accepted.iter().any(|name| name == compressor.name()))
}
