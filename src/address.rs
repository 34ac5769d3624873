//! IP address parsing, canonical form and dedup digests
//!
//! A line is a valid address only if the whole line is an IPv4 or IPv6
//! literal: no surrounding whitespace, no zone (`%eth0`), no prefix length.
//! IPv4-mapped IPv6 addresses canonicalize to their IPv4 form, so
//! `::ffff:10.0.0.1` and `10.0.0.1` are the same address.
//!
//! The digest is XXH64 (seed 0) of the canonical text. It is the only
//! identity the index sees, so two distinct addresses that collide are
//! counted once. For n distinct addresses the collision probability is
//! roughly n²/2⁶⁵, about 3e-8 for a billion addresses.

use std::fmt;
use std::net::IpAddr;
use xxhash_rust::xxh64::xxh64;

/// Seed for the XXH64 digest
const DIGEST_SEED: u64 = 0;

/// A syntactically valid IP address in canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedAddress(IpAddr);

impl ParsedAddress {
    /// Parse a line of text as an IP address
    pub fn parse(line: &str) -> Option<Self> {
        line.parse::<IpAddr>()
            .ok()
            .map(|ip| ParsedAddress(ip.to_canonical()))
    }

    /// Parse raw line bytes; non-UTF-8 input is never an address
    pub fn parse_bytes(line: &[u8]) -> Option<Self> {
        std::str::from_utf8(line).ok().and_then(Self::parse)
    }

    /// The canonical address
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    /// Canonical textual form
    pub fn canonical(&self) -> String {
        self.0.to_string()
    }

    /// Digest of the canonical form
    pub fn digest(&self) -> Digest {
        Digest::of_canonical(&self.canonical())
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 64-bit dedup identity of a canonical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(u64);

impl Digest {
    /// Digest an already-canonical textual address
    pub fn of_canonical(canonical: &str) -> Self {
        Digest(xxh64(canonical.as_bytes(), DIGEST_SEED))
    }

    /// Wrap a raw digest value
    pub const fn from_raw(value: u64) -> Self {
        Digest(value)
    }

    /// Raw digest value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Index key: the decimal text of the digest
    pub fn key(&self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    /// Decode an index key written by [`Digest::key`]
    pub fn from_key(key: &[u8]) -> Option<Self> {
        std::str::from_utf8(key).ok()?.parse().ok().map(Digest)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
