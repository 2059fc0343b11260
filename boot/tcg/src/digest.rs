//! # Digest Engine
//!
//! Fixed-size digests of byte streams, and the PCR extend rule built on
//! them. TPM 1.2 uses SHA-1 throughout. [`Sha1Engine`] shares the HAL's
//! [`Digest::sha1`] and [`Digest::extend_sha1`].

use tcgboot_hal::Digest;

/// Hash algorithm used for measurements and extends
pub trait DigestEngine {
    /// Digest a byte stream
    fn digest(&self, data: &[u8]) -> Digest;

    /// Compute `Hash(value || measurement)`
    fn extend(&self, value: &Digest, measurement: &Digest) -> Digest;
}

/// SHA-1, as used by TPM 1.2
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Engine;

impl DigestEngine for Sha1Engine {
    fn digest(&self, data: &[u8]) -> Digest {
        Digest::sha1(data)
    }

    fn extend(&self, value: &Digest, measurement: &Digest) -> Digest {
        value.extend_sha1(measurement)
    }
}
