//! Signature primitives as seen by the harness.
//!
//! Callers allocate the output buffers (sized from the lengths the scheme
//! reports) so that allocation stays outside the timed region.

use crate::error::Result;

pub trait SignatureScheme {
    fn name(&self) -> &str;

    /// Declared lengths, as reported by the implementation.
    fn public_key_len(&self) -> usize;
    fn secret_key_len(&self) -> usize;
    /// Maximum signature length; an actual signature may be shorter.
    fn signature_len(&self) -> usize;

    /// Fill `public_key` and `secret_key` with a fresh key pair.
    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Result<()>;

    /// Sign `message` into `signature`, returning the number of bytes written.
    fn sign(&self, signature: &mut [u8], message: &[u8], secret_key: &[u8]) -> Result<usize>;

    /// `Ok(())` only if `signature` is valid for `message` under `public_key`.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()>;
}

/// Source of signature schemes, e.g. a loaded shared library.
///
/// Every `instantiate` call returns an independent handle; handles are never
/// shared between scenarios or threads.
pub trait SchemeProvider: Sync {
    /// Human-readable origin (library path, test fixture name).
    fn describe(&self) -> String;

    fn available_schemes(&self) -> Vec<String>;

    fn instantiate<'a>(&'a self, name: &str) -> Result<Box<dyn SignatureScheme + 'a>>;
}
