//! Deterministic hash-based stand-in for a signature library.
//!
//! Not a signature scheme in any cryptographic sense: the "public key" is a
//! digest of the secret seed and a signature is `SHA-256(pk || msg)` padded
//! with zeros. Enough to exercise sizing, timing, and failure paths.

use crate::error::{BenchError, Result};
use crate::scheme::{SchemeProvider, SignatureScheme};
use sha2::{Digest, Sha256};

const PK_LEN: usize = 32;
const SK_LEN: usize = 64;
const DIGEST_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Instantiate,
    Keygen,
    Sign,
    Verify,
}

#[derive(Clone, Debug)]
pub struct ToySpec {
    pub name: String,
    /// Declared maximum signature length.
    pub declared_sig_len: usize,
    /// Bytes actually produced by `sign` (at least the digest length).
    pub actual_sig_len: usize,
    pub fail_at: Option<Phase>,
    /// Accept any signature, including corrupted ones.
    pub lenient: bool,
}

impl ToySpec {
    pub fn new(name: &str) -> Self {
        ToySpec {
            name: name.to_string(),
            declared_sig_len: 48,
            actual_sig_len: 48,
            fail_at: None,
            lenient: false,
        }
    }

    pub fn variable_length(mut self, declared: usize, actual: usize) -> Self {
        self.declared_sig_len = declared;
        self.actual_sig_len = actual;
        self
    }

    pub fn failing_at(mut self, phase: Phase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }
}

pub struct ToyProvider {
    specs: Vec<ToySpec>,
}

impl ToyProvider {
    pub fn new(specs: Vec<ToySpec>) -> Self {
        ToyProvider { specs }
    }
}

impl SchemeProvider for ToyProvider {
    fn describe(&self) -> String {
        "toy".to_string()
    }

    fn available_schemes(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    fn instantiate<'a>(&'a self, name: &str) -> Result<Box<dyn SignatureScheme + 'a>> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BenchError::UnknownScheme(name.to_string()))?;
        if spec.fail_at == Some(Phase::Instantiate) {
            return Err(BenchError::InstantiationFailed(name.to_string()));
        }
        Ok(Box::new(ToyScheme { spec }))
    }
}

struct ToyScheme<'a> {
    spec: &'a ToySpec,
}

impl ToyScheme<'_> {
    fn status(&self, phase: Phase) -> i32 {
        if self.spec.fail_at == Some(phase) {
            -1
        } else {
            0
        }
    }

    fn digest(public_key: &[u8], message: &[u8]) -> [u8; DIGEST_LEN] {
        let mut h = Sha256::new();
        h.update(public_key);
        h.update(message);
        h.finalize().into()
    }
}

impl SignatureScheme for ToyScheme<'_> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn public_key_len(&self) -> usize {
        PK_LEN
    }

    fn secret_key_len(&self) -> usize {
        SK_LEN
    }

    fn signature_len(&self) -> usize {
        self.spec.declared_sig_len
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Result<()> {
        let status = self.status(Phase::Keygen);
        if status != 0 {
            return Err(BenchError::KeygenFailed {
                scheme: self.spec.name.clone(),
                status,
            });
        }
        let seed: [u8; 32] = Sha256::digest(self.spec.name.as_bytes()).into();
        let pk: [u8; 32] = Sha256::digest(seed).into();
        secret_key[..32].copy_from_slice(&seed);
        secret_key[32..SK_LEN].copy_from_slice(&pk);
        public_key[..PK_LEN].copy_from_slice(&pk);
        Ok(())
    }

    fn sign(&self, signature: &mut [u8], message: &[u8], secret_key: &[u8]) -> Result<usize> {
        let status = self.status(Phase::Sign);
        if status != 0 {
            return Err(BenchError::SignFailed {
                scheme: self.spec.name.clone(),
                status,
            });
        }
        let len = self.spec.actual_sig_len;
        signature[..len].fill(0);
        signature[..DIGEST_LEN].copy_from_slice(&Self::digest(&secret_key[32..SK_LEN], message));
        Ok(len)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
        let mut status = self.status(Phase::Verify);
        if status == 0 && !self.spec.lenient {
            let ok = signature.len() == self.spec.actual_sig_len
                && signature[..DIGEST_LEN] == Self::digest(public_key, message)
                && signature[DIGEST_LEN..].iter().all(|&b| b == 0);
            if !ok {
                status = -1;
            }
        }
        if status != 0 {
            return Err(BenchError::VerifyFailed {
                scheme: self.spec.name.clone(),
                status,
            });
        }
        Ok(())
    }
}
