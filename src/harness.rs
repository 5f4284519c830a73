use std::collections::BTreeSet;
use std::hint::black_box;
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::record::BenchmarkRecord;
use crate::scheme::SchemeProvider;
use crate::Prehash;

#[derive(Clone, Copy, Debug)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
}

impl BenchConfig {
    /// Iterations averaged per scenario when not set explicitly.
    pub fn iterations(&self) -> u32 {
        match self.profile {
            Profile::Quick => 10,
            Profile::Full => 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

/// Wall-clock one call.
pub fn time_call<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = black_box(f());
    let elapsed = start.elapsed();
    Timed { value, elapsed }
}

/// How test messages are synthesised. Only the length matters for timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Filler {
    /// The same byte repeated.
    Repeat(u8),
    /// ChaCha8 keystream from a fixed seed.
    Seeded(u64),
}

impl Default for Filler {
    fn default() -> Self {
        Filler::Repeat(b'a')
    }
}

impl Filler {
    pub fn message(&self, len: usize) -> Vec<u8> {
        match *self {
            Filler::Repeat(b) => vec![b; len],
            Filler::Seeded(seed) => {
                let mut buf = vec![0u8; len];
                ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut buf);
                buf
            }
        }
    }
}

/// Knobs shared by every scenario of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeasureOptions {
    pub filler: Filler,
    pub prehash: Prehash,
    /// Also time verification of a signature with one flipped byte.
    pub verify_corrupt: bool,
}

/// A request to measure one scheme at one message size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub scheme: String,
    pub message_size: usize,
    pub iterations: u32,
}

/// Drives keygen/sign/verify cycles against one [`SchemeProvider`].
pub struct Harness<'p, P: SchemeProvider + ?Sized> {
    provider: &'p P,
    available: BTreeSet<String>,
    options: MeasureOptions,
}

impl<'p, P: SchemeProvider + ?Sized> Harness<'p, P> {
    pub fn new(provider: &'p P, options: MeasureOptions) -> Self {
        let available: BTreeSet<String> = provider.available_schemes().into_iter().collect();
        info!(
            provider = %provider.describe(),
            schemes = available.len(),
            "harness ready"
        );
        Harness {
            provider,
            available,
            options,
        }
    }

    pub fn list_available_schemes(&self) -> &BTreeSet<String> {
        &self.available
    }

    pub fn is_available(&self, scheme: &str) -> bool {
        self.available.contains(scheme)
    }

    pub fn options(&self) -> &MeasureOptions {
        &self.options
    }

    /// One full instantiate → keygen → sign → verify → free cycle.
    pub fn measure(&self, scheme: &str, message_size: usize) -> Result<BenchmarkRecord> {
        if !self.is_available(scheme) {
            return Err(BenchError::UnknownScheme(scheme.to_string()));
        }

        let sig = self.provider.instantiate(scheme)?;
        let pk_len = sig.public_key_len();
        let sk_len = sig.secret_key_len();
        let sig_len = sig.signature_len();

        let mut public_key = vec![0u8; pk_len];
        let mut secret_key = vec![0u8; sk_len];
        let mut signature = vec![0u8; sig_len];

        let keygen = time_call(|| sig.keypair(&mut public_key, &mut secret_key));
        keygen.value?;
        debug!(scheme, secs = keygen.elapsed.as_secs_f64(), "keygen");

        let message = self.options.filler.message(message_size);
        let signed_input = self.options.prehash.apply(&message);

        let signing = time_call(|| sig.sign(&mut signature, &signed_input, &secret_key));
        let produced = signing.value?.min(sig_len);
        debug!(scheme, secs = signing.elapsed.as_secs_f64(), produced, "sign");

        let verify = time_call(|| sig.verify(&signed_input, &signature[..produced], &public_key));
        verify.value?;
        debug!(scheme, secs = verify.elapsed.as_secs_f64(), "verify");

        let verify_time_corrupt = if self.options.verify_corrupt {
            let mut corrupted = signature[..produced].to_vec();
            if let Some(first) = corrupted.first_mut() {
                *first ^= 0x01;
            }
            let bad = time_call(|| sig.verify(&signed_input, &corrupted, &public_key));
            match bad.value {
                Err(BenchError::VerifyFailed { status, .. }) => {
                    debug!(scheme, status, secs = bad.elapsed.as_secs_f64(), "corrupt signature rejected");
                }
                Ok(()) => return Err(BenchError::CorruptSignatureAccepted(scheme.to_string())),
                Err(e) => return Err(e),
            }
            Some(bad.elapsed.as_secs_f64())
        } else {
            None
        };

        drop(sig);

        Ok(BenchmarkRecord {
            message_length: message_size as u64,
            signed_length: (signed_input.len() + produced) as u64,
            public_key_size: pk_len as u64,
            private_key_size: sk_len as u64,
            signature_size: sig_len as u64,
            keygen_time: keygen.elapsed.as_secs_f64(),
            sign_time: signing.elapsed.as_secs_f64(),
            verify_time: verify.elapsed.as_secs_f64(),
            verify_time_corrupt,
            hash_length: Some(signed_input.len() as u64),
            cycles: None,
        })
    }

    /// `iterations` independent [`Harness::measure`] calls. Stops at the first failure.
    pub fn measure_samples(
        &self,
        scheme: &str,
        message_size: usize,
        iterations: u32,
    ) -> Result<Vec<BenchmarkRecord>> {
        if iterations == 0 {
            return Err(BenchError::config("iterations must be at least 1"));
        }
        (0..iterations)
            .map(|i| {
                debug!(scheme, message_size, iteration = i + 1, iterations, "measuring");
                self.measure(scheme, message_size)
            })
            .collect()
    }

    /// Mean timings over `iterations` cycles; sizes come from the first one.
    pub fn measure_averaged(
        &self,
        scheme: &str,
        message_size: usize,
        iterations: u32,
    ) -> Result<BenchmarkRecord> {
        let samples = self.measure_samples(scheme, message_size, iterations)?;
        average(&samples).ok_or_else(|| BenchError::config("no samples"))
    }

    pub fn run_scenario(&self, spec: &ScenarioSpec) -> Result<BenchmarkRecord> {
        self.measure_averaged(&spec.scheme, spec.message_size, spec.iterations)
    }
}

/// Arithmetic mean of every timing field. Sizes are taken from the first sample.
pub fn average(samples: &[BenchmarkRecord]) -> Option<BenchmarkRecord> {
    let first = samples.first()?;
    let n = samples.len() as f64;
    let mean = |f: fn(&BenchmarkRecord) -> f64| samples.iter().map(f).sum::<f64>() / n;

    let verify_time_corrupt = if samples.iter().all(|s| s.verify_time_corrupt.is_some()) {
        Some(mean(|s| s.verify_time_corrupt.unwrap_or(0.0)))
    } else {
        None
    };

    Some(BenchmarkRecord {
        keygen_time: mean(|s| s.keygen_time),
        sign_time: mean(|s| s.sign_time),
        verify_time: mean(|s| s.verify_time),
        verify_time_corrupt,
        cycles: None,
        ..first.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Phase, ToyProvider, ToySpec};

    fn provider() -> ToyProvider {
        ToyProvider::new(vec![
            ToySpec::new("Toy-A"),
            ToySpec::new("Toy-Var").variable_length(64, 40),
            ToySpec::new("Toy-Broken").failing_at(Phase::Instantiate),
            ToySpec::new("Toy-NoKeys").failing_at(Phase::Keygen),
            ToySpec::new("Toy-NoSign").failing_at(Phase::Sign),
            ToySpec::new("Toy-NoVerify").failing_at(Phase::Verify),
            ToySpec::new("Toy-Lenient").lenient(),
        ])
    }

    #[test]
    fn test_measure_populates_sizes() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        let r = h.measure("Toy-A", 100).unwrap();
        assert_eq!(r.message_length, 100);
        assert_eq!(r.public_key_size, 32);
        assert_eq!(r.private_key_size, 64);
        assert_eq!(r.signature_size, 48);
        assert_eq!(r.signed_length, 148);
        assert_eq!(r.hash_length, Some(100));
        assert!(r.keygen_time >= 0.0 && r.sign_time >= 0.0 && r.verify_time >= 0.0);
        assert!(r.verify_time_corrupt.is_none());
    }

    #[test]
    fn test_sizes_independent_of_message_length() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        let a = h.measure("Toy-A", 32).unwrap();
        let b = h.measure("Toy-A", 4096).unwrap();
        assert_eq!(a.public_key_size, b.public_key_size);
        assert_eq!(a.private_key_size, b.private_key_size);
        assert_eq!(a.signature_size, b.signature_size);
    }

    #[test]
    fn test_signed_length_uses_produced_signature() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        let r = h.measure("Toy-Var", 10).unwrap();
        assert_eq!(r.signature_size, 64);
        assert_eq!(r.signed_length, 50);
    }

    #[test]
    fn test_prehash_changes_signed_input() {
        let p = provider();
        let opts = MeasureOptions {
            prehash: Prehash::Sha512,
            ..Default::default()
        };
        let h = Harness::new(&p, opts);
        let r = h.measure("Toy-A", 1 << 16).unwrap();
        assert_eq!(r.message_length, 1 << 16);
        assert_eq!(r.hash_length, Some(64));
        assert_eq!(r.signed_length, 64 + 48);
    }

    #[test]
    fn test_unknown_scheme() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        assert!(matches!(
            h.measure("UnknownAlg", 64),
            Err(BenchError::UnknownScheme(name)) if name == "UnknownAlg"
        ));
    }

    #[test]
    fn test_phase_failures() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        assert!(matches!(
            h.measure("Toy-Broken", 64),
            Err(BenchError::InstantiationFailed(_))
        ));
        assert!(matches!(
            h.measure("Toy-NoKeys", 64),
            Err(BenchError::KeygenFailed { status: -1, .. })
        ));
        assert!(matches!(
            h.measure("Toy-NoSign", 64),
            Err(BenchError::SignFailed { .. })
        ));
        assert!(matches!(
            h.measure("Toy-NoVerify", 64),
            Err(BenchError::VerifyFailed { .. })
        ));
    }

    #[test]
    fn test_corrupt_signature_is_expected_failure() {
        let p = provider();
        let opts = MeasureOptions {
            verify_corrupt: true,
            ..Default::default()
        };
        let h = Harness::new(&p, opts);
        let r = h.measure("Toy-A", 256).unwrap();
        assert!(r.verify_time_corrupt.is_some());

        assert!(matches!(
            h.measure("Toy-Lenient", 256),
            Err(BenchError::CorruptSignatureAccepted(_))
        ));
    }

    #[test]
    fn test_averaged_within_sample_bounds() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        let samples = h.measure_samples("Toy-A", 512, 8).unwrap();
        assert_eq!(samples.len(), 8);
        let avg = average(&samples).unwrap();

        let bounds = |f: fn(&BenchmarkRecord) -> f64| {
            let v: Vec<f64> = samples.iter().map(f).collect();
            let lo = v.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (lo, hi)
        };
        let checks: [(fn(&BenchmarkRecord) -> f64, f64); 3] = [
            (|s| s.keygen_time, avg.keygen_time),
            (|s| s.sign_time, avg.sign_time),
            (|s| s.verify_time, avg.verify_time),
        ];
        for (get, value) in checks {
            let (lo, hi) = bounds(get);
            assert!(value >= lo - 1e-12 && value <= hi + 1e-12);
        }
        assert_eq!(avg.public_key_size, samples[0].public_key_size);
    }

    #[test]
    fn test_average_of_known_values() {
        let base = BenchmarkRecord {
            message_length: 32,
            signed_length: 80,
            public_key_size: 32,
            private_key_size: 64,
            signature_size: 48,
            keygen_time: 1.0,
            sign_time: 2.0,
            verify_time: 3.0,
            verify_time_corrupt: Some(1.0),
            hash_length: Some(32),
            cycles: None,
        };
        let other = BenchmarkRecord {
            keygen_time: 3.0,
            sign_time: 4.0,
            verify_time: 5.0,
            verify_time_corrupt: Some(3.0),
            ..base.clone()
        };
        let avg = average(&[base, other]).unwrap();
        assert_eq!(avg.keygen_time, 2.0);
        assert_eq!(avg.sign_time, 3.0);
        assert_eq!(avg.verify_time, 4.0);
        assert_eq!(avg.verify_time_corrupt, Some(2.0));
        assert!(average(&[]).is_none());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let p = provider();
        let h = Harness::new(&p, MeasureOptions::default());
        assert!(matches!(
            h.measure_averaged("Toy-A", 32, 0),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_filler_is_deterministic() {
        assert_eq!(Filler::Repeat(b'a').message(4), b"aaaa".to_vec());
        let a = Filler::Seeded(7).message(64);
        let b = Filler::Seeded(7).message(64);
        let c = Filler::Seeded(8).message(64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Filler::Seeded(1).message(0).is_empty());
    }

    #[test]
    fn test_profile_iterations() {
        let quick = BenchConfig {
            profile: Profile::Quick,
            seed: 0,
        };
        let full = BenchConfig {
            profile: Profile::Full,
            ..quick.clone()
        };
        assert!(quick.iterations() < full.iterations());
    }
}
