use crate::harness::Profile;
use crate::ingest::Provenance;
use crate::record::{BenchmarkRecord, LogSchema};
use crate::{Prehash, Variant};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

impl RunMeta {
    pub fn new(profile: Profile, seed: u64) -> Self {
        RunMeta {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: profile.as_str().to_string(),
            seed,
            timestamp_utc: now_utc(),
            git_sha: git_sha_short(),
        }
    }
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Set by CI/build scripts when available.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

/// A completed scenario as reported in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scheme: String,
    #[serde(flatten)]
    pub record: BenchmarkRecord,
}

/// A scenario that was attempted and skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFailure {
    pub scheme: String,
    /// `None` when the whole scheme was skipped before any size ran.
    pub message_size: Option<usize>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run: RunMeta,
    pub library: String,
    pub schema: LogSchema,
    pub iterations: u32,
    pub prehash: Prehash,
    pub variant: Option<Variant>,
    pub files: Vec<String>,
    pub results: Vec<ScenarioResult>,
    pub failures: Vec<ScenarioFailure>,
}

/// Aggregate over all records of one (algorithm, variant, machine) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub algorithm: String,
    pub variant: Variant,
    pub prehash: Prehash,
    pub machine: Option<String>,
    pub records: usize,
    pub min_message_length: u64,
    pub max_message_length: u64,
    pub mean_public_key_size: f64,
    pub mean_private_key_size: f64,
    pub mean_signature_size: f64,
    pub mean_keygen_time: f64,
    pub mean_sign_time: f64,
    pub mean_verify_time: f64,
    pub min_sign_time: f64,
    pub max_sign_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub run: RunMeta,
    pub schema: LogSchema,
    pub files: Vec<String>,
    pub groups: Vec<GroupSummary>,
}

/// Output of `parse`: every record with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedLog {
    pub schema: LogSchema,
    pub provenance: Provenance,
    pub records: Vec<BenchmarkRecord>,
}
