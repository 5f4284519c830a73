//! Scheme × message-size sweeps that write benchmark logs.
//!
//! A failed scenario is logged and recorded, then the sweep moves on to the
//! next one. Only I/O and configuration errors abort a sweep.

use crate::error::{BenchError, Result};
use crate::harness::{Filler, Harness, MeasureOptions, ScenarioSpec};
use crate::record::{BenchmarkRecord, LogSchema};
use crate::schema::{RunMeta, ScenarioFailure, ScenarioResult, SweepReport};
use crate::scheme::SchemeProvider;
use crate::{Prehash, Variant};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Schemes measured when none are configured.
pub const DEFAULT_SCHEMES: [&str; 8] = [
    "Dilithium2",
    "Dilithium3",
    "Dilithium5",
    "Falcon-512",
    "Falcon-1024",
    "SPHINCS+-SHA2-128f-simple",
    "SPHINCS+-SHA2-192f-simple",
    "SPHINCS+-SHA2-256f-simple",
];

/// Sizes from `min` up to and including `max`, multiplying by `factor`.
pub fn geometric_sizes(min: usize, max: usize, factor: usize) -> Result<Vec<usize>> {
    if min == 0 || factor < 2 || max < min {
        return Err(BenchError::config(format!(
            "invalid size range: min={min} max={max} factor={factor}"
        )));
    }
    let mut sizes = Vec::new();
    let mut size = min;
    while size <= max {
        sizes.push(size);
        size = match size.checked_mul(factor) {
            Some(s) => s,
            None => break,
        };
    }
    Ok(sizes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub schemes: Vec<String>,
    pub message_sizes: Vec<usize>,
    pub iterations: u32,
    pub filler: Filler,
    pub prehash: Prehash,
    pub verify_corrupt: bool,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    /// Appended to file names, e.g. `results_Dilithium2_avx2`.
    pub variant: Option<Variant>,
    /// Keep existing log contents instead of truncating.
    pub append: bool,
    /// Scenarios run concurrently, each with its own handle.
    pub jobs: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            schemes: DEFAULT_SCHEMES.iter().map(|s| s.to_string()).collect(),
            message_sizes: (5..25).map(|i| 1usize << i).collect(),
            iterations: 100,
            filler: Filler::default(),
            prehash: Prehash::None,
            verify_corrupt: false,
            output_dir: PathBuf::from("results"),
            file_prefix: "results_".to_string(),
            variant: None,
            append: false,
            jobs: 1,
        }
    }
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: SweepConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schemes.is_empty() {
            return Err(BenchError::config("no schemes configured"));
        }
        if self.message_sizes.is_empty() {
            return Err(BenchError::config("no message sizes configured"));
        }
        if self.iterations == 0 {
            return Err(BenchError::config("iterations must be at least 1"));
        }
        if self.jobs == 0 {
            return Err(BenchError::config("jobs must be at least 1"));
        }
        Ok(())
    }

    /// Dual verification needs the corrupt-verify columns.
    pub fn log_schema(&self) -> LogSchema {
        if self.verify_corrupt {
            LogSchema::WithCycles
        } else {
            LogSchema::Standard
        }
    }

    pub fn measure_options(&self) -> MeasureOptions {
        MeasureOptions {
            filler: self.filler,
            prehash: self.prehash,
            verify_corrupt: self.verify_corrupt,
        }
    }

    pub fn log_path(&self, scheme: &str) -> PathBuf {
        let mut name = format!("{}{}", self.file_prefix, scheme);
        if let Some(v) = self.variant {
            name.push('_');
            name.push_str(&v.as_str().to_ascii_lowercase());
        }
        self.output_dir.join(name)
    }
}

/// Run every (scheme, size) scenario in `cfg`, writing one log per scheme.
pub fn run_sweep<P: SchemeProvider + ?Sized>(
    provider: &P,
    cfg: &SweepConfig,
    run: RunMeta,
) -> Result<SweepReport> {
    cfg.validate()?;
    fs::create_dir_all(&cfg.output_dir)?;

    let harness = Harness::new(provider, cfg.measure_options());
    let schema = cfg.log_schema();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.jobs)
        .build()
        .map_err(|e| BenchError::config(format!("worker pool: {e}")))?;

    let mut files = Vec::new();
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for scheme in &cfg.schemes {
        if !harness.is_available(scheme) {
            warn!(scheme = %scheme, "scheme not available, skipping");
            failures.push(ScenarioFailure {
                scheme: scheme.clone(),
                message_size: None,
                error: BenchError::UnknownScheme(scheme.clone()).to_string(),
            });
            continue;
        }

        let path = cfg.log_path(scheme);
        let mut log = open_log(&path, cfg.append)?;
        info!(scheme = %scheme, path = %path.display(), "starting scheme");

        let specs: Vec<ScenarioSpec> = cfg
            .message_sizes
            .iter()
            .map(|&message_size| ScenarioSpec {
                scheme: scheme.clone(),
                message_size,
                iterations: cfg.iterations,
            })
            .collect();

        let mut emit = |spec: &ScenarioSpec, outcome: Result<BenchmarkRecord>| -> Result<()> {
            match outcome {
                Ok(record) => {
                    writeln!(log, "{}", record.format(schema))?;
                    info!(
                        scheme = %spec.scheme,
                        size = spec.message_size,
                        sign_s = record.sign_time,
                        "scenario done"
                    );
                    results.push(ScenarioResult {
                        scheme: spec.scheme.clone(),
                        record,
                    });
                }
                Err(e) if e.is_scenario_local() => {
                    warn!(scheme = %spec.scheme, size = spec.message_size, error = %e, "scenario failed, skipping");
                    failures.push(ScenarioFailure {
                        scheme: spec.scheme.clone(),
                        message_size: Some(spec.message_size),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
            Ok(())
        };

        if cfg.jobs > 1 {
            let outcomes: Vec<Result<BenchmarkRecord>> =
                pool.install(|| specs.par_iter().map(|s| harness.run_scenario(s)).collect());
            for (spec, outcome) in specs.iter().zip(outcomes) {
                emit(spec, outcome)?;
            }
        } else {
            for spec in &specs {
                emit(spec, harness.run_scenario(spec))?;
            }
        }

        log.flush()?;
        files.push(path.display().to_string());
    }

    Ok(SweepReport {
        run,
        library: provider.describe(),
        schema,
        iterations: cfg.iterations,
        prehash: cfg.prehash,
        variant: cfg.variant,
        files,
        results,
        failures,
    })
}

fn open_log(path: &Path, append: bool) -> Result<LineWriter<File>> {
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)?
    } else {
        File::create(path)?
    };
    Ok(LineWriter::new(file))
}
