use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use pqsig_bench::harness::{BenchConfig, Filler, Harness, MeasureOptions, Profile};
use pqsig_bench::ingest::{self, MachineTag, Provenance};
use pqsig_bench::oqs::{OqsLibrary, LIBRARY_ENV};
use pqsig_bench::schema::{ParsedLog, RunMeta, SummaryReport};
use pqsig_bench::scheme::SchemeProvider;
use pqsig_bench::summary;
use pqsig_bench::sweep::{self, SweepConfig};
use pqsig_bench::{LogSchema, Prehash, Variant};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

/// Message synthesis and signing options shared by `measure` and `sweep`.
#[derive(ClapArgs, Debug, Clone)]
struct MessageArgs {
    /// Sign a SHA-256/SHA-512 digest of the message instead of the message.
    #[arg(long, value_enum)]
    prehash: Option<Prehash>,

    /// Byte repeated to build the message (default: 'a').
    #[arg(long, value_name = "BYTE", conflicts_with = "seeded_filler")]
    filler_byte: Option<u8>,

    /// Build messages from a ChaCha8 stream seeded with --seed.
    #[arg(long, default_value_t = false)]
    seeded_filler: bool,

    /// Also time verification of a signature with one flipped byte.
    #[arg(long, default_value_t = false)]
    verify_corrupt: bool,
}

impl MessageArgs {
    fn filler(&self, seed: u64) -> Option<Filler> {
        if self.seeded_filler {
            Some(Filler::Seeded(seed))
        } else {
            self.filler_byte.map(Filler::Repeat)
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the signature schemes the library provides.
    Schemes,

    /// Measure one scheme at one message size and print the log line.
    Measure {
        #[arg(long)]
        scheme: String,

        /// Message length in bytes.
        #[arg(long)]
        size: usize,

        /// Iterations to average (defaults to the profile's count).
        #[arg(long)]
        iterations: Option<u32>,

        #[command(flatten)]
        message: MessageArgs,
    },

    /// Sweep schemes × message sizes, writing one log file per scheme.
    Sweep(SweepArgs),

    /// Parse log files and print their records as JSON.
    Parse {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = LogSchema::Standard)]
        schema: LogSchema,

        /// Label files whose path contains PATTERN, e.g. `i9=PC#1 i9`.
        #[arg(long = "machine", value_name = "PATTERN=LABEL")]
        machines: Vec<MachineTag>,
    },

    /// Aggregate logs per algorithm/variant/machine into a JSON summary.
    Summarize {
        /// Log file or directory. Can be provided multiple times.
        #[arg(short, long, value_name = "PATH", num_args = 1.., action = clap::ArgAction::Append, required = true)]
        input: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = LogSchema::Standard)]
        schema: LogSchema,

        #[arg(long = "machine", value_name = "PATTERN=LABEL")]
        machines: Vec<MachineTag>,
    },
}

#[derive(ClapArgs, Debug)]
struct SweepArgs {
    /// JSON sweep configuration; flags below override its fields.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Scheme to measure. Can be provided multiple times.
    #[arg(long = "scheme", value_name = "NAME", action = clap::ArgAction::Append)]
    schemes: Vec<String>,

    /// Explicit message size. Can be provided multiple times.
    #[arg(long = "size", value_name = "BYTES", action = clap::ArgAction::Append,
          conflicts_with_all = ["min_size", "max_size"])]
    sizes: Vec<usize>,

    /// Smallest message size of a geometric range.
    #[arg(long, requires = "max_size")]
    min_size: Option<usize>,

    /// Largest message size of a geometric range (inclusive).
    #[arg(long, requires = "min_size")]
    max_size: Option<usize>,

    /// Growth factor of the geometric range.
    #[arg(long, default_value_t = 2)]
    factor: usize,

    #[arg(long)]
    iterations: Option<u32>,

    /// Directory receiving the log files.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Log file name prefix.
    #[arg(long)]
    prefix: Option<String>,

    /// Tag log file names with the implementation variant.
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Scenarios to run concurrently (each with its own handle).
    #[arg(long)]
    jobs: Option<usize>,

    /// Append to existing logs instead of truncating them.
    #[arg(long, default_value_t = false)]
    append: bool,

    #[command(flatten)]
    message: MessageArgs,
}

impl SweepArgs {
    /// The file given with `--config` (or the built-in defaults), then flags on top.
    fn to_config(&self, seed: u64) -> anyhow::Result<SweepConfig> {
        let mut cfg = match &self.config {
            Some(path) => SweepConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SweepConfig::default(),
        };
        if !self.schemes.is_empty() {
            cfg.schemes = self.schemes.clone();
        }
        if !self.sizes.is_empty() {
            cfg.message_sizes = self.sizes.clone();
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            cfg.message_sizes = sweep::geometric_sizes(min, max, self.factor)?;
        }
        if let Some(n) = self.iterations {
            cfg.iterations = n;
        }
        if let Some(dir) = &self.out_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(p) = &self.prefix {
            cfg.file_prefix = p.clone();
        }
        if self.variant.is_some() {
            cfg.variant = self.variant;
        }
        if let Some(j) = self.jobs {
            cfg.jobs = j;
        }
        if let Some(filler) = self.message.filler(seed) {
            cfg.filler = filler;
        }
        if let Some(p) = self.message.prehash {
            cfg.prehash = p;
        }
        cfg.append |= self.append;
        cfg.verify_corrupt |= self.message.verify_corrupt;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
#[command(name = "pqsig-bench")]
#[command(about = "Signature scheme benchmark runner and log analyser")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Path to liboqs (falls back to $PQSIG_BENCH_LIBOQS, then the loader path).
    #[arg(long, value_name = "FILE", global = true)]
    lib: Option<PathBuf>,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_library(explicit: Option<&PathBuf>) -> anyhow::Result<OqsLibrary> {
    let path = explicit
        .cloned()
        .or_else(|| std::env::var_os(LIBRARY_ENV).map(PathBuf::from));
    Ok(OqsLibrary::load(path.as_deref())?)
}

fn emit_json<T: serde::Serialize>(value: &T, out: Option<&PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(out) = out {
        fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let found = ingest::collect_log_files(input)
            .with_context(|| format!("reading {}", input.display()))?;
        if found.is_empty() {
            warn!(path = %input.display(), "no log files found");
        }
        files.extend(found);
    }
    Ok(files)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = BenchConfig {
        profile: args.profile.into(),
        seed: args.seed,
    };

    match &args.cmd {
        Command::Schemes => {
            let lib = load_library(args.lib.as_ref())?;
            for name in lib.available_schemes() {
                println!("{name}");
            }
        }
        Command::Measure {
            scheme,
            size,
            iterations,
            message,
        } => {
            let lib = load_library(args.lib.as_ref())?;
            let options = MeasureOptions {
                filler: message.filler(cfg.seed).unwrap_or_default(),
                prehash: message.prehash.unwrap_or_default(),
                verify_corrupt: message.verify_corrupt,
            };
            let schema = if options.verify_corrupt {
                LogSchema::WithCycles
            } else {
                LogSchema::Standard
            };
            let harness = Harness::new(&lib, options);
            let iterations = iterations.unwrap_or_else(|| cfg.iterations());
            let record = harness.measure_averaged(scheme, *size, iterations)?;
            println!("{}", schema.header());
            println!("{}", record.format(schema));
        }
        Command::Sweep(sweep_args) => {
            let sweep_cfg = sweep_args.to_config(cfg.seed)?;
            let lib = load_library(args.lib.as_ref())?;
            let report = sweep::run_sweep(&lib, &sweep_cfg, RunMeta::new(cfg.profile, cfg.seed))?;
            info!(
                completed = report.results.len(),
                failed = report.failures.len(),
                "sweep finished"
            );
            emit_json(&report, args.out.as_ref())?;
        }
        Command::Parse {
            files,
            schema,
            machines,
        } => {
            let mut logs = Vec::with_capacity(files.len());
            for path in files {
                logs.push(ParsedLog {
                    schema: *schema,
                    provenance: Provenance::from_path(path, machines),
                    records: ingest::read_log(path, *schema)?,
                });
            }
            emit_json(&logs, args.out.as_ref())?;
        }
        Command::Summarize {
            input,
            schema,
            machines,
        } => {
            let files = expand_inputs(input)?;
            if files.is_empty() {
                bail!("no log files to summarize");
            }
            let records = ingest::ingest(&files, *schema, machines)?;
            let report = SummaryReport {
                run: RunMeta::new(cfg.profile, cfg.seed),
                schema: *schema,
                files: files.iter().map(|f| f.display().to_string()).collect(),
                groups: summary::summarize(&records),
            };
            info!(
                files = report.files.len(),
                groups = report.groups.len(),
                "summary ready"
            );
            emit_json(&report, args.out.as_ref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep_args(argv: &[&str]) -> SweepArgs {
        let mut full = vec!["pqsig-bench", "sweep"];
        full.extend_from_slice(argv);
        match Args::try_parse_from(full).unwrap().cmd {
            Command::Sweep(a) => a,
            other => panic!("expected sweep, got {other:?}"),
        }
    }

    #[test]
    fn test_sweep_defaults_ignore_profile() {
        let cfg = sweep_args(&[]).to_config(0).unwrap();
        assert_eq!(cfg, SweepConfig::default());
        assert_eq!(cfg.iterations, 100);

        let cfg = sweep_args(&["--profile", "quick"]).to_config(0).unwrap();
        assert_eq!(cfg.iterations, 100);
    }

    #[test]
    fn test_sweep_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        fs::write(&path, r#"{"schemes": ["Falcon-512"], "iterations": 7}"#).unwrap();
        let path = path.to_string_lossy().into_owned();

        let cfg = sweep_args(&["--config", &path]).to_config(0).unwrap();
        assert_eq!(cfg.schemes, vec!["Falcon-512".to_string()]);
        assert_eq!(cfg.iterations, 7);

        let cfg = sweep_args(&[
            "--config",
            &path,
            "--iterations",
            "3",
            "--min-size",
            "32",
            "--max-size",
            "128",
            "--seeded-filler",
            "--verify-corrupt",
        ])
        .to_config(5)
        .unwrap();
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.message_sizes, vec![32, 64, 128]);
        assert_eq!(cfg.filler, Filler::Seeded(5));
        assert_eq!(cfg.log_schema(), LogSchema::WithCycles);
    }

    #[test]
    fn test_sweep_rejects_zero_jobs() {
        assert!(sweep_args(&["--jobs", "0"]).to_config(0).is_err());
    }
}
