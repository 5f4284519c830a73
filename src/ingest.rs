//! Reading benchmark logs back in.
//!
//! Parsing is strict: a file containing one malformed line is rejected as a
//! whole. Provenance tagging happens after parsing and only looks at the path.

use crate::error::{BenchError, Result};
use crate::record::{BenchmarkRecord, LogSchema};
use crate::{Prehash, Variant};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Read every record in `path` under `schema`. Blank lines are skipped.
pub fn read_log(path: &Path, schema: LogSchema) -> Result<Vec<BenchmarkRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        match BenchmarkRecord::parse(&line, schema) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => {
                return Err(BenchError::Parse {
                    path: path.display().to_string(),
                    source: e.at_line(idx + 1),
                })
            }
        }
    }

    debug!(path = %path.display(), records = records.len(), "read log");
    Ok(records)
}

/// Expand `root` into the log files below it, sorted. A file is returned as is.
pub fn collect_log_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.is_file() {
        out.push(root.to_path_buf());
        return Ok(out);
    }

    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let hidden = entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false);
        if entry.file_type().is_file() && !hidden {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

/// Maps a path substring to a machine label, e.g. `i9=PC#1 i9`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTag {
    pub pattern: String,
    pub label: String,
}

impl FromStr for MachineTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((pattern, label)) if !pattern.is_empty() && !label.is_empty() => Ok(MachineTag {
                pattern: pattern.to_string(),
                label: label.to_string(),
            }),
            _ => Err(format!("expected PATTERN=LABEL, got {s:?}")),
        }
    }
}

/// Leading file-name tokens written by the measurement tools.
const OUTPUT_PREFIXES: [&str; 2] = ["results", "risultati"];

/// File-name tokens naming the build or pre-hash rather than the algorithm.
const BUILD_TOKENS: [&str; 4] = ["ref", "avx2", "sha256", "sha512"];

/// Algorithm part of a log file name, lower-cased.
///
/// `dilithium2_ref`, `dilithium2_avx2` and `risultati_Dilithium2_avx2` all
/// become `dilithium2`, so builds of one algorithm land in the same group.
pub fn algorithm_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    let mut tokens: Vec<&str> = lower
        .split('_')
        .filter(|t| !t.is_empty() && !BUILD_TOKENS.contains(t))
        .collect();
    if tokens.len() > 1 && OUTPUT_PREFIXES.contains(&tokens[0]) {
        tokens.remove(0);
    }
    if tokens.is_empty() {
        file_name.to_ascii_lowercase()
    } else {
        tokens.join("_")
    }
}

/// Where a record came from, derived from its file path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub algorithm: String,
    pub variant: Variant,
    pub prehash: Prehash,
    pub machine: Option<String>,
}

impl Provenance {
    pub fn from_path(path: &Path, machines: &[MachineTag]) -> Self {
        let source = path.to_string_lossy().replace('\\', "/");
        let lower = source.to_ascii_lowercase();

        let algorithm = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(algorithm_name)
            .unwrap_or_else(|| "unknown".to_string());

        let variant = if lower.contains("avx2") {
            Variant::Avx2
        } else {
            Variant::Ref
        };

        let prehash = if lower.contains("sha512") {
            Prehash::Sha512
        } else if lower.contains("sha256") {
            Prehash::Sha256
        } else {
            Prehash::None
        };

        let machine = machines
            .iter()
            .find(|m| source.contains(&m.pattern))
            .map(|m| m.label.clone());

        Provenance {
            source,
            algorithm,
            variant,
            prehash,
            machine,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedRecord {
    pub provenance: Provenance,
    #[serde(flatten)]
    pub record: BenchmarkRecord,
}

/// Read and tag several logs. Files are parsed in parallel; the output keeps
/// input order (file by file, line by line).
pub fn ingest(
    paths: &[PathBuf],
    schema: LogSchema,
    machines: &[MachineTag],
) -> Result<Vec<TaggedRecord>> {
    let per_file: Vec<Vec<TaggedRecord>> = paths
        .par_iter()
        .map(|path| -> Result<Vec<TaggedRecord>> {
            let provenance = Provenance::from_path(path, machines);
            let records = read_log(path, schema)?;
            Ok(records
                .into_iter()
                .map(|record| TaggedRecord {
                    provenance: provenance.clone(),
                    record,
                })
                .collect())
        })
        .collect::<Result<_>>()?;

    Ok(per_file.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const LINE_32: &str = "|32|2452|1312|2560|2420|0.000101|0.000402|0.000099|32|";
    const LINE_64: &str = "|64|2484|1312|2560|2420|0.000098|0.000388|0.000101|64|";

    #[test]
    fn test_reads_lines_and_skips_blanks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dilithium2_ref");
        fs::write(&path, format!("{LINE_32}\r\n\r\n{LINE_64}\n")).unwrap();

        let records = read_log(&path, LogSchema::Standard).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message_length, 64);
    }

    #[test]
    fn test_bad_line_rejects_file_with_line_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken");
        fs::write(&path, format!("{LINE_32}\n|64|2484|1312|\n")).unwrap();

        match read_log(&path, LogSchema::Standard) {
            Err(BenchError::Parse { source, .. }) => {
                assert!(matches!(source, crate::ParseError::TooFewFields { line: 2, .. }));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_provenance_from_path() {
        let machines = vec![
            "i9=i9".parse::<MachineTag>().unwrap(),
            "i7=i7".parse::<MachineTag>().unwrap(),
        ];
        let p = Provenance::from_path(
            Path::new("./output_i9/falcon2_avx2_sha512"),
            &machines,
        );
        assert_eq!(p.algorithm, "falcon2");
        assert_eq!(p.source, "./output_i9/falcon2_avx2_sha512");
        assert_eq!(p.variant, Variant::Avx2);
        assert_eq!(p.prehash, Prehash::Sha512);
        assert_eq!(p.machine.as_deref(), Some("i9"));

        let p = Provenance::from_path(Path::new("output/sphincs128_ref"), &[]);
        assert_eq!(p.variant, Variant::Ref);
        assert_eq!(p.prehash, Prehash::None);
        assert_eq!(p.machine, None);
    }

    #[test]
    fn test_machine_tag_parse() {
        let tag: MachineTag = "i9=PC#1 i9 - AVX2".parse().unwrap();
        assert_eq!(tag.pattern, "i9");
        assert_eq!(tag.label, "PC#1 i9 - AVX2");
        assert!("no-separator".parse::<MachineTag>().is_err());
        assert!("=label".parse::<MachineTag>().is_err());
    }

    #[test]
    fn test_collect_and_ingest_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b_avx2"), format!("{LINE_32}\n{LINE_64}\n")).unwrap();
        fs::write(dir.path().join("a_ref"), format!("{LINE_64}\n")).unwrap();
        fs::write(dir.path().join(".hidden"), "not a log").unwrap();

        let files = collect_log_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let tagged = ingest(&files, LogSchema::Standard, &[]).unwrap();
        assert_eq!(tagged.len(), 3);
        assert_eq!(tagged[0].provenance.algorithm, "a");
        assert_eq!(tagged[1].provenance.variant, Variant::Avx2);
        assert_eq!(tagged[2].record.message_length, 64);
    }

    #[test]
    fn test_algorithm_name_drops_build_tokens() {
        assert_eq!(algorithm_name("dilithium2_ref"), "dilithium2");
        assert_eq!(algorithm_name("dilithium2_avx2"), "dilithium2");
        assert_eq!(algorithm_name("risultati_Dilithium2_avx2"), "dilithium2");
        assert_eq!(algorithm_name("dilithium3_sha256_ref"), "dilithium3");
        assert_eq!(algorithm_name("results_Falcon-512"), "falcon-512");
        assert_eq!(algorithm_name("results"), "results");
        assert_eq!(algorithm_name("ref"), "ref");
    }
}
