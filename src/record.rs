//! The pipe-delimited benchmark log format.
//!
//! One line per (scheme, message size) scenario, always with an empty leading
//! field so that splitting on `|` yields values indexed from 1:
//!
//! ```text
//! standard / verify-correct (9 fields):
//!   |mlen|signed_len|pk|sk|sig|keygen_s|sign_s|verify_s|hash_len|
//!
//! with-cycles (13 fields):
//!   |mlen|signed_len|pk|sk|sig|keygen_s|keygen_cyc|sign_s|sign_cyc|
//!    verify_ok_s|verify_ok_cyc|verify_bad_s|verify_bad_cyc|
//! ```
//!
//! Times are seconds printed with six decimals. A file uses exactly one schema;
//! the schema is chosen by the reader, never sniffed from the content.

use crate::error::ParseError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Ticks per second of the cycle columns (POSIX `clock()` resolution).
pub const TICKS_PER_SEC: f64 = 1_000_000.0;

#[derive(
    Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum LogSchema {
    /// 13 fields: per-phase cycle counts and correct/corrupt verification.
    WithCycles,
    /// 9 fields ending in `verify_time` and `hash_length`.
    #[default]
    Standard,
    /// Same layout as `standard`, with the verify column meaning a valid signature.
    VerifyCorrect,
}

const STANDARD_FIELDS: [&str; 9] = [
    "message_length",
    "signed_length",
    "public_key_size",
    "private_key_size",
    "signature_size",
    "keygen_time",
    "sign_time",
    "verify_time",
    "hash_length",
];

const VERIFY_CORRECT_FIELDS: [&str; 9] = [
    "message_length",
    "signed_length",
    "public_key_size",
    "private_key_size",
    "signature_size",
    "keygen_time",
    "sign_time",
    "verify_time_correct",
    "hash_length",
];

const WITH_CYCLES_FIELDS: [&str; 13] = [
    "message_length",
    "signed_length",
    "public_key_size",
    "private_key_size",
    "signature_size",
    "keygen_time",
    "keygen_cycles",
    "sign_time",
    "sign_cycles",
    "verify_time_correct",
    "verify_cycles_correct",
    "verify_time_corrupt",
    "verify_cycles_corrupt",
];

impl LogSchema {
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            LogSchema::WithCycles => &WITH_CYCLES_FIELDS,
            LogSchema::Standard => &STANDARD_FIELDS,
            LogSchema::VerifyCorrect => &VERIFY_CORRECT_FIELDS,
        }
    }

    pub fn field_count(&self) -> usize {
        self.field_names().len()
    }

    /// Column header in the short form the measurement tools print to the console.
    pub fn header(&self) -> &'static str {
        match self {
            LogSchema::WithCycles => {
                "|MLEN|MTOTLEN|PUBLEN|PRVLEN|SIGLEN|KGTM|KGCYC|SIGTM|SIGCYC|CHECKTM|CHECKCYC|BADTM|BADCYC|"
            }
            LogSchema::Standard | LogSchema::VerifyCorrect => {
                "|MLEN|MTOTLEN|PUBLEN|PRVLEN|SIGLEN|KGTM|SIGTM|CHECKTM|HASHSZ|"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogSchema::WithCycles => "with-cycles",
            LogSchema::Standard => "standard",
            LogSchema::VerifyCorrect => "verify-correct",
        }
    }
}

/// Per-phase clock ticks, only present in the 13-field schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub keygen: u64,
    pub sign: u64,
    pub verify_correct: u64,
    pub verify_corrupt: u64,
}

/// Convert seconds into clock ticks.
pub fn seconds_to_ticks(secs: f64) -> u64 {
    if secs <= 0.0 {
        0
    } else {
        (secs * TICKS_PER_SEC).round() as u64
    }
}

/// One measured scenario. Written once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub message_length: u64,
    /// Signed input length plus produced signature length.
    pub signed_length: u64,
    pub public_key_size: u64,
    pub private_key_size: u64,
    pub signature_size: u64,
    pub keygen_time: f64,
    pub sign_time: f64,
    /// Verification of a valid signature.
    pub verify_time: f64,
    pub verify_time_corrupt: Option<f64>,
    /// Absent in the 13-field schema.
    pub hash_length: Option<u64>,
    pub cycles: Option<CycleCounts>,
}

impl BenchmarkRecord {
    /// Parse one line under `schema`.
    ///
    /// Returns `Ok(None)` for blank lines. Errors carry line number 0; callers
    /// reading a file re-anchor them with [`ParseError::at_line`].
    pub fn parse(line: &str, schema: LogSchema) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let line = line.strip_suffix('|').unwrap_or(line);
        let fields: Vec<&str> = line.split('|').collect();
        let names = schema.field_names();
        if !fields[0].trim().is_empty() {
            return Err(ParseError::MissingLeadingDelimiter { line: 0 });
        }
        // Index 0 is the empty leading field.
        let found = fields.len() - 1;
        if found < names.len() {
            return Err(ParseError::TooFewFields {
                line: 0,
                expected: names.len(),
                found,
            });
        }
        if found > names.len() {
            return Err(ParseError::TooManyFields {
                line: 0,
                expected: names.len(),
                found,
            });
        }
        let row = Row { fields, names };

        let record = match schema {
            LogSchema::Standard | LogSchema::VerifyCorrect => BenchmarkRecord {
                message_length: row.int(1)?,
                signed_length: row.int(2)?,
                public_key_size: row.int(3)?,
                private_key_size: row.int(4)?,
                signature_size: row.int(5)?,
                keygen_time: row.float(6)?,
                sign_time: row.float(7)?,
                verify_time: row.float(8)?,
                verify_time_corrupt: None,
                hash_length: Some(row.int(9)?),
                cycles: None,
            },
            LogSchema::WithCycles => {
                let keygen_time = row.float(6)?;
                let keygen = row.int(7)?;
                let sign_time = row.float(8)?;
                let sign = row.int(9)?;
                let verify_time = row.float(10)?;
                let verify_correct = row.int(11)?;
                let verify_time_corrupt = row.float(12)?;
                let verify_corrupt = row.int(13)?;
                BenchmarkRecord {
                    message_length: row.int(1)?,
                    signed_length: row.int(2)?,
                    public_key_size: row.int(3)?,
                    private_key_size: row.int(4)?,
                    signature_size: row.int(5)?,
                    keygen_time,
                    sign_time,
                    verify_time,
                    verify_time_corrupt: Some(verify_time_corrupt),
                    hash_length: None,
                    cycles: Some(CycleCounts {
                        keygen,
                        sign,
                        verify_correct,
                        verify_corrupt,
                    }),
                }
            }
        };
        Ok(Some(record))
    }

    /// Render as one log line (no trailing newline).
    ///
    /// Missing optional columns are filled in: `hash_length` falls back to the
    /// message length, cycle counts are derived from the timings, and an absent
    /// corrupt-verification time is written as zero.
    pub fn format(&self, schema: LogSchema) -> String {
        let mut out = String::with_capacity(128);
        let _ = write!(
            out,
            "|{}|{}|{}|{}|{}",
            self.message_length,
            self.signed_length,
            self.public_key_size,
            self.private_key_size,
            self.signature_size
        );
        match schema {
            LogSchema::Standard | LogSchema::VerifyCorrect => {
                let _ = write!(
                    out,
                    "|{:.6}|{:.6}|{:.6}|{}|",
                    self.keygen_time,
                    self.sign_time,
                    self.verify_time,
                    self.hash_length.unwrap_or(self.message_length)
                );
            }
            LogSchema::WithCycles => {
                let corrupt = self.verify_time_corrupt.unwrap_or(0.0);
                let cycles = self.cycles.unwrap_or(CycleCounts {
                    keygen: seconds_to_ticks(self.keygen_time),
                    sign: seconds_to_ticks(self.sign_time),
                    verify_correct: seconds_to_ticks(self.verify_time),
                    verify_corrupt: seconds_to_ticks(corrupt),
                });
                let _ = write!(
                    out,
                    "|{:.6}|{}|{:.6}|{}|{:.6}|{}|{:.6}|{}|",
                    self.keygen_time,
                    cycles.keygen,
                    self.sign_time,
                    cycles.sign,
                    self.verify_time,
                    cycles.verify_correct,
                    corrupt,
                    cycles.verify_corrupt
                );
            }
        }
        out
    }
}

struct Row<'a> {
    fields: Vec<&'a str>,
    names: &'static [&'static str],
}

impl Row<'_> {
    fn raw(&self, idx: usize) -> &str {
        self.fields[idx].trim()
    }

    fn int(&self, idx: usize) -> Result<u64, ParseError> {
        let raw = self.raw(idx);
        raw.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
            line: 0,
            field: self.names[idx - 1],
            kind: "integer",
            value: raw.to_string(),
        })
    }

    fn float(&self, idx: usize) -> Result<f64, ParseError> {
        let raw = self.raw(idx);
        raw.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
            line: 0,
            field: self.names[idx - 1],
            kind: "float",
            value: raw.to_string(),
        })
    }
}
