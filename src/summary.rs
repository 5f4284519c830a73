//! Aggregation of ingested logs, the data behind the comparison charts.

use crate::ingest::TaggedRecord;
use crate::schema::GroupSummary;
use crate::{Prehash, Variant};
use std::collections::BTreeMap;

type GroupKey = (String, Variant, Prehash, Option<String>);

/// Group records by (algorithm, variant, prehash, machine) and average them.
/// Groups come out sorted by key.
pub fn summarize(records: &[TaggedRecord]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<GroupKey, Vec<&TaggedRecord>> = BTreeMap::new();
    for r in records {
        let p = &r.provenance;
        groups
            .entry((p.algorithm.clone(), p.variant, p.prehash, p.machine.clone()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((algorithm, variant, prehash, machine), rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&TaggedRecord) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;
            let sign_times = rows.iter().map(|r| r.record.sign_time);

            GroupSummary {
                algorithm,
                variant,
                prehash,
                machine,
                records: rows.len(),
                min_message_length: rows
                    .iter()
                    .map(|r| r.record.message_length)
                    .min()
                    .unwrap_or(0),
                max_message_length: rows
                    .iter()
                    .map(|r| r.record.message_length)
                    .max()
                    .unwrap_or(0),
                mean_public_key_size: mean(|r| r.record.public_key_size as f64),
                mean_private_key_size: mean(|r| r.record.private_key_size as f64),
                mean_signature_size: mean(|r| r.record.signature_size as f64),
                mean_keygen_time: mean(|r| r.record.keygen_time),
                mean_sign_time: mean(|r| r.record.sign_time),
                mean_verify_time: mean(|r| r.record.verify_time),
                min_sign_time: sign_times.clone().fold(f64::INFINITY, f64::min),
                max_sign_time: sign_times.fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}
