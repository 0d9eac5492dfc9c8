//! Reference annotation preparation for ribosome profiling.
//!
//! Two outputs are derived from parsed GTF records:
//!
//! - a coding-only annotation: the records whose biotype matches
//!   [`ReferenceConfig::biotype`];
//! - a truncated annotation: each transcript's CDS records clipped so the
//!   first and last `truncate_amount` nucleotides of its spliced coding
//!   sequence are excluded, removing footprints that pile up at initiating
//!   and terminating ribosomes.
//!
//! Coordinates stay genomic (1-based, closed). On the `+` strand the 5′ end
//! is the lower coordinate; on the `-` strand it is the upper one.

use std::collections::HashMap;

use tracing::{debug, warn};
use xpress_core::{Reported, Result};

use crate::annotation::GtfRecord;
use crate::genomic::Strand;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReferenceConfig {
    /// Restrict both outputs to records carrying `biotype`.
    pub coding_only: bool,
    pub biotype: String,
    /// Nucleotides removed from each end of every coding span.
    pub truncate_amount: u64,
    /// Feature type that defines a transcript's coding span.
    pub feature: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            coding_only: true,
            biotype: "protein_coding".into(),
            truncate_amount: 45,
            feature: "CDS".into(),
        }
    }
}

/// The two annotation sets produced by [`build_reference`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOutputs {
    pub coding: Vec<GtfRecord>,
    /// Clipped CDS records; `excluded` lists transcripts too short to truncate.
    pub truncated: Reported<Vec<GtfRecord>>,
}

/// Shorten `[start, end]` by `five_prime` at the 5′ end and `three_prime` at
/// the 3′ end, honouring strand.
///
/// Returns `None` when `end - start` does not exceed the total amount
/// removed. Unknown strand is treated as `+`.
pub fn truncate_interval(
    start: u64,
    end: u64,
    strand: Strand,
    five_prime: u64,
    three_prime: u64,
) -> Option<(u64, u64)> {
    if five_prime == 0 && three_prime == 0 {
        return Some((start, end));
    }
    if end < start || end - start <= five_prime + three_prime {
        return None;
    }
    Some(trim(start, end, strand, five_prime, three_prime))
}

fn trim(start: u64, end: u64, strand: Strand, five_prime: u64, three_prime: u64) -> (u64, u64) {
    let (low, high) = match strand {
        Strand::Reverse => (three_prime, five_prime),
        Strand::Forward | Strand::Unknown => (five_prime, three_prime),
    };
    (start + low, end - high)
}

/// Records whose biotype equals `biotype`, in input order.
pub fn coding_only(records: &[GtfRecord], biotype: &str) -> Vec<GtfRecord> {
    records
        .iter()
        .filter(|r| r.has_biotype(biotype))
        .cloned()
        .collect()
}

/// Per-record (5′, 3′) trim amounts for one transcript, or `None` when its
/// coding sequence is too short. Fully consumed records are left out.
fn plan_transcript(records: &[GtfRecord], members: &[usize], n: u64) -> Option<Vec<(usize, (u64, u64))>> {
    if n == 0 {
        return Some(members.iter().map(|&i| (i, (0, 0))).collect());
    }
    let coding: u64 = members.iter().map(|&i| records[i].length()).sum();
    // same bound as truncate_interval, measured in transcript coordinates
    if coding <= n.saturating_mul(2).saturating_add(1) {
        return None;
    }

    let mut ordered = members.to_vec();
    ordered.sort_by_key(|&i| records[i].start);
    if records[members[0]].strand.is_reverse() {
        ordered.reverse();
    }
    let lengths: Vec<u64> = ordered.iter().map(|&i| records[i].length()).collect();

    let mut five = vec![0u64; ordered.len()];
    let mut remaining = n;
    for (k, &len) in lengths.iter().enumerate() {
        five[k] = remaining.min(len);
        remaining -= five[k];
        if remaining == 0 {
            break;
        }
    }
    let mut three = vec![0u64; ordered.len()];
    remaining = n;
    for (k, &len) in lengths.iter().enumerate().rev() {
        three[k] = remaining.min(len);
        remaining -= three[k];
        if remaining == 0 {
            break;
        }
    }

    Some(
        ordered
            .iter()
            .enumerate()
            .filter(|&(k, _)| five[k] + three[k] < lengths[k])
            .map(|(k, &i)| (i, (five[k], three[k])))
            .collect(),
    )
}

/// Remove the first and last `config.truncate_amount` coding nucleotides of
/// every transcript.
///
/// Amounts are counted along the spliced coding sequence, 5′ to 3′ by
/// strand, so introns never count toward the amount. Records consumed
/// entirely are removed and the record where the amount runs out is
/// clipped. Records without a `transcript_id` and records of other feature
/// types are not part of the output. A transcript whose coding length does
/// not exceed `2 * truncate_amount + 1` is dropped and reported by
/// `transcript_id`.
pub fn truncate_cds(records: &[GtfRecord], config: &ReferenceConfig) -> Result<Reported<Vec<GtfRecord>>> {
    let mut members: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        if rec.feature != config.feature {
            continue;
        }
        let Some(tx) = rec.transcript_id() else {
            continue;
        };
        members
            .entry(tx)
            .or_insert_with(|| {
                order.push(tx);
                Vec::new()
            })
            .push(i);
    }

    let n = config.truncate_amount;
    let mut cuts: HashMap<usize, (u64, u64)> = HashMap::new();
    let mut excluded = Vec::new();
    for &tx in &order {
        match plan_transcript(records, &members[tx], n) {
            Some(plan) => cuts.extend(plan),
            None => excluded.push(tx.to_string()),
        }
    }

    let mut out = Vec::with_capacity(cuts.len());
    for (i, rec) in records.iter().enumerate() {
        let Some(&(five, three)) = cuts.get(&i) else {
            continue;
        };
        let (start, end) = trim(rec.start, rec.end, rec.strand, five, three);
        out.push(rec.with_span(start, end)?);
    }

    if !excluded.is_empty() {
        warn!(
            transcripts = excluded.len(),
            amount = n,
            "truncation: coding sequences too short were dropped"
        );
    }
    debug!(transcripts = order.len() - excluded.len(), records = out.len(), "truncation");
    Ok(Reported::new(out, excluded))
}

/// Build the coding-only and truncated annotation sets.
pub fn build_reference(records: &[GtfRecord], config: &ReferenceConfig) -> Result<ReferenceOutputs> {
    let coding = if config.coding_only {
        coding_only(records, &config.biotype)
    } else {
        records.to_vec()
    };
    if coding.is_empty() {
        warn!(biotype = %config.biotype, "no records matched the coding biotype");
    }
    let truncated = truncate_cds(&coding, config)?;
    Ok(ReferenceOutputs { coding, truncated })
}
