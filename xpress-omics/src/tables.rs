//! Identifier lookup tables: feature lengths and identifier conversion.
//!
//! Both tables can be filled from delimited files (see `xpress-io`) or
//! derived from parsed annotation records.

use std::collections::HashMap;

use xpress_core::{Result, XpressError};

use crate::annotation::GtfRecord;

/// Feature identifier → length in nucleotides.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneLengthTable {
    lengths: HashMap<String, f64>,
}

impl GeneLengthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a length. Lengths must be finite and positive.
    pub fn insert(&mut self, id: impl Into<String>, length: f64) -> Result<()> {
        let id = id.into();
        if !length.is_finite() || length <= 0.0 {
            return Err(XpressError::Data(format!(
                "length for '{id}' must be positive (got {length})"
            )));
        }
        self.lengths.insert(id, length);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.lengths.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.lengths.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (id, len) in pairs {
            table.insert(id, len)?;
        }
        Ok(table)
    }
}

/// Original identifier → canonical identifier (many-to-one).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionTable {
    map: HashMap<String, String>,
}

impl ConversionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping; a repeated original identifier keeps the last one.
    pub fn insert(&mut self, original: impl Into<String>, canonical: impl Into<String>) {
        self.map.insert(original.into(), canonical.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.map.get(original).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut table = Self::new();
        for (a, b) in pairs {
            table.insert(a, b);
        }
        table
    }
}

/// Which attribute keys a derived length table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LengthKey {
    TranscriptId,
    #[default]
    GeneId,
    GeneName,
}

/// Sum `feature` lengths per transcript, then key them by `key`.
///
/// With a gene key, the longest transcript of each gene supplies the length.
/// Records without a `transcript_id` are ignored.
pub fn lengths_from_records(
    records: &[GtfRecord],
    feature: &str,
    key: LengthKey,
) -> Result<GeneLengthTable> {
    // transcript_id -> (summed length, gene key)
    let mut transcripts: HashMap<&str, (u64, Option<&str>)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for rec in records.iter().filter(|r| r.feature == feature) {
        let Some(tx) = rec.transcript_id() else {
            continue;
        };
        let gene = match key {
            LengthKey::TranscriptId => Some(tx),
            LengthKey::GeneId => rec.gene_id(),
            LengthKey::GeneName => rec.gene_name(),
        };
        let entry = transcripts.entry(tx).or_insert_with(|| {
            order.push(tx);
            (0, gene)
        });
        entry.0 += rec.length();
        if entry.1.is_none() {
            entry.1 = gene;
        }
    }

    let mut best: HashMap<&str, u64> = HashMap::new();
    for tx in order {
        let (len, gene) = transcripts[tx];
        if let Some(g) = gene {
            let slot = best.entry(g).or_insert(0);
            *slot = (*slot).max(len);
        }
    }

    if best.is_empty() {
        return Err(XpressError::Data(format!(
            "no '{feature}' records with usable identifiers"
        )));
    }
    GeneLengthTable::from_pairs(best.into_iter().map(|(k, v)| (k, v as f64)))
}

/// Build a conversion table from two attributes present on the same record
/// (for example `gene_id` → `gene_name`).
pub fn conversion_from_records(records: &[GtfRecord], from: &str, to: &str) -> ConversionTable {
    let mut table = ConversionTable::new();
    for rec in records {
        if let (Some(a), Some(b)) = (rec.attribute(from), rec.attribute(to)) {
            table.insert(a, b);
        }
    }
    table
}
