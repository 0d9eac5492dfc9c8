//! GTF annotation records.
//!
//! A [`GtfRecord`] is one feature line: sequence region, source, feature
//! type, 1-based closed coordinates, score, strand, frame and the attribute
//! column. Many records share a `transcript_id`; many transcripts share a
//! `gene_id`. Records are never mutated; coordinate changes produce a new
//! record through [`GtfRecord::with_span`].

use core::fmt;

use xpress_core::{Result, XpressError};

use crate::genomic::Strand;

/// Attribute keys that carry a biotype, in lookup order.
pub const BIOTYPE_KEYS: [&str; 4] = [
    "gene_biotype",
    "gene_type",
    "transcript_biotype",
    "transcript_type",
];

/// One GTF feature line.
#[derive(Debug, Clone, PartialEq)]
pub struct GtfRecord {
    pub seqname: String,
    pub source: String,
    pub feature: String,
    /// 1-based start (inclusive).
    pub start: u64,
    /// 1-based end (inclusive).
    pub end: u64,
    /// Score column, kept verbatim (usually `.`).
    pub score: String,
    pub strand: Strand,
    /// Frame column, kept verbatim (`0`, `1`, `2` or `.`).
    pub frame: String,
    attributes: Vec<(String, String)>,
    raw_attributes: String,
}

impl GtfRecord {
    /// Build a record, validating that `start <= end`.
    ///
    /// `raw_attributes` is the original attribute column; it is written back
    /// unchanged so unquoted values and key order survive a round trip.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seqname: impl Into<String>,
        source: impl Into<String>,
        feature: impl Into<String>,
        start: u64,
        end: u64,
        score: impl Into<String>,
        strand: Strand,
        frame: impl Into<String>,
        raw_attributes: impl Into<String>,
    ) -> Result<Self> {
        if start > end {
            return Err(XpressError::Format(format!(
                "start ({start}) is greater than end ({end})"
            )));
        }
        let raw_attributes = raw_attributes.into();
        Ok(Self {
            seqname: seqname.into(),
            source: source.into(),
            feature: feature.into(),
            start,
            end,
            score: score.into(),
            strand,
            frame: frame.into(),
            attributes: parse_attributes(&raw_attributes),
            raw_attributes,
        })
    }

    /// Look up an attribute value by key (first occurrence).
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All parsed attributes in file order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// The attribute column as it appeared in the input.
    pub fn raw_attributes(&self) -> &str {
        &self.raw_attributes
    }

    pub fn gene_id(&self) -> Option<&str> {
        self.attribute("gene_id")
    }

    pub fn transcript_id(&self) -> Option<&str> {
        self.attribute("transcript_id")
    }

    pub fn gene_name(&self) -> Option<&str> {
        self.attribute("gene_name")
    }

    /// First biotype found under any of [`BIOTYPE_KEYS`].
    pub fn biotype(&self) -> Option<&str> {
        BIOTYPE_KEYS.iter().find_map(|k| self.attribute(k))
    }

    /// Whether any biotype attribute equals `value`.
    pub fn has_biotype(&self, value: &str) -> bool {
        BIOTYPE_KEYS
            .iter()
            .any(|k| self.attribute(k) == Some(value))
    }

    /// Feature length in bases (closed interval).
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A copy of this record with new coordinates.
    pub fn with_span(&self, start: u64, end: u64) -> Result<GtfRecord> {
        if start > end {
            return Err(XpressError::Format(format!(
                "start ({start}) is greater than end ({end})"
            )));
        }
        Ok(GtfRecord {
            start,
            end,
            ..self.clone()
        })
    }
}

impl fmt::Display for GtfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.seqname,
            self.source,
            self.feature,
            self.start,
            self.end,
            self.score,
            self.strand,
            self.frame,
            self.raw_attributes
        )
    }
}

/// Parse a GTF attribute column.
///
/// GTF format: `gene_id "ENSG00000141510"; gene_name "TP53"; level 2;`
/// Key-value pairs separated by `;`, values optionally quoted with `"`.
pub fn parse_attributes(attr_str: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for pair in attr_str.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        // Split on first whitespace: key "value"
        if let Some(space_pos) = pair.find(|c: char| c.is_whitespace()) {
            let key = pair[..space_pos].trim();
            let value = pair[space_pos..].trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            attrs.push((key.to_string(), value.to_string()));
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cds() -> GtfRecord {
        GtfRecord::new(
            "chr1",
            "ENSEMBL",
            "CDS",
            100,
            200,
            ".",
            Strand::Forward,
            "0",
            "gene_id \"G1\"; transcript_id \"T1\"; gene_name \"TP53\"; gene_biotype \"protein_coding\"; level 2;",
        )
        .unwrap()
    }

    #[test]
    fn attributes_quoted_and_bare() {
        let rec = cds();
        assert_eq!(rec.gene_id(), Some("G1"));
        assert_eq!(rec.transcript_id(), Some("T1"));
        assert_eq!(rec.gene_name(), Some("TP53"));
        assert_eq!(rec.attribute("level"), Some("2"));
        assert_eq!(rec.attribute("missing"), None);
    }

    #[test]
    fn biotype_lookup() {
        let rec = cds();
        assert_eq!(rec.biotype(), Some("protein_coding"));
        assert!(rec.has_biotype("protein_coding"));
        assert!(!rec.has_biotype("lncRNA"));
    }

    #[test]
    fn transcript_biotype_counts() {
        let rec = GtfRecord::new(
            "chr1", "src", "exon", 1, 10, ".", Strand::Reverse, ".",
            "gene_id \"G\"; gene_type \"lncRNA\"; transcript_type \"protein_coding\";",
        )
        .unwrap();
        assert_eq!(rec.biotype(), Some("lncRNA"));
        assert!(rec.has_biotype("protein_coding"));
    }

    #[test]
    fn inverted_interval_rejected() {
        let r = GtfRecord::new("chr1", "s", "CDS", 20, 10, ".", Strand::Forward, "0", "");
        assert!(matches!(r, Err(XpressError::Format(_))));
        assert!(cds().with_span(50, 40).is_err());
    }

    #[test]
    fn with_span_leaves_original() {
        let rec = cds();
        let moved = rec.with_span(115, 185).unwrap();
        assert_eq!((moved.start, moved.end), (115, 185));
        assert_eq!((rec.start, rec.end), (100, 200));
        assert_eq!(moved.raw_attributes(), rec.raw_attributes());
    }

    #[test]
    fn display_is_nine_columns() {
        let line = cds().to_string();
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[3], "100");
        assert_eq!(fields[6], "+");
        assert!(fields[8].ends_with("level 2;"));
    }

    #[test]
    fn length_is_closed_interval() {
        assert_eq!(cds().length(), 101);
    }
}
