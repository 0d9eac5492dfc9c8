//! Two-column lookup files: identifier conversion, feature lengths and
//! sample batch labels, plus microarray platform references.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};
use xpress_core::{Reported, Result, XpressError};
use xpress_omics::tables::{ConversionTable, GeneLengthTable};

use crate::counts::{csv_error, line_of};

/// Layout of a two-column table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            has_header: false,
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| XpressError::io_at(path, e))
}

fn pairs<R: Read>(reader: R, label: &str, options: &TableOptions) -> Result<Vec<(u64, String, String)>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);
    let mut out = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(label, e))?;
        let line = line_of(&record);
        match (record.get(0), record.get(1)) {
            (Some(a), Some(b)) if !a.trim().is_empty() => {
                out.push((line, a.trim().to_string(), b.trim().to_string()))
            }
            _ => {
                return Err(XpressError::Format(format!(
                    "{label}: line {line}: expected two columns"
                )))
            }
        }
    }
    Ok(out)
}

/// Read `original → canonical` pairs.
pub fn read_conversion_table(path: impl AsRef<Path>, options: &TableOptions) -> Result<ConversionTable> {
    let path = path.as_ref();
    let rows = pairs(open(path)?, &path.display().to_string(), options)?;
    let table = ConversionTable::from_pairs(rows.into_iter().map(|(_, a, b)| (a, b)));
    debug!(path = %path.display(), entries = table.len(), "read conversion table");
    Ok(table)
}

/// Read `identifier → length` pairs. Lengths must be positive numbers.
pub fn read_length_table(path: impl AsRef<Path>, options: &TableOptions) -> Result<GeneLengthTable> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let mut table = GeneLengthTable::new();
    for (line, id, raw) in pairs(open(path)?, &label, options)? {
        let len: f64 = raw.parse().map_err(|_| {
            XpressError::Format(format!("{label}: line {line}: invalid length '{raw}'"))
        })?;
        table.insert(id, len).map_err(|e| match e {
            XpressError::Data(msg) => XpressError::Format(format!("{label}: line {line}: {msg}")),
            other => other,
        })?;
    }
    Ok(table)
}

/// Read `sample → batch` pairs (tab-separated, no header).
pub fn read_batch_labels(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let rows = pairs(open(path)?, &path.display().to_string(), &TableOptions::default())?;
    Ok(rows.into_iter().map(|(_, s, b)| (s, b)).collect())
}

/// Write a length table as `id<TAB>length` lines, sorted by identifier.
pub fn write_length_table(path: impl AsRef<Path>, table: &GeneLengthTable) -> Result<()> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let file = File::create(path).map_err(|e| XpressError::io_at(path, e))?;
    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    let mut rows: Vec<(&str, f64)> = table.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    for (id, len) in rows {
        writer
            .write_record([id, len.to_string().as_str()])
            .map_err(|e| csv_error(&label, e))?;
    }
    writer.flush().map_err(|e| XpressError::io_at(path, e))?;
    Ok(())
}

/// Options for reading a microarray platform annotation (GEO `GPL` table).
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReferenceOptions {
    pub id_column: String,
    pub symbol_column: String,
    /// Drop probes annotated to several genes (`A /// B`).
    pub drop_multimappers: bool,
    /// Keep only probes whose symbol is in this list (case-insensitive).
    pub genes: Option<Vec<String>>,
}

impl Default for ProbeReferenceOptions {
    fn default() -> Self {
        Self {
            id_column: "ID".into(),
            symbol_column: "Gene Symbol".into(),
            drop_multimappers: true,
            genes: None,
        }
    }
}

const MULTIMAP_SEPARATOR: &str = "///";

fn column(headers: &StringRecord, name: &str, label: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| XpressError::Format(format!("{label}: no '{name}' column in header")))
}

/// Read a tab-separated platform table into a probe → gene symbol table.
///
/// Probes without a symbol, multimapping probes (when requested) and probes
/// outside the gene list are excluded and reported.
pub fn read_probe_reference(
    path: impl AsRef<Path>,
    options: &ProbeReferenceOptions,
) -> Result<Reported<ConversionTable>> {
    let path = path.as_ref();
    let label = path.display().to_string();
    parse_probe_reference(open(path)?, &label, options)
}

/// [`read_probe_reference`] over any reader.
pub fn parse_probe_reference<R: Read>(
    reader: R,
    label: &str,
    options: &ProbeReferenceOptions,
) -> Result<Reported<ConversionTable>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error(label, e))?.clone();
    let id_col = column(&headers, &options.id_column, label)?;
    let symbol_col = column(&headers, &options.symbol_column, label)?;

    let wanted: Option<HashSet<String>> = options
        .genes
        .as_ref()
        .map(|g| g.iter().map(|s| s.trim().to_uppercase()).collect());

    let mut table = ConversionTable::new();
    let mut excluded = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(label, e))?;
        let id = record.get(id_col).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let symbol = record.get(symbol_col).unwrap_or("").trim();
        let multimapped = symbol.contains(MULTIMAP_SEPARATOR);
        let in_list = match &wanted {
            None => true,
            Some(set) => symbol
                .split(MULTIMAP_SEPARATOR)
                .any(|s| set.contains(&s.trim().to_uppercase())),
        };
        if symbol.is_empty() || (multimapped && options.drop_multimappers) || !in_list {
            excluded.push(id.to_string());
            continue;
        }
        table.insert(id, symbol);
    }

    if !excluded.is_empty() {
        warn!(probes = excluded.len(), "probe reference: probes excluded");
    }
    Ok(Reported::new(table, excluded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tmp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    const PLATFORM: &str = "#ID = probe identifier\n\
        ID\tGB_ACC\tGene Symbol\n\
        1007_s_at\tU48705\tDDR1 /// MIR4640\n\
        1053_at\tM87338\tRFC2\n\
        117_at\tX51757\tHSPA6\n\
        121_at\tX69699\t\n\
        1255_g_at\tL36861\tGUCA1A\n";

    #[test]
    fn conversion_table_file() {
        let f = write_tmp("p1\tA\np2\tB\np1\tC\n");
        let t = read_conversion_table(f.path(), &TableOptions::default()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("p1"), Some("C"));
    }

    #[test]
    fn length_table_with_header() {
        let f = write_tmp("gene,length\nG1,1200\nG2,850.5\n");
        let options = TableOptions {
            delimiter: b',',
            has_header: true,
        };
        let t = read_length_table(f.path(), &options).unwrap();
        assert_eq!(t.get("G2"), Some(850.5));
    }

    #[test]
    fn length_table_rejects_bad_values() {
        let f = write_tmp("G1\t100\nG2\tlong\n");
        let err = read_length_table(f.path(), &TableOptions::default()).unwrap_err();
        assert!(matches!(err, XpressError::Format(ref m) if m.contains("line 2")));
        let f = write_tmp("G1\t0\n");
        assert!(matches!(
            read_length_table(f.path(), &TableOptions::default()),
            Err(XpressError::Format(_))
        ));
    }

    #[test]
    fn single_column_row_is_format_error() {
        let f = write_tmp("s1\tA\ns2\n");
        assert!(matches!(read_batch_labels(f.path()), Err(XpressError::Format(_))));
    }

    #[test]
    fn batch_label_file() {
        let f = write_tmp("s1\tA\ns2\tA\ns3\tB\n");
        let labels = read_batch_labels(f.path()).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["s3"], "B");
    }

    #[test]
    fn length_table_round_trip() {
        let t = GeneLengthTable::from_pairs([("b", 20.0), ("a", 10.5)]).unwrap();
        let f = NamedTempFile::new().unwrap();
        write_length_table(f.path(), &t).unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "a\t10.5\nb\t20\n");
        assert_eq!(read_length_table(f.path(), &TableOptions::default()).unwrap(), t);
    }

    #[test]
    fn probe_reference_drops_multimappers() {
        let r = parse_probe_reference(PLATFORM.as_bytes(), "gpl", &ProbeReferenceOptions::default())
            .unwrap();
        assert_eq!(r.output.len(), 3);
        assert_eq!(r.output.get("1053_at"), Some("RFC2"));
        assert_eq!(r.output.get("1007_s_at"), None);
        assert_eq!(r.excluded, vec!["1007_s_at".to_string(), "121_at".to_string()]);
    }

    #[test]
    fn probe_reference_keeps_multimappers_when_asked() {
        let options = ProbeReferenceOptions {
            drop_multimappers: false,
            ..Default::default()
        };
        let r = parse_probe_reference(PLATFORM.as_bytes(), "gpl", &options).unwrap();
        assert_eq!(r.output.get("1007_s_at"), Some("DDR1 /// MIR4640"));
    }

    #[test]
    fn probe_reference_gene_list() {
        let options = ProbeReferenceOptions {
            genes: Some(vec!["rfc2".into(), "hspa6".into()]),
            ..Default::default()
        };
        let r = parse_probe_reference(PLATFORM.as_bytes(), "gpl", &options).unwrap();
        assert_eq!(r.output.len(), 2);
        assert!(r.output.get("1255_g_at").is_none());
    }

    #[test]
    fn probe_reference_missing_column() {
        let options = ProbeReferenceOptions {
            symbol_column: "Symbol".into(),
            ..Default::default()
        };
        assert!(matches!(
            parse_probe_reference(PLATFORM.as_bytes(), "gpl", &options),
            Err(XpressError::Format(_))
        ));
    }
}
