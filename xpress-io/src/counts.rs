//! Per-sample count files and delimited expression matrices.
//!
//! A count file has one identifier column and one or more value columns,
//! as written by HTSeq-count or featureCounts. Several files are merged
//! into one [`ExpressionMatrix`] through [`ExpressionMatrix::concat`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;
use xpress_core::{Result, XpressError};
use xpress_omics::expr::{ExpressionMatrix, SampleCounts};

/// How to read one count file.
#[derive(Debug, Clone, PartialEq)]
pub struct CountFileOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Column holding the counts; column 0 is the identifier.
    pub value_column: usize,
    /// Lines starting with this byte are ignored.
    pub comment: Option<u8>,
    /// Number of summary rows at the end of the file to discard
    /// (HTSeq writes five `__no_feature`-style rows).
    pub skip_trailing: usize,
}

impl Default for CountFileOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            has_header: false,
            value_column: 1,
            comment: Some(b'#'),
            skip_trailing: 0,
        }
    }
}

/// `,` for `.csv` files, tab for everything else.
pub fn delimiter_for(path: impl AsRef<Path>) -> u8 {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.ends_with(".csv") || name.ends_with(".csv.gz") {
        b','
    } else {
        b'\t'
    }
}

/// The file name up to its first `.` (`SRR001.counts.tsv` → `SRR001`).
pub fn sample_name_from_path(path: impl AsRef<Path>) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

pub(crate) fn csv_error(label: &str, e: ::csv::Error) -> XpressError {
    match e.kind() {
        ::csv::ErrorKind::Io(io) => XpressError::Io(std::io::Error::new(
            io.kind(),
            format!("{label}: {io}"),
        )),
        _ => XpressError::Format(format!("{label}: {e}")),
    }
}

pub(crate) fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Read one count file; the sample is named after the file.
pub fn read_count_file(path: impl AsRef<Path>, options: &CountFileOptions) -> Result<SampleCounts> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| XpressError::io_at(path, e))?;
    let label = path.display().to_string();
    let counts = read_counts(file, sample_name_from_path(path), options).map_err(|e| match e {
        XpressError::Format(msg) => XpressError::Format(format!("{label}: {msg}")),
        other => other,
    })?;
    debug!(path = %label, rows = counts.entries.len(), "read count file");
    Ok(counts)
}

/// Read count data for sample `name` from any reader.
pub fn read_counts<R: Read>(
    reader: R,
    name: impl Into<String>,
    options: &CountFileOptions,
) -> Result<SampleCounts> {
    let name = name.into();
    if options.value_column == 0 {
        return Err(XpressError::Configuration(
            "value column 0 is the identifier column".into(),
        ));
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .comment(options.comment)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in reader.records() {
        records.push(result.map_err(|e| csv_error(&name, e))?);
    }
    let keep = records.len().saturating_sub(options.skip_trailing);
    records.truncate(keep);

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let line = line_of(record);
        let id = record.get(0).unwrap_or("").trim();
        if id.is_empty() {
            return Err(XpressError::Format(format!("line {line}: empty identifier")));
        }
        let raw = record.get(options.value_column).ok_or_else(|| {
            XpressError::Format(format!(
                "line {line}: no column {} (found {} columns)",
                options.value_column,
                record.len()
            ))
        })?;
        let value: f64 = raw.trim().parse().map_err(|_| {
            XpressError::Format(format!("line {line}: invalid count '{raw}' for '{id}'"))
        })?;
        entries.push((id.to_string(), value));
    }
    Ok(SampleCounts::new(name, entries))
}

/// Read several count files and merge them, filling absent identifiers with `fill`.
pub fn read_count_matrix<P: AsRef<Path>>(
    paths: &[P],
    options: &CountFileOptions,
    fill: f64,
) -> Result<ExpressionMatrix> {
    let samples = paths
        .iter()
        .map(|p| read_count_file(p, options))
        .collect::<Result<Vec<_>>>()?;
    ExpressionMatrix::concat(&samples, fill)
}

/// Read a delimited matrix: a header row of sample names (the first cell
/// labels the identifier column), then one row per feature.
pub fn read_matrix(path: impl AsRef<Path>, delimiter: u8) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| XpressError::io_at(path, e))?;
    let label = path.display().to_string();
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .comment(Some(b'#'))
        .from_reader(file);

    let headers = reader.headers().map_err(|e| csv_error(&label, e))?.clone();
    let samples: Vec<String> = headers.iter().skip(1).map(|s| s.trim().to_string()).collect();

    let mut names = Vec::new();
    let mut data = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(&label, e))?;
        let line = line_of(&record);
        names.push(record.get(0).unwrap_or("").trim().to_string());
        for field in record.iter().skip(1) {
            let v: f64 = field.trim().parse().map_err(|_| {
                XpressError::Format(format!("{label}: line {line}: invalid value '{field}'"))
            })?;
            data.push(v);
        }
    }
    ExpressionMatrix::from_flat(data, names, samples)
        .map_err(|e| match e {
            XpressError::Format(msg) => XpressError::Format(format!("{label}: {msg}")),
            other => other,
        })
}

/// Write `matrix` as a delimited table with a header row.
pub fn write_matrix(path: impl AsRef<Path>, matrix: &ExpressionMatrix, delimiter: u8) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| XpressError::io_at(path, e))?;
    let label = path.display().to_string();
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(file);

    let mut header = vec!["id".to_string()];
    header.extend(matrix.sample_names().iter().cloned());
    writer.write_record(&header).map_err(|e| csv_error(&label, e))?;

    for (i, name) in matrix.feature_names().iter().enumerate() {
        let mut row = Vec::with_capacity(matrix.shape().1 + 1);
        row.push(name.clone());
        row.extend(matrix.row(i).unwrap_or_default().iter().map(|v| v.to_string()));
        writer.write_record(&row).map_err(|e| csv_error(&label, e))?;
    }
    writer
        .flush()
        .map_err(|e| XpressError::io_at(path, e))?;
    debug!(path = %label, rows = matrix.shape().0, "wrote matrix");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{}", content).unwrap();
        path
    }

    #[test]
    fn htseq_style_file() {
        let text = "ENSG1\t10\nENSG2\t0\nENSG3\t7\n__no_feature\t3\n__ambiguous\t1\n";
        let options = CountFileOptions {
            skip_trailing: 2,
            ..Default::default()
        };
        let counts = read_counts(text.as_bytes(), "s1", &options).unwrap();
        assert_eq!(counts.name, "s1");
        assert_eq!(counts.entries.len(), 3);
        assert_eq!(counts.entries[2], ("ENSG3".to_string(), 7.0));
    }

    #[test]
    fn header_comments_and_value_column() {
        let text = "# featureCounts\nGeneid,Length,sample\nG1,1500,4\nG2,900,11\n";
        let options = CountFileOptions {
            delimiter: b',',
            has_header: true,
            value_column: 2,
            ..Default::default()
        };
        let counts = read_counts(text.as_bytes(), "x", &options).unwrap();
        assert_eq!(counts.entries, vec![("G1".to_string(), 4.0), ("G2".to_string(), 11.0)]);
    }

    #[test]
    fn bad_count_names_line() {
        let err = read_counts("G1\t5\nG2\tfive\n".as_bytes(), "x", &CountFileOptions::default())
            .unwrap_err();
        match err {
            XpressError::Format(msg) => {
                assert!(msg.contains("line 2"), "{msg}");
                assert!(msg.contains("G2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_value_column() {
        let options = CountFileOptions {
            value_column: 3,
            ..Default::default()
        };
        assert!(matches!(
            read_counts("G1\t5\n".as_bytes(), "x", &options),
            Err(XpressError::Format(_))
        ));
    }

    #[test]
    fn sample_names_from_paths() {
        assert_eq!(sample_name_from_path("/data/SRR001.counts.tsv"), "SRR001");
        assert_eq!(sample_name_from_path("plain"), "plain");
        assert_eq!(delimiter_for("a/b.CSV"), b',');
        assert_eq!(delimiter_for("a/b.tsv"), b'\t');
    }

    #[test]
    fn merge_count_files() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "ctl_1.tsv", "G1\t5\nG2\t3\n");
        let b = write_file(dir.path(), "trt_1.tsv", "G2\t8\nG3\t1\n");
        let m = read_count_matrix(&[a, b], &CountFileOptions::default(), 0.0).unwrap();
        assert_eq!(m.sample_names(), &["ctl_1", "trt_1"]);
        assert_eq!(m.feature_names(), &["G1", "G2", "G3"]);
        assert_eq!(m.value("G3", "ctl_1"), Some(0.0));
        assert_eq!(m.value("G2", "trt_1"), Some(8.0));
    }

    #[test]
    fn duplicate_sample_files_rejected() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("other");
        std::fs::create_dir(&sub).unwrap();
        let a = write_file(dir.path(), "s.tsv", "G1\t5\n");
        let b = write_file(&sub, "s.counts", "G1\t6\n");
        assert!(matches!(
            read_count_matrix(&[a, b], &CountFileOptions::default(), 0.0),
            Err(XpressError::Format(_))
        ));
    }

    #[test]
    fn matrix_write_then_read() {
        let m = ExpressionMatrix::new(
            vec![vec![1.5, 2.0], vec![0.25, 8.0]],
            vec!["g1".into(), "g2".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        let file = NamedTempFile::with_suffix(".tsv").unwrap();
        write_matrix(file.path(), &m, b'\t').unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().next(), Some("id\ta\tb"));

        let back = read_matrix(file.path(), b'\t').unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_count_file("/nonexistent/s1.tsv", &CountFileOptions::default()).unwrap_err();
        assert!(matches!(err, XpressError::Io(_)));
    }
}
