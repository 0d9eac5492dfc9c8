//! GTF (Gene Transfer Format / GFF2) reading and writing.
//!
//! Records keep GTF's 1-based closed coordinates and the attribute column as
//! written, so a parse → write round trip reproduces every data line.
//! Files ending in `.gz` are decompressed transparently.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::debug;
use xpress_core::{Result, XpressError};
use xpress_omics::annotation::GtfRecord;
use xpress_omics::genomic::Strand;

/// Parse a GTF file (plain or gzip-compressed).
pub fn parse_gtf(path: impl AsRef<Path>) -> Result<Vec<GtfRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| XpressError::io_at(path, e))?;
    let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let records = read_gtf(BufReader::new(inner)).map_err(|e| match e {
        XpressError::Io(io) => XpressError::io_at(path, io),
        XpressError::Format(msg) => XpressError::Format(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    debug!(path = %path.display(), records = records.len(), "parsed GTF");
    Ok(records)
}

/// Parse GTF text already in memory.
pub fn parse_gtf_str(text: &str) -> Result<Vec<GtfRecord>> {
    read_gtf(text.as_bytes())
}

/// Parse GTF records from any buffered reader.
///
/// Blank lines and `#` comments are skipped.
pub fn read_gtf<R: BufRead>(reader: R) -> Result<Vec<GtfRecord>> {
    let mut records = Vec::new();
    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| {
            XpressError::Io(std::io::Error::new(
                e.kind(),
                format!("line {}: {}", line_num + 1, e),
            ))
        })?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        records.push(parse_gtf_line(line, line_num + 1)?);
    }
    Ok(records)
}

/// Parse one 9-column data line. `line_num` is 1-based and only used in errors.
pub fn parse_gtf_line(line: &str, line_num: usize) -> Result<GtfRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 9 {
        return Err(XpressError::Format(format!(
            "line {line_num}: expected 9 tab-separated columns, found {}",
            fields.len()
        )));
    }

    let coord = |idx: usize, name: &str| -> Result<u64> {
        fields[idx].trim().parse::<u64>().map_err(|_| {
            XpressError::Format(format!(
                "line {line_num}: invalid {name} '{}'",
                fields[idx]
            ))
        })
    };
    let start = coord(3, "start")?;
    let end = coord(4, "end")?;

    GtfRecord::new(
        fields[0],
        fields[1],
        fields[2],
        start,
        end,
        fields[5],
        Strand::from_symbol(fields[6]),
        fields[7],
        fields[8],
    )
    .map_err(|e| match e {
        XpressError::Format(msg) => XpressError::Format(format!("line {line_num}: {msg}")),
        other => other,
    })
}

/// Render records as GTF text, one line per record.
pub fn gtf_to_string(records: &[GtfRecord]) -> String {
    let mut out = String::new();
    for rec in records {
        out.push_str(&rec.to_string());
        out.push('\n');
    }
    out
}

/// Write records to `path` as plain GTF.
pub fn write_gtf(path: impl AsRef<Path>, records: &[GtfRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| XpressError::io_at(path, e))?;
    let mut writer = BufWriter::new(file);
    for rec in records {
        writeln!(writer, "{rec}").map_err(|e| XpressError::io_at(path, e))?;
    }
    writer.flush().map_err(|e| XpressError::io_at(path, e))?;
    debug!(path = %path.display(), records = records.len(), "wrote GTF");
    Ok(())
}
