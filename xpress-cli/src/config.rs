//! JSON pipeline configuration.
//!
//! Every field is optional; missing fields take their documented defaults.
//!
//! ```json
//! {
//!   "fill": 0,
//!   "collapse": { "reduction": "mean" },
//!   "convert": { "unit": "rpkm", "log": { "base": 2, "pseudocount": 1 } },
//!   "filter": { "min_row_total": 10 },
//!   "batch": { "batch_key": "batch", "parametric": true }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use xpress_omics::PipelineConfig;

/// Load a config file, or the defaults when no path is given.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use xpress_omics::{Reduction, UnitKind};

    #[test]
    fn defaults_without_file() {
        assert_eq!(load(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"collapse": {{"reduction": "mean"}}, "convert": {{"unit": "tpm", "log": {{}}}}, "filter": {{"min_row_total": 10}}}}"#
        )
        .unwrap();
        let config = load(Some(f.path())).unwrap();
        assert_eq!(config.collapse.reduction, Reduction::Mean);
        assert_eq!(config.convert.unit, UnitKind::Tpm);
        let log = config.convert.log.unwrap();
        assert_eq!((log.base, log.pseudocount), (2.0, 1.0));
        assert_eq!(config.filter.min_row_total, Some(10.0));
        assert_eq!(config.filter.label_key, "group");
        assert!(config.batch.is_none());
    }

    #[test]
    fn batch_section_enables_correction() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, r#"{{"batch": {{"parametric": false}}}}"#).unwrap();
        let batch = load(Some(f.path())).unwrap().batch.unwrap();
        assert!(!batch.parametric);
        assert_eq!(batch.batch_key, "batch");
    }

    #[test]
    fn malformed_json_names_file() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let err = load(Some(f.path())).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
