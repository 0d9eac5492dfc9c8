//! Drop-and-report results.
//!
//! Several stages remove rows or columns they cannot process (unmapped
//! probes, rows without a length, zero-variance rows, short transcripts).
//! They all return a [`Reported`] so the caller can see exactly what was
//! removed and decide whether the loss is acceptable.

/// An operation's output plus the identifiers it excluded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reported<T> {
    /// The transformed value.
    pub output: T,
    /// Identifiers excluded from (or passed through) the operation, in the
    /// order they were encountered.
    pub excluded: Vec<String>,
}

impl<T> Reported<T> {
    /// Wrap an output with nothing excluded.
    pub fn clean(output: T) -> Self {
        Self {
            output,
            excluded: Vec::new(),
        }
    }

    /// Wrap an output with a list of excluded identifiers.
    pub fn new(output: T, excluded: Vec<String>) -> Self {
        Self { output, excluded }
    }

    /// Number of excluded identifiers.
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    /// Whether anything was excluded.
    pub fn is_clean(&self) -> bool {
        self.excluded.is_empty()
    }

    /// Transform the output, keeping the exclusion list.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reported<U> {
        Reported {
            output: f(self.output),
            excluded: self.excluded,
        }
    }

    /// Split into `(output, excluded)`.
    pub fn into_parts(self) -> (T, Vec<String>) {
        (self.output, self.excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_has_no_exclusions() {
        let r = Reported::clean(5);
        assert!(r.is_clean());
        assert_eq!(r.excluded_count(), 0);
    }

    #[test]
    fn map_keeps_exclusions() {
        let r = Reported::new(2, vec!["p7".into(), "p9".into()]).map(|x| x * 10);
        assert_eq!(r.output, 20);
        assert_eq!(r.excluded_count(), 2);
        let (out, excluded) = r.into_parts();
        assert_eq!(out, 20);
        assert_eq!(excluded, vec!["p7", "p9"]);
    }
}
