//! Strand orientation for annotation records.

use core::fmt;

/// Strand orientation on a reference genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    /// Parse a GTF strand column. Anything other than `+` or `-` is unknown.
    pub fn from_symbol(symbol: &str) -> Strand {
        match symbol {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    /// Returns `true` if this is the forward (+) strand.
    pub fn is_forward(&self) -> bool {
        matches!(self, Strand::Forward)
    }

    /// Returns `true` if this is the reverse (-) strand.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
            Strand::Unknown => write!(f, "."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_round_trip() {
        for s in ["+", "-", "."] {
            assert_eq!(Strand::from_symbol(s).to_string(), s);
        }
        assert_eq!(Strand::from_symbol("?"), Strand::Unknown);
        assert!(Strand::from_symbol("-").is_reverse());
        assert!(Strand::from_symbol("+").is_forward());
    }
}
