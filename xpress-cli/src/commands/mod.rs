mod lengths;
mod normalize;
mod reference;

pub use lengths::{run_lengths, LengthsArgs};
pub use normalize::{run_normalize, NormalizeArgs};
pub use reference::{run_reference, ReferenceArgs};
