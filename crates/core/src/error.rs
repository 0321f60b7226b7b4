/// Errors raised while validating input for a layout pass.
///
/// Everything past validation recovers locally, so these are the only
/// failures a caller ever sees.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("unbalanced bracket at position {position}")]
    UnbalancedBracket { position: usize },
    #[error("unexpected character {character:?} at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("pair table declares {declared} bases but holds {actual}")]
    TableLength { declared: usize, actual: usize },
    #[error("base {base} has out-of-range partner {partner}")]
    PartnerOutOfRange { base: usize, partner: usize },
    #[error("base {base} points to {partner}, which does not point back")]
    AsymmetricPair { base: usize, partner: usize },
    #[error("pairs opened at {first} and {second} cross")]
    CrossingPairs { first: usize, second: usize },
    #[error("pair opened at base {base} encloses no unpaired base (hairpin loops need at least one)")]
    EmptyHairpin { base: usize },
    #[error("bond lengths must be positive and finite (paired {paired}, unpaired {unpaired})")]
    InvalidBondLength { paired: f64, unpaired: f64 },
}

pub type Result<T> = std::result::Result<T, LayoutError>;
