use serde::Serialize;

use crate::error::{LayoutError, Result};
use crate::geometry::Vec2;

/// 1-indexed pairing table: `pairs[0]` holds the number of bases and
/// `pairs[i]` is the partner of base `i`, or 0 when unpaired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairTable {
    pairs: Vec<usize>,
}

impl PairTable {
    /// Build a table from a raw `[N, p1, ..., pN]` vector.
    ///
    /// Rejects tables that are not a proper non-crossing matching. Hairpins
    /// without a single unpaired base (`i` paired with `i + 1`) are rejected
    /// as well, since their loop would have no backbone to lay out.
    pub fn from_partners(pairs: Vec<usize>) -> Result<Self> {
        let declared = pairs.first().copied().unwrap_or(0);
        let actual = pairs.len().saturating_sub(1);
        if pairs.is_empty() || declared != actual {
            return Err(LayoutError::TableLength { declared, actual });
        }

        let n = declared;
        let mut open: Vec<usize> = Vec::new();
        for i in 1..=n {
            let p = pairs[i];
            if p == 0 {
                continue;
            }
            if p > n || p == i {
                return Err(LayoutError::PartnerOutOfRange { base: i, partner: p });
            }
            if pairs[p] != i {
                return Err(LayoutError::AsymmetricPair { base: i, partner: p });
            }
            if p > i {
                if p == i + 1 {
                    return Err(LayoutError::EmptyHairpin { base: i });
                }
                open.push(i);
            } else {
                match open.pop() {
                    Some(top) if top == p => {}
                    Some(top) => return Err(LayoutError::CrossingPairs { first: p, second: top }),
                    None => return Err(LayoutError::AsymmetricPair { base: i, partner: p }),
                }
            }
        }

        Ok(Self { pairs })
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.pairs[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partner of base `i`; 0 when unpaired or outside `1..=N`.
    pub fn partner(&self, i: usize) -> usize {
        if i == 0 {
            return 0;
        }
        self.pairs.get(i).copied().unwrap_or(0)
    }

    pub fn is_paired(&self, i: usize) -> bool {
        self.partner(i) != 0
    }

    /// The raw table including the length slot.
    pub fn as_slice(&self) -> &[usize] {
        &self.pairs
    }
}

/// Result of a layout pass.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct Layout {
    /// One coordinate per base, index-aligned with the table (base 1 first).
    pub coords: Vec<Vec2>,
    /// Configuration change attempts made during resolution.
    pub changes_applied: u32,
    /// Resolution stopped early because the change budget ran out.
    pub budget_exceeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table() {
        let pt = PairTable::from_partners(vec![7, 7, 6, 0, 0, 0, 2, 1]).unwrap();
        assert_eq!(pt.len(), 7);
        assert_eq!(pt.partner(1), 7);
        assert_eq!(pt.partner(4), 0);
        assert_eq!(pt.partner(0), 0);
        assert_eq!(pt.partner(8), 0);
        assert!(pt.is_paired(6));
    }

    #[test]
    fn test_empty_table() {
        let pt = PairTable::from_partners(vec![0]).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = PairTable::from_partners(vec![3, 0, 0]).unwrap_err();
        assert_eq!(err, LayoutError::TableLength { declared: 3, actual: 2 });
        assert!(PairTable::from_partners(vec![]).is_err());
    }

    #[test]
    fn test_rejects_asymmetric() {
        let err = PairTable::from_partners(vec![5, 5, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, LayoutError::AsymmetricPair { base: 1, partner: 5 });
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = PairTable::from_partners(vec![3, 9, 0, 0]).unwrap_err();
        assert_eq!(err, LayoutError::PartnerOutOfRange { base: 1, partner: 9 });
    }

    #[test]
    fn test_rejects_crossing() {
        // 1-6 and 3-8 cross
        let err = PairTable::from_partners(vec![8, 6, 0, 8, 0, 0, 1, 0, 3]).unwrap_err();
        assert_eq!(err, LayoutError::CrossingPairs { first: 1, second: 3 });
    }

    #[test]
    fn test_rejects_empty_hairpin() {
        let err = PairTable::from_partners(vec![4, 0, 3, 2, 0]).unwrap_err();
        assert_eq!(err, LayoutError::EmptyHairpin { base: 2 });
        assert!(err.to_string().contains("hairpin loops need at least one"));
    }
}
