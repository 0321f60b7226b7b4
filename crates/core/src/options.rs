use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LayoutError, Result};

/// How the rotation direction for an ancestor fix is chosen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RotationSign {
    /// Net turning angle along the reduced path.
    #[default]
    PathTurning,
    /// Net turning angle plus a quarter-turn correction for loop/bulge hits.
    PathTurningBulgeAware,
}

/// Strategy for shrinking a loop radius during optimization.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RadiusSearch {
    /// Ten evenly spaced candidates from the minimum upward.
    #[default]
    Linear,
    /// Bisection down to a step of ten length units.
    Binary,
}

/// Tunables for one layout pass. Omitted JSON fields take their defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PuzzlerOptions {
    /// Distance between paired bases (default: 35.0)
    pub paired: f64,
    /// Distance between consecutive backbone bases (default: 25.0)
    pub unpaired: f64,
    /// Resolve loops dipping below the exterior line (default: true)
    pub check_exterior: bool,
    /// Resolve overlaps between sibling branches (default: true)
    pub check_siblings: bool,
    /// Resolve overlaps between a loop and its ancestors (default: true)
    pub check_ancestors: bool,
    /// Shrink inflated loops once intersection-free (default: true)
    pub optimize: bool,
    /// Mirror colliding exterior branches below the exterior line (default: false)
    pub allow_flipping: bool,
    /// Ceiling on configuration change attempts (default: 25000)
    pub max_changes: u32,
    pub rotation_sign: RotationSign,
    pub radius_search: RadiusSearch,
}

impl Default for PuzzlerOptions {
    fn default() -> Self {
        Self {
            paired: 35.0,
            unpaired: 25.0,
            check_exterior: true,
            check_siblings: true,
            check_ancestors: true,
            optimize: true,
            allow_flipping: false,
            max_changes: 25000,
            rotation_sign: RotationSign::default(),
            radius_search: RadiusSearch::default(),
        }
    }
}

impl PuzzlerOptions {
    /// Whether any intersection class is checked at all.
    pub fn any_check(&self) -> bool {
        self.check_exterior || self.check_siblings || self.check_ancestors
    }

    pub fn validate(&self) -> Result<()> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if !ok(self.paired) || !ok(self.unpaired) {
            return Err(LayoutError::InvalidBondLength {
                paired: self.paired,
                unpaired: self.unpaired,
            });
        }
        if self.paired / self.unpaired > 2.0 {
            warn!(
                paired = self.paired,
                unpaired = self.unpaired,
                "paired:unpaired ratio above 2.0, layout may degrade"
            );
        }
        Ok(())
    }
}

/// Options plus the counters of a single layout pass.
#[derive(Clone, Debug)]
pub struct Puzzler {
    pub options: PuzzlerOptions,
    /// Configuration change attempts so far, rejected ones included.
    pub changes_applied: u32,
    /// Set once an attempt was refused because the ceiling was reached.
    pub budget_exceeded: bool,
}

impl Puzzler {
    pub fn new(options: PuzzlerOptions) -> Self {
        Self {
            options,
            changes_applied: 0,
            budget_exceeded: false,
        }
    }

    /// Whether the change budget is used up. Flags the pass when it is.
    ///
    /// The budget is spent once `changes_applied` reaches `max_changes`, so
    /// at most `max_changes` attempts are ever made and the counter never
    /// exceeds the ceiling.
    pub fn exhausted(&mut self) -> bool {
        if self.changes_applied >= self.options.max_changes {
            if !self.budget_exceeded {
                warn!(
                    max_changes = self.options.max_changes,
                    "change budget exhausted, returning best-effort layout"
                );
            }
            self.budget_exceeded = true;
        }
        self.budget_exceeded
    }

    /// Count one change attempt, or refuse it when the budget is used up.
    pub fn spend(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.changes_applied += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let opts: PuzzlerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, PuzzlerOptions::default());
        assert!(opts.any_check());
    }

    #[test]
    fn test_partial_json() {
        let opts: PuzzlerOptions =
            serde_json::from_str(r#"{"paired": 40.0, "radius_search": "binary"}"#).unwrap();
        assert_eq!(opts.paired, 40.0);
        assert_eq!(opts.unpaired, 25.0);
        assert_eq!(opts.radius_search, RadiusSearch::Binary);
        assert_eq!(opts.rotation_sign, RotationSign::PathTurning);
    }

    #[test]
    fn test_rejects_bad_bond_lengths() {
        let opts = PuzzlerOptions {
            unpaired: 0.0,
            ..PuzzlerOptions::default()
        };
        assert!(opts.validate().is_err());
        let opts = PuzzlerOptions {
            paired: f64::NAN,
            ..PuzzlerOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(PuzzlerOptions::default().validate().is_ok());
    }

    #[test]
    fn test_budget_never_overruns() {
        let mut puzzler = Puzzler::new(PuzzlerOptions {
            max_changes: 3,
            ..PuzzlerOptions::default()
        });
        let granted = (0..10).filter(|_| puzzler.spend()).count();
        assert_eq!(granted, 3);
        assert_eq!(puzzler.changes_applied, 3);
        assert!(puzzler.budget_exceeded);
    }

    #[test]
    fn test_budget_is_spent_at_the_ceiling() {
        let mut puzzler = Puzzler::new(PuzzlerOptions {
            max_changes: 1,
            ..PuzzlerOptions::default()
        });
        assert!(!puzzler.exhausted());
        assert!(puzzler.spend());
        assert_eq!(puzzler.changes_applied, 1);
        assert!(puzzler.exhausted());
        assert!(!puzzler.spend());
        assert_eq!(puzzler.changes_applied, 1);
    }
}
