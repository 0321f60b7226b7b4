use crate::error::{LayoutError, Result};
use crate::types::PairTable;

/// Parse dot-bracket notation into a 1-indexed pair table.
///
/// Characters: `(` = open pair, `)` = close pair, `.` = unpaired.
/// Leading and trailing whitespace is ignored. Positions in errors are
/// 1-based base indices.
///
/// Besides unbalanced brackets, an empty hairpin such as `()` is an error:
/// a hairpin loop needs at least one unpaired base to get a radius.
pub fn parse(input: &str) -> Result<PairTable> {
    let input = input.trim();
    let mut pairs: Vec<usize> = vec![0];
    let mut stack: Vec<usize> = Vec::new();

    for (idx, ch) in input.chars().enumerate() {
        let base = idx + 1;
        match ch {
            '(' => {
                pairs.push(0);
                stack.push(base);
            }
            ')' => {
                let j = stack
                    .pop()
                    .ok_or(LayoutError::UnbalancedBracket { position: base })?;
                pairs.push(j);
                pairs[j] = base;
            }
            '.' => pairs.push(0),
            _ => {
                return Err(LayoutError::UnexpectedCharacter {
                    character: ch,
                    position: base,
                })
            }
        }
    }

    if let Some(&open) = stack.last() {
        return Err(LayoutError::UnbalancedBracket { position: open });
    }

    pairs[0] = pairs.len() - 1;
    PairTable::from_partners(pairs)
}
