//! Combination Generator - cartesian product over variation axes
//!
//! Deterministic order: axes in supplied order, within an axis the original
//! value first then variations in stored order, and the last axis varies
//! fastest. The total count is available in O(#axes) before generation so
//! callers can warn or cap on combinatorial blow-up without materializing
//! anything.

use crate::domain::error::{DomainError, Result};
use crate::domain::{Axis, Combination, Selection};

/// Number of combinations the given axes produce, without generating them.
///
/// Product of axis lengths; saturates at u64::MAX. Zero axes yield exactly
/// one combination (the unchanged template).
pub fn combination_count(axes: &[Axis]) -> u64 {
    axes.iter()
        .fold(1u64, |acc, axis| acc.saturating_mul(axis.len() as u64))
}

/// Validate axes before enumeration.
///
/// Rejects kind-inconsistent variations and duplicate (element, kind) axes -
/// both would make a combination ambiguous.
pub fn validate_axes(axes: &[Axis]) -> Result<()> {
    for (i, axis) in axes.iter().enumerate() {
        if !axis.original.matches_kind(axis.kind) {
            return Err(DomainError::ValidationError(format!(
                "axis {} original value does not match kind {}",
                axis.element_id, axis.kind
            )));
        }
        for v in &axis.variations {
            if v.kind != axis.kind || !v.value.matches_kind(axis.kind) {
                return Err(DomainError::ValidationError(format!(
                    "axis {} contains variation {} of mismatched kind",
                    axis.element_id, v.id
                )));
            }
        }
        if axes[..i]
            .iter()
            .any(|other| other.element_id == axis.element_id && other.kind == axis.kind)
        {
            return Err(DomainError::ValidationError(format!(
                "duplicate axis for element {} kind {}",
                axis.element_id, axis.kind
            )));
        }
    }
    Ok(())
}

/// Enumerate the full cartesian product of the given axes.
///
/// Every combination carries exactly one selection per axis. Pure; the only
/// failure mode is a malformed axis rejected up front.
pub fn generate_combinations(axes: &[Axis]) -> Result<Vec<Combination>> {
    validate_axes(axes)?;

    let mut out = Vec::with_capacity(combination_count(axes).min(1024) as usize);
    let mut current = Combination::new();
    expand(axes, 0, &mut current, &mut out);
    Ok(out)
}

// Depth-first expansion: one frame per axis, candidates in index order.
fn expand(axes: &[Axis], depth: usize, current: &mut Combination, out: &mut Vec<Combination>) {
    if depth == axes.len() {
        out.push(current.clone());
        return;
    }
    let axis = &axes[depth];
    for index in 0..axis.len() {
        let value = axis
            .value_at(index)
            .cloned()
            .unwrap_or_else(|| axis.original.clone());
        current.push(Selection {
            element_id: axis.element_id.clone(),
            kind: axis.kind,
            index,
            axis_len: axis.len(),
            value,
            original: axis.original.clone(),
        });
        expand(axes, depth + 1, current, out);
        current.pop();
    }
}
