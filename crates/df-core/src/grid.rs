//! Time grid helpers.

use crate::{DfError, DfResult, Real};

/// `n` points evenly spaced over `[start, end]`, both ends included.
///
/// `n == 1` yields `[start]`. The last point is exactly `end`.
pub fn linspace(start: Real, end: Real, n: usize) -> DfResult<Vec<Real>> {
    if n == 0 {
        return Err(DfError::InvalidArg {
            what: "grid needs at least one point",
        });
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(DfError::InvalidArg {
            what: "grid bounds must be finite",
        });
    }
    if n == 1 {
        return Ok(vec![start]);
    }
    let step = (end - start) / (n - 1) as Real;
    let mut grid: Vec<Real> = (0..n).map(|i| start + step * i as Real).collect();
    grid[n - 1] = end;
    Ok(grid)
}

/// Check that a grid is non-empty, finite and strictly increasing.
pub fn validate_grid(grid: &[Real]) -> DfResult<()> {
    if grid.is_empty() {
        return Err(DfError::InvalidGrid {
            what: "grid is empty",
            index: 0,
        });
    }
    for (i, &t) in grid.iter().enumerate() {
        if !t.is_finite() {
            return Err(DfError::InvalidGrid {
                what: "grid point is not finite",
                index: i,
            });
        }
        if i > 0 && t <= grid[i - 1] {
            return Err(DfError::InvalidGrid {
                what: "grid is not strictly increasing",
                index: i,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_both_ends() {
        let g = linspace(0.0, 1.0, 100).unwrap();
        assert_eq!(g.len(), 100);
        assert_eq!(g[0], 0.0);
        assert_eq!(g[99], 1.0);
        assert!(validate_grid(&g).is_ok());
    }

    #[test]
    fn linspace_single_point() {
        assert_eq!(linspace(2.5, 10.0, 1).unwrap(), vec![2.5]);
    }

    #[test]
    fn linspace_rejects_zero_points() {
        assert!(linspace(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn validate_grid_rejects_bad_grids() {
        assert!(matches!(
            validate_grid(&[]),
            Err(DfError::InvalidGrid { index: 0, .. })
        ));
        assert!(matches!(
            validate_grid(&[0.0, 1.0, 1.0]),
            Err(DfError::InvalidGrid { index: 2, .. })
        ));
        assert!(matches!(
            validate_grid(&[0.0, Real::NAN]),
            Err(DfError::InvalidGrid { index: 1, .. })
        ));
        assert!(validate_grid(&[3.0]).is_ok());
    }
}
