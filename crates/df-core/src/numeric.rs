use crate::{DfError, DfResult};

/// Floating point type used throughout system
pub type Real = f64;

/// `v` itself, or `NonFinite` naming `what`.
pub fn ensure_finite(v: Real, what: &'static str) -> DfResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(DfError::NonFinite { what, value: v })
    }
}

/// Check every entry of a slice, reporting the first non-finite one.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> DfResult<()> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(DfError::NonFinite { what, value }),
        None => Ok(()),
    }
}

/// Weighted RMS norm used by adaptive step control.
///
/// Each component is scaled by `atol + rtol * max(|a_i|, |b_i|)`.
pub fn weighted_rms(err: &[Real], a: &[Real], b: &[Real], atol: Real, rtol: Real) -> Real {
    if err.is_empty() {
        return 0.0;
    }
    let sum: Real = err
        .iter()
        .zip(a.iter().zip(b.iter()))
        .map(|(e, (ai, bi))| {
            let scale = atol + rtol * ai.abs().max(bi.abs());
            (e / scale).powi(2)
        })
        .sum();
    (sum / err.len() as Real).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_all_finite_reports_infinity() {
        assert!(ensure_all_finite(&[1.0, 2.0], "state").is_ok());
        assert_eq!(
            ensure_all_finite(&[1.0, Real::INFINITY, Real::NAN], "state"),
            Err(DfError::NonFinite {
                what: "state",
                value: Real::INFINITY
            })
        );
    }

    #[test]
    fn weighted_rms_scales_by_tolerance() {
        // err = scale everywhere -> norm 1
        let a = [1.0, 2.0];
        let b = [1.0, 2.0];
        let atol = 1e-6;
        let rtol = 1e-3;
        let err = [atol + rtol * 1.0, atol + rtol * 2.0];
        let norm = weighted_rms(&err, &a, &b, atol, rtol);
        assert!((norm - 1.0).abs() < 1e-12);
        assert_eq!(weighted_rms(&[], &[], &[], atol, rtol), 0.0);
    }
}
