//! Median imputation over a single upload's rows

/// Median of the finite values; mean of the two middle values for an even
/// count.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

/// Replace missing and non-finite values with the column median (0 when the
/// column has no value at all). Returns the fill value.
pub fn impute_median(values: &[Option<f64>]) -> (Vec<f64>, f64) {
    let fill = median(values).unwrap_or(0.0);
    let filled = values
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => *x,
            _ => fill,
        })
        .collect();
    (filled, fill)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_impute_fills_gaps() {
        let (filled, fill) = impute_median(&[Some(1.0), None, Some(f64::NAN), Some(5.0)]);
        assert_eq!(fill, 3.0);
        assert_eq!(filled, vec![1.0, 3.0, 3.0, 5.0]);
    }

    #[test]
    fn test_impute_all_missing() {
        let (filled, fill) = impute_median(&[None, None]);
        assert_eq!(fill, 0.0);
        assert_eq!(filled, vec![0.0, 0.0]);
    }
}
