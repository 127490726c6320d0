use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated quantile (`q` in 0..=1) of unsorted values.
/// Returns `None` for empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Most frequent value; ties go to the smallest value.
pub fn mode<'a, T, I>(values: I) -> Option<T>
where
    T: Ord + Hash + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    mode_by(values, T::cmp)
}

/// Most frequent value; ties go to the value `cmp` orders first.
pub fn mode_by<'a, T, I, F>(values: I, cmp: F) -> Option<T>
where
    T: Hash + Eq + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T, &T) -> Ordering,
{
    let mut counts: HashMap<&T, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| cmp(*b, *a)))
        .map(|(v, _)| v.clone())
}

/// Orders labels that usually hold numbers: numeric when both parse,
/// otherwise lexicographic, with numbers first.
pub fn numeric_aware_cmp(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_quantile_bounds() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(5.0));
        assert_eq!(quantile(&v, 0.25), Some(2.0));
    }

    #[test]
    fn test_mode_tie_goes_to_smallest() {
        let v = vec!["b".to_string(), "a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(mode(&v), Some("a".to_string()));

        let w = vec![3, 1, 3];
        assert_eq!(mode(&w), Some(3));

        let empty: Vec<i32> = Vec::new();
        assert_eq!(mode(&empty), None);
    }

    #[test]
    fn test_mode_by_numeric_tie_goes_to_smaller_number() {
        let floors = vec!["10".to_string(), "2".to_string()];
        assert_eq!(mode(&floors), Some("10".to_string()));
        assert_eq!(
            mode_by(&floors, |a: &String, b: &String| numeric_aware_cmp(a, b)),
            Some("2".to_string())
        );

        let w2e = vec!["3".to_string(), "12".to_string(), "12".to_string()];
        assert_eq!(mode_by(&w2e, |a: &String, b: &String| numeric_aware_cmp(a, b)), Some("12".to_string()));
    }

    #[test]
    fn test_numeric_aware_cmp() {
        assert_eq!(numeric_aware_cmp("2", "10"), Ordering::Less);
        assert_eq!(numeric_aware_cmp("B1", "1"), Ordering::Greater);
        assert_eq!(numeric_aware_cmp("east", "west"), Ordering::Less);
    }
}
