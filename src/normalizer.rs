//! Probability normalization for ALICE-PLSA
//!
//! A column (or vector) whose mass is not strictly positive is left as it
//! is. That keeps all-zero topics at zero instead of turning them into NaN.

use crate::matrix::TopicMatrix;

/// Normalize one topic column so it sums to 1.
///
/// Returns the column mass observed before dividing. When that mass is not
/// strictly positive the column is untouched.
pub fn normalize_column(matrix: &mut TopicMatrix, topic: usize) -> f64 {
    let sum = matrix.column_sum(topic);
    if sum > 0.0 {
        for value in matrix.column_mut(topic) {
            *value /= sum;
        }
    }
    sum
}

/// Normalize every topic column of a matrix
pub fn normalize_columns(matrix: &mut TopicMatrix) {
    for topic in 0..matrix.topics() {
        normalize_column(matrix, topic);
    }
}

/// Normalize a vector so it sums to 1, same zero-mass policy as columns
pub fn normalize_vector(values: &mut [f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for value in values.iter_mut() {
            *value /= sum;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_column_sums_to_one() {
        let mut m = TopicMatrix::from_rows(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        let mass = normalize_column(&mut m, 0);
        assert_eq!(mass, 4.0);
        assert_eq!(m.column(0).collect::<Vec<_>>(), vec![0.25, 0.75]);
        // other column untouched
        assert_eq!(m.column(1).collect::<Vec<_>>(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_zero_column_left_untouched() {
        let mut m = TopicMatrix::from_rows(&[vec![0.0, 2.0], vec![0.0, 2.0]]).unwrap();
        let mass = normalize_column(&mut m, 0);
        assert_eq!(mass, 0.0);
        assert!(m.column(0).all(|v| v == 0.0));
        assert!(m.as_slice().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_normalize_columns() {
        let mut m = TopicMatrix::from_rows(&[vec![2.0, 1.0], vec![2.0, 3.0]]).unwrap();
        normalize_columns(&mut m);
        assert!((m.column_sum(0) - 1.0).abs() < 1e-12);
        assert!((m.column_sum(1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_vector() {
        let mut v = vec![1.0, 1.0, 2.0];
        normalize_vector(&mut v);
        assert_eq!(v, vec![0.25, 0.25, 0.5]);

        let mut zeros = vec![0.0; 3];
        assert_eq!(normalize_vector(&mut zeros), 0.0);
        assert_eq!(zeros, vec![0.0; 3]);
    }
}
