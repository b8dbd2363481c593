//! A module for metrics to evaluate reduced-order models performances
//! on full fields or on reduced coefficients.
use ndarray::{ArrayBase, Data, Ix2, Zip};

fn sq_norm_diff<S1: Data<Elem = f64>, S2: Data<Elem = f64>>(
    a: &ArrayBase<S1, impl ndarray::Dimension>,
    b: &ArrayBase<S2, impl ndarray::Dimension>,
) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Relative error in Frobenius norm `||u - u_pred|| / ||u||`
pub fn re(u: &ArrayBase<impl Data<Elem = f64>, Ix2>, u_pred: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> f64 {
    let norm = u.iter().map(|v| v * v).sum::<f64>().sqrt();
    sq_norm_diff(u, u_pred).sqrt() / norm
}

/// Mean over snapshots (columns) of the relative errors,
/// snapshots with a zero norm are skipped.
pub fn re_s(u: &ArrayBase<impl Data<Elem = f64>, Ix2>, u_pred: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> f64 {
    let mut total = 0.;
    let mut count = 0;
    Zip::from(u.columns()).and(u_pred.columns()).for_each(|col, col_pred| {
        let norm = col.dot(&col);
        if norm > 0. {
            total += (sq_norm_diff(&col, &col_pred) / norm).sqrt();
            count += 1;
        }
    });
    if count == 0 {
        0.
    } else {
        total / count as f64
    }
}

/// Mean squared error
pub fn mse(a: &ArrayBase<impl Data<Elem = f64>, Ix2>, b: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> f64 {
    sq_norm_diff(a, b) / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_metrics() {
        let u = array![[3., 0.], [4., 0.]];
        let u_pred = array![[3., 1.], [3., 0.]];
        assert_abs_diff_eq!(re(&u, &u_pred), (2f64).sqrt() / 5., epsilon = 1e-15);
        // second column has a zero norm
        assert_abs_diff_eq!(re_s(&u, &u_pred), 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(mse(&u, &u_pred), 0.5, epsilon = 1e-15);
        assert_eq!(re_s(&u, &u), 0.);
    }
}
