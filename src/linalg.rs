//!
//! Small dense linear algebra on ndarray for `D x D` covariances
//!
//! Feature dimensions are small (a handful of volumes or radiomic scores),
//! so plain O(D^3) routines are enough.
//!
use ndarray::{Array1, Array2, ArrayView1};

///
/// Cholesky factorization `A = L L^T` of a symmetric matrix.
///
/// Returns `None` if `A` is not (numerically) positive-definite.
///
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(s > 0.0) || !s.is_finite() {
                    return None;
                }
                l[[i, i]] = s.sqrt();
            } else {
                l[[i, j]] = s / l[[j, j]];
            }
        }
    }
    Some(l)
}

///
/// `log |A|` from the Cholesky factor `L` of `A`
///
pub fn log_det_from_cholesky(l: &Array2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|x| x.ln()).sum::<f64>()
}

///
/// Solve `L y = b` for lower-triangular `L` by forward substitution.
///
pub fn solve_lower(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= l[[i, k]] * y[k];
        }
        y[i] = s / l[[i, i]];
    }
    y
}

///
/// Eigen decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvectors in columns,
/// so that `A = V diag(w) V^T`.
///
pub fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| m[[i, j]] * m[[i, j]])
            .sum::<f64>()
            .sqrt();
        if off <= 1e-15 * scale || off == 0.0 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                // rotate rows/columns p and q
                for k in 0..n {
                    let mkp = m[[k, p]];
                    let mkq = m[[k, q]];
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[[p, k]];
                    let mqk = m[[q, k]];
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    (m.diag().to_owned(), v)
}

///
/// Replace every eigenvalue below `floor` by `floor`.
///
/// This is the closest covariance to `a` (in the Gaussian likelihood sense)
/// whose eigenvalues are all at least `floor`.
///
pub fn floor_eigenvalues(a: &Array2<f64>, floor: f64) -> Array2<f64> {
    let n = a.nrows();
    let sym = (a + &a.t()) / 2.0;
    let (w, v) = symmetric_eigen(&sym);
    if w.iter().all(|&x| x >= floor) {
        return sym;
    }
    let mut out = Array2::<f64>::zeros((n, n));
    for k in 0..n {
        let lambda = w[k].max(floor);
        for i in 0..n {
            for j in 0..n {
                out[[i, j]] += lambda * v[[i, k]] * v[[j, k]];
            }
        }
    }
    // remove rounding asymmetry
    (&out + &out.t()) / 2.0
}
