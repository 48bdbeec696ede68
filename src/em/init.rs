//!
//! Starting parameters of a Baum-Welch run
//!
//! * `Random`: means at `K` randomly picked timepoints, pooled covariance
//! * `KMeans`: k-means++ seeding then Lloyd iterations over all timepoints,
//!   per-cluster covariance (pooled for clusters too small to estimate one)
//!
//! In both cases states are ordered by the first feature of their mean, the
//! transition matrix starts sticky and the initial distribution uniform.
//!
use crate::config::{EmissionKind, HmmConfig, InitMethod};
use crate::error::{HmmError, Result};
use crate::hmm::{Emissions, InitialDistribution, ModelParameters, TransitionMatrix};
use crate::linalg::floor_eigenvalues;
use crate::observation::ObservationSequence;
use log::debug;
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;

/// Self-loop probability of the starting transition matrix
pub const INIT_P_STAY: f64 = 0.8;

/// Maximum number of Lloyd iterations
const MAX_LLOYD_ITER: usize = 100;

///
/// Starting parameters for `config` from the sequences.
///
pub fn initialize<R: Rng>(
    config: &HmmConfig,
    seqs: &[ObservationSequence],
    rng: &mut R,
) -> Result<ModelParameters> {
    let data = pool(seqs)?;
    let k = config.n_states;
    let (mut centers, labels) = match config.init_method {
        InitMethod::Random => (random_centers(data.view(), k, rng), None),
        InitMethod::KMeans => {
            let (centers, labels) = kmeans(data.view(), k, rng);
            (centers, Some(labels))
        }
    };

    let pooled = covariance(data.view(), None, &data.mean_axis(Axis(0)).unwrap_or_default());
    let mut covs: Vec<Array2<f64>> = (0..k)
        .map(|c| match &labels {
            Some(labels) => {
                let size = labels.iter().filter(|&&l| l == c).count();
                if size > data.ncols() {
                    let center = centers.row(c).to_owned();
                    covariance(data.view(), Some((labels.as_slice(), c)), &center)
                } else {
                    pooled.clone()
                }
            }
            None => pooled.clone(),
        })
        .map(|cov| floor_eigenvalues(&cov, config.min_covar))
        .collect();

    // order states by the first feature
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| centers[[a, 0]].total_cmp(&centers[[b, 0]]));
    centers = centers.select(Axis(0), &order);
    covs = order.iter().map(|&i| covs[i].clone()).collect();
    debug!("init {:?} centers={}", config.init_method, centers);

    let emissions = match config.emission_kind {
        EmissionKind::Diagonal => {
            let vars = Array2::from_shape_fn(centers.dim(), |(s, d)| covs[s][[d, d]]);
            Emissions::diagonal(&centers, &vars, config.min_covar)?
        }
        EmissionKind::Full => Emissions::full(&centers, &covs, config.min_covar)?,
    };
    ModelParameters::new(
        InitialDistribution::uniform(k),
        TransitionMatrix::sticky(k, INIT_P_STAY)?,
        emissions,
    )
}

///
/// All timepoints of all sequences as a `N x D` matrix
///
fn pool(seqs: &[ObservationSequence]) -> Result<Array2<f64>> {
    let views: Vec<ArrayView2<f64>> = seqs.iter().map(|s| s.values()).collect();
    if views.is_empty() {
        return Err(HmmError::NoSequences);
    }
    for seq in seqs {
        if seq.is_empty() {
            return Err(HmmError::EmptySequence {
                patient: seq.id().to_string(),
            });
        }
        if seq.n_features() == 0 {
            return Err(HmmError::InvalidConfig(
                "observations need at least one feature".to_string(),
            ));
        }
    }
    concatenate(Axis(0), &views).map_err(|e| HmmError::InvalidParameters(e.to_string()))
}

fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

///
/// index of the nearest center (lowest index on ties)
///
fn nearest(x: ArrayView1<f64>, centers: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, center) in centers.rows().into_iter().enumerate() {
        let d = sq_dist(x, center);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

///
/// `k` distinct timepoints (with repetition when there are fewer than `k`)
///
fn random_centers<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = data.nrows();
    let indices: Vec<usize> = if n >= k {
        rand::seq::index::sample(rng, n, k).into_vec()
    } else {
        (0..k).map(|_| rng.gen_range(0..n)).collect()
    };
    data.select(Axis(0), &indices)
}

///
/// k-means++ seeding
///
fn kmeans_pp<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = data.nrows();
    let mut picked = vec![rng.gen_range(0..n)];
    while picked.len() < k {
        let centers = data.select(Axis(0), &picked);
        let weights: Vec<f64> = data.rows().into_iter().map(|x| nearest(x, &centers).1).collect();
        let next = (0..n)
            .collect::<Vec<usize>>()
            .choose_weighted(rng, |&i| weights[i])
            .copied()
            // every point is already a center
            .unwrap_or_else(|_| rng.gen_range(0..n));
        picked.push(next);
    }
    data.select(Axis(0), &picked)
}

///
/// Lloyd iterations from k-means++ centers.
/// Returns centers and the cluster of every timepoint.
///
fn kmeans<R: Rng>(data: ArrayView2<f64>, k: usize, rng: &mut R) -> (Array2<f64>, Vec<usize>) {
    let mut centers = kmeans_pp(data, k, rng);
    let mut labels: Vec<usize> = data.rows().into_iter().map(|x| nearest(x, &centers).0).collect();

    for iteration in 0..MAX_LLOYD_ITER {
        for c in 0..k {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
            // an empty cluster keeps its center
            if let Some(mean) = data.select(Axis(0), &members).mean_axis(Axis(0)) {
                centers.row_mut(c).assign(&mean);
            }
        }
        let next: Vec<usize> = data.rows().into_iter().map(|x| nearest(x, &centers).0).collect();
        if next == labels {
            debug!("k-means converged after {} iterations", iteration + 1);
            break;
        }
        labels = next;
    }
    (centers, labels)
}

///
/// Covariance (divided by the count) of all rows, or of the rows of one
/// cluster, around `mean`.
///
fn covariance(
    data: ArrayView2<f64>,
    cluster: Option<(&[usize], usize)>,
    mean: &Array1<f64>,
) -> Array2<f64> {
    let d = data.ncols();
    let mut cov = Array2::<f64>::zeros((d, d));
    let mut count = 0usize;
    for (i, x) in data.rows().into_iter().enumerate() {
        if let Some((labels, c)) = cluster {
            if labels[i] != c {
                continue;
            }
        }
        let diff = &x - mean;
        for a in 0..d {
            for b in 0..d {
                cov[[a, b]] += diff[a] * diff[b];
            }
        }
        count += 1;
    }
    if count > 0 {
        cov /= count as f64;
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::mocks::mock_three_state_1d;
    use crate::observation::mocks::mock_gbm_store;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn synthetic() -> Vec<ObservationSequence> {
        let params = mock_three_state_1d();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        params
            .sample_sequences(10, 30, &mut rng)
            .unwrap()
            .into_iter()
            .map(|(_, seq)| seq)
            .collect()
    }

    #[test]
    fn kmeans_finds_separated_means() {
        let seqs = synthetic();
        let config = HmmConfig::new(3, EmissionKind::Diagonal);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let params = initialize(&config, &seqs, &mut rng).unwrap();
        // sorted by first feature
        for (k, expected) in [0.0, 5.0, 10.0].iter().enumerate() {
            assert_abs_diff_eq!(params.emissions.mean(k)[0], *expected, epsilon = 0.3);
        }
        assert_abs_diff_eq!(params.transition.as_array()[[0, 0]], INIT_P_STAY, epsilon = 1e-12);
    }
    #[test]
    fn random_init_is_sorted_and_valid() {
        let seqs = synthetic();
        let config = HmmConfig::new(3, EmissionKind::Full).with_init_method(InitMethod::Random);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let params = initialize(&config, &seqs, &mut rng).unwrap();
        assert!(params.validate().is_ok());
        let m: Vec<f64> = (0..3).map(|k| params.emissions.mean(k)[0]).collect();
        assert!(m[0] <= m[1] && m[1] <= m[2]);
    }
    #[test]
    fn init_is_reproducible() {
        let store = mock_gbm_store();
        let config = HmmConfig::default();
        let a = initialize(&config, store.sequences(), &mut Xoshiro256PlusPlus::seed_from_u64(42))
            .unwrap();
        let b = initialize(&config, store.sequences(), &mut Xoshiro256PlusPlus::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }
    #[test]
    fn more_states_than_timepoints() {
        let seqs = vec![ObservationSequence::from_scalars("a", &[1.0, 1.0])];
        for method in [InitMethod::Random, InitMethod::KMeans] {
            let config = HmmConfig::new(3, EmissionKind::Full).with_init_method(method);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
            let params = initialize(&config, &seqs, &mut rng).unwrap();
            // zero spread: covariance floored, density still finite
            assert!(params.log_likelihood(&seqs[0]).unwrap().is_finite());
        }
    }
}
