use crate::{die::WeightedDie, Face, Result};
use claim::{debug_assert_ge, debug_assert_le};
use ndarray::{Array1, ArrayView1, Zip};
use statrs::distribution::{ChiSquared, ContinuousCDF};

const EPS: f64 = 1e-10;

/// Whether every face with mass in `p` also has mass in `q`.
pub(crate) fn is_pmf_subset(p: ArrayView1<f64>, q: ArrayView1<f64>) -> bool {
    // q_i == 0 implies p_i == 0
    Zip::from(p).and(q).all(|&p_i, &q_i| q_i > 0.0 || p_i <= 0.0)
}

/// `D_KL(p || q)` for dense PMFs. `p` must be supported inside `q`.
pub(crate) fn kl_divergence(p: ArrayView1<f64>, q: ArrayView1<f64>) -> f64 {
    debug_assert!(is_pmf_subset(p, q));

    Zip::from(p)
        .and(q)
        .fold(0.0, |sum, &p_i, &q_i| sum + kl_div_term(p_i, q_i))
}

#[inline]
fn kl_div_term(p_i: f64, q_i: f64) -> f64 {
    match (p_i > EPS, q_i > EPS) {
        (true, true) => p_i * (p_i / q_i).ln(),
        (true, false) => f64::INFINITY,
        (false, _) => 0.0,
    }
}

/// G statistic for `n` observed rolls with empirical PMF `p_hat` against the
/// expected PMF `p`. Approaches the chi² statistic for large `n`.
fn g_test(n: usize, p: ArrayView1<f64>, p_hat: ArrayView1<f64>) -> f64 {
    2.0 * (n as f64) * kl_divergence(p_hat, p)
}

fn chisq_cdf(dof: f64, x: f64) -> f64 {
    // only fails on dof <= 0, which callers rule out
    ChiSquared::new(dof).map_or(1.0, |distr| distr.cdf(x))
}

/// G-test p-value that `n` rolls with empirical PMF `p_hat` came from the
/// expected PMF `p`, i.e. `Pr[G >= g | rolls ~ p]`.
pub fn multinomial_test(n: usize, p: ArrayView1<f64>, p_hat: ArrayView1<f64>) -> f64 {
    assert_eq!(p.len(), p_hat.len());

    // p_hat puts mass on a face p never rolls
    if !is_pmf_subset(p_hat, p) {
        return 0.0;
    }

    // one degree of freedom per possible face, minus the sum constraint
    let nnz = p.iter().filter(|&&x| x > 0.0).count();
    let dof = nnz as f64 - 1.0;

    debug_assert_le!(nnz, p.dim());
    debug_assert_ge!(dof, 0.0);

    // a single possible outcome (or no samples) can't disagree with p
    if n == 0 || dof < 1.0 {
        return 1.0;
    }

    let g = g_test(n, p, p_hat);
    let pvalue = 1.0 - chisq_cdf(dof, g);

    log::debug!(
        "multinomial_test: n: {n}, |p|: {}, dof: {dof}, g: {g}, p-value: {pvalue}",
        p.dim()
    );

    pvalue
}

/// How plausible it is that `outcomes` were rolled from `die` with its current
/// weights, as a multinomial test p-value. Small values (say `< 0.01`) suggest
/// the outcomes came from some other weighting.
///
/// Outcomes that aren't faces of `die` are impossible under the die's weights
/// and give a p-value of `0.0`.
pub fn fit_pvalue<F: Face>(die: &WeightedDie<F>, outcomes: &[F]) -> Result<f64> {
    let probs = die.probabilities()?;
    let p = probs.iter().map(|(_, p)| *p).collect::<Array1<f64>>();

    let mut counts = Array1::<f64>::zeros(die.len());
    for outcome in outcomes {
        match die.faces().iter().position(|face| face == outcome) {
            Some(idx) => counts[idx] += 1.0,
            None => return Ok(0.0),
        }
    }

    let n = outcomes.len();
    let p_hat = if n > 0 { counts / (n as f64) } else { counts };

    Ok(multinomial_test(n, p.view(), p_hat.view()))
}

///////////
// Tests //
///////////
