//! Summary statistics, regression and permutation testing, and the rules for rendering them as table text.

use ndarray::{stack, Array1, Array2, ArrayView1, Axis};
use ndarray_stats::CorrelationExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Result, StatsTableError};

/// Permuted correlations must exceed the observed one by more than this to count as more extreme.
const PERM_TOLERANCE: f64 = 1e-12;

/// An ordinary least squares fit of y on x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub r: f64,
    /// Two-sided parametric p-value of the slope (Student t, n-2 degrees of freedom).
    pub p: f64,
    /// Standard error of the slope.
    pub stderr: f64,
}

/// Pearson correlation of two equally long series.
pub fn pearson_r(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
    let stacked = stack(Axis(0), &[x.view(), y.view()]).map_err(|_| {
        StatsTableError::InsufficientData(format!("{} x values but {} y values", x.len(), y.len()))
    })?;
    let corr = stacked
        .pearson_correlation()
        .map_err(|_| StatsTableError::InsufficientData(String::from("no observations")))?;
    Ok(corr[[0, 1]])
}

/// Fit y = slope * x + intercept.
///
/// Fails on fewer than 3 observations, on missing (NaN) or infinite values and when either series is constant.
pub fn linregress(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<LinearFit> {
    let n = x.len();
    if n != y.len() {
        return Err(StatsTableError::InsufficientData(format!("{} x values but {} y values", n, y.len())));
    }
    if n < 3 {
        return Err(StatsTableError::InsufficientData(format!("{} observations", n)));
    }
    let missing = x.iter().chain(y.iter()).filter(|v| !v.is_finite()).count();
    if missing > 0 {
        return Err(StatsTableError::InsufficientData(format!("{} missing or infinite values", missing)));
    }

    let x_mean = x.mean().unwrap_or(f64::NAN);
    let y_mean = y.mean().unwrap_or(f64::NAN);
    let ssxm = x.mapv(|v| (v - x_mean).powi(2)).sum() / n as f64;
    let ssym = y.mapv(|v| (v - y_mean).powi(2)).sum() / n as f64;
    if ssxm == 0.0 || ssym == 0.0 {
        return Err(StatsTableError::InsufficientData(String::from("constant series")));
    }
    let ssxym = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - x_mean) * (b - y_mean))
        .sum::<f64>()
        / n as f64;

    let r = pearson_r(x, y)?;
    if r.is_nan() {
        return Err(StatsTableError::InsufficientData(String::from("undefined correlation")));
    }
    let r = r.max(-1.0).min(1.0);
    let slope = ssxym / ssxm;
    let intercept = y_mean - slope * x_mean;

    let df = (n - 2) as f64;
    let one_minus_r_sq = (1.0 - r) * (1.0 + r);
    let (p, stderr) = if one_minus_r_sq <= 0.0 {
        (0.0, 0.0)
    } else {
        let t = r * (df / one_minus_r_sq).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| StatsTableError::InsufficientData(e.to_string()))?;
        (2.0 * dist.sf(t.abs()), (one_minus_r_sq * ssym / ssxm / df).sqrt())
    };

    Ok(LinearFit {
        slope,
        intercept,
        r,
        p,
        stderr,
    })
}

/// Settings of the label shuffling test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationTest {
    pub n_permutations: usize,
    /// Every test starts from this seed, so results do not depend on the order of the calls.
    pub seed: u64,
}

impl Default for PermutationTest {
    fn default() -> Self {
        PermutationTest {
            n_permutations: 1000,
            seed: 2718,
        }
    }
}

/// A regression together with its permutation p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationResult {
    pub fit: LinearFit,
    /// Fraction of label shuffles whose |r| is strictly larger than the observed |r|.
    pub perm_p: f64,
}

impl PermutationTest {
    /// Regress y on x and assess the correlation against a null distribution of shuffled y values.
    pub fn permutation_correlation(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<CorrelationResult> {
        let fit = linregress(x, y)?;

        let x_mean = x.mean().unwrap_or(f64::NAN);
        let y_mean = y.mean().unwrap_or(f64::NAN);
        let xc: Vec<f64> = x.iter().map(|v| v - x_mean).collect();
        let mut yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let denom = (xc.iter().map(|v| v * v).sum::<f64>() * yc.iter().map(|v| v * v).sum::<f64>()).sqrt();
        let r_of = |yc: &[f64]| xc.iter().zip(yc).map(|(a, b)| a * b).sum::<f64>() / denom;
        let r_obs = r_of(&yc).abs();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut n_more_extreme = 0usize;
        for _ in 0..self.n_permutations {
            yc.shuffle(&mut rng);
            if r_of(&yc).abs() - r_obs > PERM_TOLERANCE {
                n_more_extreme += 1;
            }
        }
        let perm_p = if self.n_permutations == 0 {
            1.0
        } else {
            n_more_extreme as f64 / self.n_permutations as f64
        };

        Ok(CorrelationResult { fit, perm_p })
    }
}

/// Mean and SD across the columns of `block` (subjects along axis 0).
///
/// The mean is the mean of the per-column means and the SD is the square root of the mean per-column
/// (population) variance. Both approximate the pooled values when the columns have comparable sample sizes.
/// Missing (NaN) cells are skipped, and so are columns without any value.
pub fn mean_std(block: &Array2<f64>) -> Result<(f64, f64)> {
    let mut col_means = Vec::with_capacity(block.ncols());
    let mut col_vars = Vec::with_capacity(block.ncols());
    for column in block.axis_iter(Axis(1)) {
        let values: Array1<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
        if let Some(mean) = values.mean() {
            col_means.push(mean);
            col_vars.push(values.var(0.0));
        }
    }
    if col_means.is_empty() {
        return Err(StatsTableError::InsufficientData(String::from("no values to average")));
    }
    let n = col_means.len() as f64;
    let mean = col_means.iter().sum::<f64>() / n;
    let sd = (col_vars.iter().sum::<f64>() / n).sqrt();
    Ok((mean, sd))
}

/// "mean (SD)", with 3 decimals for means below 1 and 2 decimals otherwise.
pub fn format_mean_std(mean: f64, sd: f64) -> String {
    if mean < 1.0 {
        format!("{:2.3} ({:2.3})", mean, sd)
    } else {
        format!("{:2.2} ({:2.2})", mean, sd)
    }
}

/// "< 0.001" for tiny p-values, "= 0.042" otherwise.
pub fn format_p(p: f64) -> String {
    if p < 0.001 {
        String::from("< 0.001")
    } else {
        format!("= {:2.3}", p)
    }
}

/// Slope with 2 decimals if the intercept is below 1 and 1 decimal otherwise.
pub fn format_slope(slope: f64, intercept: f64) -> String {
    if intercept < 1.0 {
        format!("{:2.2}", slope)
    } else {
        format!("{:2.1}", slope)
    }
}

/// A correlation ready to be rendered into table text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationSummary {
    /// The slope, already rescaled for display.
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub perm_p: f64,
}

impl CorrelationSummary {
    /// Prepare a result for display, multiplying the slope by 1000 if `mul1000` is set.
    pub fn new(result: &CorrelationResult, mul1000: bool) -> CorrelationSummary {
        let slope = if mul1000 { result.fit.slope * 1000.0 } else { result.fit.slope };
        CorrelationSummary {
            slope,
            intercept: result.fit.intercept,
            r: result.fit.r,
            perm_p: result.perm_p,
        }
    }

    pub fn slope_field(&self) -> String {
        format_slope(self.slope, self.intercept)
    }

    pub fn p_field(&self) -> String {
        format_p(self.perm_p)
    }

    pub fn r_sq_field(&self) -> String {
        format!("{:2.2}", self.r * self.r)
    }

    /// "r_sq = 0.25, p < 0.001, beta = 2.3"
    pub fn render(&self) -> String {
        format!("r_sq = {}, p {}, beta = {}", self.r_sq_field(), self.p_field(), self.slope_field())
    }
}

/// Render a pre-computed slope `m`, correlation `r` and permutation p with `dp` decimals for the slope.
///
/// `dp` outside 1 to 4 renders the slope without decimals.
pub fn format_r_p_m(r: f64, perm_p: f64, m: f64, dp: usize) -> String {
    let beta = match dp {
        1..=4 => format!("{:2.*}", dp, m),
        _ => format!("{:2.0}", m),
    };
    format!("r_sq = {:2.2}, P {}, beta = {}", r * r, format_p(perm_p), beta)
}
