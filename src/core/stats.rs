//! Robust scalar statistics: median, sample moments, Sen's slope and the
//! two-sided Pearson correlation p-value used by the trend estimator.

/// Median of a sample; averages the two middle values for even counts
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Sample mean and standard deviation (n-1 denominator); stddev is 0 for n < 2
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
        / (values.len() - 1) as f64;
    (mean, var.max(0.0).sqrt())
}

/// Sen's slope: median of all pairwise slopes (v_j - v_i) / (t_j - t_i), i < j.
///
/// Robust to single-year outliers, unlike ordinary least squares. Returns
/// None when fewer than two distinct time points exist.
pub fn sens_slope(times: &[f64], values: &[f64]) -> Option<f64> {
    debug_assert_eq!(times.len(), values.len());
    let n = times.len();
    if n < 2 {
        return None;
    }
    let mut slopes = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let dt = times[j] - times[i];
            if dt != 0.0 {
                slopes.push(((values[j] - values[i]) / dt) as f32);
            }
        }
    }
    median(&mut slopes).map(|m| m as f64)
}

/// Pearson correlation coefficient and its two-sided p-value.
///
/// The p-value comes from the Student's t statistic with n-2 degrees of
/// freedom, evaluated through the regularized incomplete beta function.
/// Returns None for n < 3 or a degenerate (zero-variance) series.
pub fn pearson(times: &[f64], values: &[f64]) -> Option<(f64, f64)> {
    debug_assert_eq!(times.len(), values.len());
    let n = times.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let mean_t = times.iter().sum::<f64>() / nf;
    let mean_v = values.iter().sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_t = 0.0;
    let mut var_v = 0.0;
    for i in 0..n {
        let dt = times[i] - mean_t;
        let dv = values[i] - mean_v;
        cov += dt * dv;
        var_t += dt * dt;
        var_v += dv * dv;
    }
    if var_t <= 0.0 || var_v <= 0.0 {
        return None;
    }
    let r = (cov / (var_t * var_v).sqrt()).clamp(-1.0, 1.0);
    let df = nf - 2.0;
    let denom = 1.0 - r * r;
    let p = if denom <= f64::EPSILON {
        0.0
    } else {
        let t2 = r * r * df / denom;
        incomplete_beta(0.5 * df, 0.5, df / (df + t2))
    };
    Some((r, p))
}

/// ln Gamma(x), Lanczos approximation
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COEF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Continued-fraction evaluation for the incomplete beta function
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function I_x(a, b)
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_bt = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let bt = ln_bt.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * beta_cf(a, b, x) / a
    } else {
        1.0 - bt * beta_cf(b, a, 1.0 - x) / b
    }
}
