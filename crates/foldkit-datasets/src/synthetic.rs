use foldkit_core::{Column, DataFrame, FoldkitError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Regression data with known structure:
/// `y = intercept + Σ coefficients[j]·x{j+1} + N(0, noise_sd²)`,
/// predictors standard normal. Columns `x1..xp` then `y`.
pub fn make_linear(
    n_samples: usize,
    intercept: f64,
    coefficients: &[f64],
    noise_sd: f64,
    seed: u64,
) -> Result<DataFrame> {
    if !(noise_sd >= 0.0 && noise_sd.is_finite()) {
        return Err(FoldkitError::config(format!(
            "noise standard deviation must be finite and non-negative, got {}",
            noise_sd
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let p = coefficients.len();
    let mut x = vec![Vec::with_capacity(n_samples); p];
    let mut y = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let mut yi = intercept;
        for (j, col) in x.iter_mut().enumerate() {
            let v = standard_normal(&mut rng);
            col.push(v);
            yi += coefficients[j] * v;
        }
        y.push(yi + noise_sd * standard_normal(&mut rng));
    }

    let mut columns: Vec<Column> = x
        .into_iter()
        .enumerate()
        .map(|(j, v)| Column::numeric(format!("x{}", j + 1), v))
        .collect();
    columns.push(Column::numeric("y", y));
    DataFrame::new(columns)
}

const DEPARTMENTS: [&str; 3] = ["research", "sales", "human_resources"];

/// Employee attrition data: binary, imbalanced outcome `attrition`
/// (`"Yes"` for roughly one row in six) with mixed predictors.
///
/// Columns: `attrition`, `age`, `monthly_income`, `years_at_company`,
/// `job_satisfaction` (1 to 4), `distance_from_home` (1 to 29), `overtime`
/// (`Yes`/`No`) and `department`. Leaving is more likely with overtime, low
/// satisfaction, low income and short tenure.
pub fn make_attrition(n_samples: usize, seed: u64) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut attrition = Vec::with_capacity(n_samples);
    let mut age = Vec::with_capacity(n_samples);
    let mut income = Vec::with_capacity(n_samples);
    let mut tenure = Vec::with_capacity(n_samples);
    let mut satisfaction = Vec::with_capacity(n_samples);
    let mut distance = Vec::with_capacity(n_samples);
    let mut overtime = Vec::with_capacity(n_samples);
    let mut department = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let a = (37.0 + 9.0 * standard_normal(&mut rng)).clamp(18.0, 60.0).round();
        let dept = match rng.gen_range(0..100) {
            0..=64 => 0,
            65..=94 => 1,
            _ => 2,
        };
        let inc = (2000.0 + 150.0 * (a - 18.0) + 1500.0 * standard_normal(&mut rng).abs()).round();
        let years = rng.gen_range(0.0..(a - 17.0).min(30.0)).floor();
        let sat = f64::from(rng.gen_range(1u8..=4));
        let dist = f64::from(rng.gen_range(1u8..=29));
        let ot = rng.gen_bool(0.28);

        let logit = -2.3 + 1.6 * f64::from(u8::from(ot)) - 0.45 * (sat - 2.5) - 0.00025 * (inc - 6000.0)
            - 0.08 * (years - 7.0)
            + 0.03 * (dist - 9.0)
            + if dept == 1 { 0.4 } else { 0.0 };
        let leaves = rng.gen::<f64>() < 1.0 / (1.0 + (-logit).exp());

        attrition.push(Some(if leaves { "Yes" } else { "No" }.to_string()));
        age.push(a);
        income.push(inc);
        tenure.push(years);
        satisfaction.push(sat);
        distance.push(dist);
        overtime.push(Some(if ot { "Yes" } else { "No" }.to_string()));
        department.push(Some(DEPARTMENTS[dept].to_string()));
    }

    DataFrame::new(vec![
        Column::categorical("attrition", attrition),
        Column::numeric("age", age),
        Column::numeric("monthly_income", income),
        Column::numeric("years_at_company", tenure),
        Column::numeric("job_satisfaction", satisfaction),
        Column::numeric("distance_from_home", distance),
        Column::categorical("overtime", overtime),
        Column::categorical("department", department),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_make_linear_structure() {
        let df = make_linear(2000, 1.0, &[2.0, -3.0], 0.5, 42).unwrap();
        assert_eq!(df.column_names(), vec!["x1", "x2", "y"]);
        assert_eq!(df.n_rows(), 2000);

        let x1 = df.column("x1").unwrap().as_numeric().unwrap();
        let x2 = df.column("x2").unwrap().as_numeric().unwrap();
        let y = df.column("y").unwrap().as_numeric().unwrap();
        let resid: Vec<f64> = (0..2000).map(|i| y[i] - 1.0 - 2.0 * x1[i] + 3.0 * x2[i]).collect();
        let mean = resid.iter().sum::<f64>() / 2000.0;
        let sd = (resid.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 1999.0).sqrt();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.05);
        assert_abs_diff_eq!(sd, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_make_linear_reproducible() {
        assert_eq!(
            make_linear(50, 0.0, &[1.0], 1.0, 7).unwrap(),
            make_linear(50, 0.0, &[1.0], 1.0, 7).unwrap()
        );
        assert_ne!(
            make_linear(50, 0.0, &[1.0], 1.0, 7).unwrap(),
            make_linear(50, 0.0, &[1.0], 1.0, 8).unwrap()
        );
        assert!(make_linear(10, 0.0, &[1.0], -1.0, 7).is_err());
    }

    #[test]
    fn test_make_attrition_is_imbalanced() {
        let df = make_attrition(1000, 3).unwrap();
        assert_eq!(df.n_cols(), 8);
        let levels = df.column("attrition").unwrap().levels();
        assert_eq!(levels, vec!["No", "Yes"]);

        let yes = df
            .column("attrition")
            .unwrap()
            .as_categorical()
            .unwrap()
            .iter()
            .filter(|v| v.as_deref() == Some("Yes"))
            .count() as f64
            / 1000.0;
        assert!(yes > 0.08 && yes < 0.3, "attrition rate {}", yes);

        let sat = df.column("job_satisfaction").unwrap().as_numeric().unwrap();
        assert!(sat.iter().all(|&s| (1.0..=4.0).contains(&s)));
    }
}
