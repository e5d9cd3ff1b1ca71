use foldkit_core::{FoldkitError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One hyperparameter combination, e.g. `{penalty: 0.1, mixture: 0.5}`.
pub type Configuration = BTreeMap<String, f64>;

/// `penalty=0.1, mixture=0.5` style rendering for logs and tables.
pub fn describe(config: &Configuration) -> String {
    if config.is_empty() {
        return "(none)".to_string();
    }
    config
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Draw `size` distinct configurations from the full grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomGrid {
    pub size: usize,
    pub seed: u64,
}

/// Candidate values per hyperparameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HyperGrid {
    #[serde(default)]
    pub params: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub random: Option<RandomGrid>,
}

impl HyperGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    pub fn random(mut self, size: usize, seed: u64) -> Self {
        self.random = Some(RandomGrid { size, seed });
        self
    }

    /// Size of the full cross product; a configuration error when it does
    /// not fit in a `usize`.
    pub fn full_size(&self) -> Result<usize> {
        self.params
            .values()
            .try_fold(1usize, |total, values| total.checked_mul(values.len()))
            .ok_or_else(|| FoldkitError::config("grid cross product is too large to enumerate"))
    }

    /// Configurations to evaluate, in cross-product order (parameters by
    /// name, the last one varying fastest). A grid without parameters yields
    /// one empty configuration. With `random` set, a seeded subsample of the
    /// cross product is kept, still in cross-product order.
    pub fn configurations(&self) -> Result<Vec<Configuration>> {
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(FoldkitError::config(format!("grid parameter '{}' has no values", name)));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(FoldkitError::config(format!(
                    "grid parameter '{}' has a non-finite value",
                    name
                )));
            }
        }
        let total = self.full_size()?;
        let chosen: Vec<usize> = match self.random {
            Some(RandomGrid { size: 0, .. }) => {
                return Err(FoldkitError::config("a random grid needs a size of at least 1"))
            }
            Some(RandomGrid { size, seed }) if size < total => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut picked = rand::seq::index::sample(&mut rng, total, size).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..total).collect(),
        };
        Ok(chosen.into_iter().map(|i| self.nth(i)).collect())
    }

    /// The `index`-th configuration of the cross product.
    fn nth(&self, mut index: usize) -> Configuration {
        let mut config = Configuration::new();
        for (name, values) in self.params.iter().rev() {
            config.insert(name.clone(), values[index % values.len()]);
            index /= values.len();
        }
        config
    }
}
