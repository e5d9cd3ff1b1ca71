use foldkit_core::{FoldkitError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn one() -> usize {
    1
}

/// Resampling strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Resampling {
    KFold {
        k: usize,
        #[serde(default = "one")]
        repeats: usize,
    },
    Bootstrap {
        iterations: usize,
    },
}

/// One (fit, validation) pair. Indices address rows of the resampled set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub id: String,
    pub repeat: usize,
    pub fit_indices: Vec<usize>,
    pub validation_indices: Vec<usize>,
}

/// Ordered sequence of folds over `n` rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPlan {
    n: usize,
    folds: Vec<Fold>,
}

impl FoldPlan {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fold> {
        self.folds.iter()
    }
}

/// Build a resampling plan over `n` rows.
pub fn make_folds(n: usize, strategy: &Resampling, seed: u64) -> Result<FoldPlan> {
    let mut rng = StdRng::seed_from_u64(seed);
    let folds = match *strategy {
        Resampling::KFold { k, repeats } => {
            check_k(n, k, repeats)?;
            let mut folds = Vec::with_capacity(k * repeats);
            for r in 0..repeats {
                let mut perm: Vec<usize> = (0..n).collect();
                perm.shuffle(&mut rng);
                let groups = contiguous_groups(&perm, k);
                folds.extend(folds_from_groups(groups, n, r, repeats));
            }
            folds
        }
        Resampling::Bootstrap { iterations } => {
            if iterations < 1 {
                return Err(FoldkitError::config("bootstrap iterations must be at least 1"));
            }
            if n < 1 {
                return Err(FoldkitError::config("cannot bootstrap an empty set"));
            }
            (0..iterations)
                .map(|b| {
                    let fit: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                    let mut drawn = vec![false; n];
                    fit.iter().for_each(|&i| drawn[i] = true);
                    let validation = (0..n).filter(|&i| !drawn[i]).collect();
                    Fold {
                        id: format!("Bootstrap{:02}", b + 1),
                        repeat: 0,
                        fit_indices: fit,
                        validation_indices: validation,
                    }
                })
                .collect()
        }
    };
    Ok(FoldPlan { n, folds })
}

/// k-fold plan in which every fold carries its share of each stratum.
///
/// Rows of a stratum are shuffled and dealt round-robin, starting where the
/// previous stratum left off so fold sizes stay within one of each other.
pub fn make_stratified_folds(strata: &[String], k: usize, repeats: usize, seed: u64) -> Result<FoldPlan> {
    let n = strata.len();
    check_k(n, k, repeats)?;
    let mut by_stratum: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, s) in strata.iter().enumerate() {
        by_stratum.entry(s.as_str()).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = Vec::with_capacity(k * repeats);
    for r in 0..repeats {
        let mut groups = vec![Vec::new(); k];
        let mut next = 0;
        for members in by_stratum.values() {
            let mut members = members.clone();
            members.shuffle(&mut rng);
            for i in members {
                groups[next % k].push(i);
                next += 1;
            }
        }
        folds.extend(folds_from_groups(groups, n, r, repeats));
    }
    Ok(FoldPlan { n, folds })
}

fn check_k(n: usize, k: usize, repeats: usize) -> Result<()> {
    if k < 2 {
        return Err(FoldkitError::config(format!("k must be at least 2, got {}", k)));
    }
    if k > n {
        return Err(FoldkitError::config(format!(
            "k ({}) cannot exceed the number of rows ({})",
            k, n
        )));
    }
    if repeats < 1 {
        return Err(FoldkitError::config("repeats must be at least 1"));
    }
    Ok(())
}

/// Split a permutation into `k` contiguous groups; the first `n % k` get one extra.
fn contiguous_groups(perm: &[usize], k: usize) -> Vec<Vec<usize>> {
    let n = perm.len();
    let base = n / k;
    let remainder = n % k;
    let mut groups = Vec::with_capacity(k);
    let mut start = 0;
    for g in 0..k {
        let size = if g < remainder { base + 1 } else { base };
        groups.push(perm[start..start + size].to_vec());
        start += size;
    }
    groups
}

fn folds_from_groups(groups: Vec<Vec<usize>>, n: usize, repeat: usize, repeats: usize) -> Vec<Fold> {
    let mut owner = vec![0usize; n];
    for (g, members) in groups.iter().enumerate() {
        members.iter().for_each(|&i| owner[i] = g);
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(g, mut validation)| {
            validation.sort_unstable();
            let fit = (0..n).filter(|&i| owner[i] != g).collect();
            let id = if repeats > 1 {
                format!("Repeat{}/Fold{:02}", repeat + 1, g + 1)
            } else {
                format!("Fold{:02}", g + 1)
            };
            Fold {
                id,
                repeat,
                fit_indices: fit,
                validation_indices: validation,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_kfold_sizes() {
        let plan = make_folds(10, &Resampling::KFold { k: 3, repeats: 1 }, 42).unwrap();
        let sizes: Vec<usize> = plan.iter().map(|f| f.validation_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(plan.folds()[0].id, "Fold01");
        for f in plan.iter() {
            assert_eq!(f.fit_indices.len() + f.validation_indices.len(), 10);
        }
    }

    #[test]
    fn test_kfold_rejects_bad_k() {
        assert!(make_folds(10, &Resampling::KFold { k: 1, repeats: 1 }, 0).is_err());
        assert!(make_folds(10, &Resampling::KFold { k: 11, repeats: 1 }, 0).is_err());
        assert!(make_folds(10, &Resampling::KFold { k: 10, repeats: 1 }, 0).is_ok());
    }

    #[test]
    fn test_repeated_kfold_ids_and_independence() {
        let plan = make_folds(20, &Resampling::KFold { k: 5, repeats: 3 }, 7).unwrap();
        assert_eq!(plan.len(), 15);
        assert_eq!(plan.folds()[5].id, "Repeat2/Fold01");
        assert_ne!(plan.folds()[0].validation_indices, plan.folds()[5].validation_indices);
    }

    #[test]
    fn test_bootstrap_shape() {
        let plan = make_folds(50, &Resampling::Bootstrap { iterations: 25 }, 3).unwrap();
        assert_eq!(plan.len(), 25);
        for f in plan.iter() {
            assert_eq!(f.fit_indices.len(), 50);
            for v in &f.validation_indices {
                assert!(!f.fit_indices.contains(v));
            }
        }
        // with 50 draws out of 50, some index is drawn twice almost surely
        assert!(plan.iter().any(|f| {
            let mut s = f.fit_indices.clone();
            s.sort_unstable();
            s.dedup();
            s.len() < 50
        }));
    }

    #[test]
    fn test_bootstrap_out_of_bag_fraction_near_one_over_e() {
        let n = 2000;
        let plan = make_folds(n, &Resampling::Bootstrap { iterations: 50 }, 11).unwrap();
        let oob: usize = plan.iter().map(|f| f.validation_indices.len()).sum();
        let frac = oob as f64 / (n * plan.len()) as f64;
        assert!((frac - (-1.0_f64).exp()).abs() < 0.01, "oob fraction {}", frac);
    }

    #[test]
    fn test_seed_reproducible() {
        let s = Resampling::Bootstrap { iterations: 3 };
        assert_eq!(make_folds(30, &s, 5).unwrap(), make_folds(30, &s, 5).unwrap());
    }

    #[test]
    fn test_stratified_folds_mix() {
        let mut strata = vec!["Yes".to_string(); 20];
        strata.extend(vec!["No".to_string(); 80]);
        let plan = make_stratified_folds(&strata, 5, 1, 1).unwrap();
        for f in plan.iter() {
            let yes = f.validation_indices.iter().filter(|&&i| strata[i] == "Yes").count();
            assert_eq!(yes, 4);
            assert_eq!(f.validation_indices.len(), 20);
        }
    }

    #[test]
    fn test_strategy_deserializes() {
        let s: Resampling = serde_json::from_str(r#"{"strategy":"k_fold","k":10}"#).unwrap();
        assert_eq!(s, Resampling::KFold { k: 10, repeats: 1 });
    }

    proptest! {
        #[test]
        fn prop_kfold_validation_sets_partition(n in 2_usize..200, k_seed in 0_usize..1000, seed in any::<u64>()) {
            let k = 2 + k_seed % (n - 1);
            let plan = make_folds(n, &Resampling::KFold { k, repeats: 1 }, seed).unwrap();
            let mut seen = vec![0usize; n];
            for f in plan.iter() {
                for &i in &f.validation_indices {
                    seen[i] += 1;
                }
                for &i in &f.fit_indices {
                    prop_assert!(!f.validation_indices.contains(&i));
                }
                prop_assert_eq!(f.fit_indices.len() + f.validation_indices.len(), n);
            }
            prop_assert!(seen.iter().all(|&c| c == 1));
        }
    }
}
