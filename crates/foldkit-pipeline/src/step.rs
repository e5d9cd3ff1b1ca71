use foldkit_core::{DataFrame, Result};
use foldkit_preprocessing::{
    CategoricalEncoder, Encoding, FilterKind, ImputeMethod, Imputer, OtherCollapser, Pca,
    PowerMethod, PowerTransformer, Retain, Selector, StandardScaler, VarianceFilter,
};
use serde::{Deserialize, Serialize};

/// A declared transform: what to do and to which columns. Holds no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Impute { selector: Selector, method: ImputeMethod },
    PowerTransform { selector: Selector, method: PowerMethod },
    Normalize { selector: Selector },
    Other { selector: Selector, threshold: f64 },
    Encode { selector: Selector, encoding: Encoding },
    Pca { selector: Selector, retain: Retain },
    Filter { selector: Selector, kind: FilterKind },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Impute { .. } => "impute",
            Step::PowerTransform { .. } => "power_transform",
            Step::Normalize { .. } => "normalize",
            Step::Other { .. } => "other",
            Step::Encode { .. } => "encode",
            Step::Pca { .. } => "pca",
            Step::Filter { .. } => "filter",
        }
    }

    pub fn selector(&self) -> &Selector {
        match self {
            Step::Impute { selector, .. }
            | Step::PowerTransform { selector, .. }
            | Step::Normalize { selector }
            | Step::Other { selector, .. }
            | Step::Encode { selector, .. }
            | Step::Pca { selector, .. }
            | Step::Filter { selector, .. } => selector,
        }
    }

    /// Learn this step's parameters from `frame`, the fit rows as left by the
    /// steps before it.
    pub fn fit(&self, frame: &DataFrame, outcome: &str) -> Result<FittedStep> {
        let columns = self.selector().resolve(frame, outcome)?;
        Ok(match *self {
            Step::Impute { method, .. } => FittedStep::Impute(Imputer::fit(frame, &columns, method)?),
            Step::PowerTransform { method, .. } => {
                FittedStep::PowerTransform(PowerTransformer::fit(frame, &columns, method)?)
            }
            Step::Normalize { .. } => FittedStep::Normalize(StandardScaler::fit(frame, &columns)?),
            Step::Other { threshold, .. } => {
                FittedStep::Other(OtherCollapser::fit(frame, &columns, threshold)?)
            }
            Step::Encode { encoding, .. } => {
                FittedStep::Encode(CategoricalEncoder::fit(frame, &columns, encoding)?)
            }
            Step::Pca { retain, .. } => FittedStep::Pca(Pca::fit(frame, &columns, retain)?),
            Step::Filter { kind, .. } => FittedStep::Filter(VarianceFilter::fit(frame, &columns, kind)?),
        })
    }
}

/// A step with its learned parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStep {
    Impute(Imputer),
    PowerTransform(PowerTransformer),
    Normalize(StandardScaler),
    Other(OtherCollapser),
    Encode(CategoricalEncoder),
    Pca(Pca),
    Filter(VarianceFilter),
}

impl FittedStep {
    pub fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedStep::Impute(s) => s.apply(frame),
            FittedStep::PowerTransform(s) => s.apply(frame),
            FittedStep::Normalize(s) => s.apply(frame),
            FittedStep::Other(s) => s.apply(frame),
            FittedStep::Encode(s) => s.apply(frame),
            FittedStep::Pca(s) => s.apply(frame),
            FittedStep::Filter(s) => s.apply(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_json() {
        let json = r#"[
            {"step": "impute", "selector": "all_numeric_predictors", "method": {"method": "median"}},
            {"step": "other", "selector": {"columns": ["dept"]}, "threshold": 0.05},
            {"step": "encode", "selector": "all_nominal_predictors", "encoding": {"one_hot": {"full_rank": true}}},
            {"step": "pca", "selector": "all_numeric_predictors", "retain": {"threshold": 0.9}},
            {"step": "filter", "selector": "all_predictors", "kind": {"near_zero_variance": {}}}
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(
            steps[0],
            Step::Impute {
                selector: Selector::AllNumericPredictors,
                method: ImputeMethod::Median
            }
        );
        assert_eq!(steps[1].selector(), &Selector::Columns(vec!["dept".into()]));
        assert_eq!(steps[4], Step::Filter {
            selector: Selector::AllPredictors,
            kind: FilterKind::near_zero_default()
        });
        assert_eq!(steps[3].name(), "pca");
    }
}
