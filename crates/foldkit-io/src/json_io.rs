use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::IoResult;

/// Save any serializable value (a configuration, a fitted model, a summary)
/// as pretty-printed JSON.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> IoResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a value saved with [`save_json`] or written by hand.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> IoResult<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoError;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("foldkit-json-{}.json", std::process::id()));
        let value: BTreeMap<String, Vec<f64>> = [("penalty".to_string(), vec![0.1, 1.0])].into_iter().collect();
        save_json(&value, &path).unwrap();
        let loaded: BTreeMap<String, Vec<f64>> = load_json(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_missing_file() {
        let err = load_json::<Vec<f64>>("/nonexistent/foldkit/config.json").unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }
}
