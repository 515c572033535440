//! TOML and JSON file loading shared by machine configs and moves files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{fs, path::Path};

/// Read and parse `path`, picking the format from its extension.
///
/// Files without a `.toml` or `.json` extension are tried as TOML first, then
/// as JSON. `what` names the document in error messages.
pub(crate) fn load<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => from_toml(&content, what),
        Some("json") => from_json(&content, what),
        _ => from_toml(&content, what).or_else(|_| from_json(&content, what)),
    }
}

pub(crate) fn from_toml<T: DeserializeOwned>(content: &str, what: &str) -> Result<T> {
    toml::from_str(content).with_context(|| format!("failed to parse {what} as TOML"))
}

pub(crate) fn from_json<T: DeserializeOwned>(content: &str, what: &str) -> Result<T> {
    serde_json::from_str(content).with_context(|| format!("failed to parse {what} as JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn format_follows_extension() {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };

        let toml = write("doc.toml", "value = 1");
        assert_eq!(load::<Doc>(&toml, "doc").unwrap(), Doc { value: 1 });

        let json = write("doc.json", r#"{ "value": 2 }"#);
        assert_eq!(load::<Doc>(&json, "doc").unwrap(), Doc { value: 2 });

        // JSON content behind a .toml extension is not retried
        let mislabeled = write("json.toml", r#"{ "value": 3 }"#);
        let err = load::<Doc>(&mislabeled, "doc").unwrap_err();
        assert_eq!(err.to_string(), "failed to parse doc as TOML");

        let bare = write("doc", r#"{ "value": 4 }"#);
        assert_eq!(load::<Doc>(&bare, "doc").unwrap(), Doc { value: 4 });
    }

    #[test]
    fn missing_file_names_the_document() {
        let dir = TempDir::new().unwrap();
        let err = load::<Doc>(&dir.path().join("gone.toml"), "moves").unwrap_err();
        assert!(err.to_string().starts_with("failed to read moves file"));
    }
}
