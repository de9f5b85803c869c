//! Utilities for describing sweeps in files.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::path::{Path, PathBuf};

use sweep_core::ParamSpace;

/// Reads a [`ParamSpace`] from a file in JSON or Dhall format.
///
/// The file holds a single record mapping parameter names to either one value or a list of
/// values. JSON objects keep their field order. Dhall records are ordered by field name.
pub fn read_param_space(path: impl AsRef<Path>) -> Result<ParamSpace, Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let space: ParamSpace = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        Some("dhall") => serde_dhall::from_str(&contents).parse().map_err(Box::new)?,
        _ => return Err(Error::UnknownFileType(path.into())),
    };
    if space.is_empty() {
        return Err(Error::EmptySpace(path.into()));
    }
    Ok(space)
}

/// Error kinds for sweep descriptions and I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown file type.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// The file declares no parameters.
    #[error("no parameters in {0}")]
    EmptySpace(PathBuf),

    /// Error deserializing Dhall.
    #[error("Dhall error")]
    Dhall(#[from] Box<serde_dhall::Error>),

    /// Error deserializing JSON.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sweep_core::{ParamEntry, ParamValue};

    use super::*;

    #[test]
    fn json_keeps_declaration_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("space.json");
        fs::write(
            &path,
            r#"{
                "phyMode": "DMG_MCS4",
                "numStas": [2, 4, 8],
                "normOfferedTraffic": 0.75,
                "smartStart": [true, false]
            }"#,
        )?;
        let space = read_param_space(&path)?;
        assert_eq!(
            space.names().collect::<Vec<_>>(),
            ["phyMode", "numStas", "normOfferedTraffic", "smartStart"]
        );
        assert_eq!(space.get("numStas"), Some(&ParamEntry::list([2_i64, 4, 8])));
        assert_eq!(
            space.get("normOfferedTraffic").map(ParamEntry::values),
            Some(&[ParamValue::from(0.75)][..])
        );
        assert_eq!(space.nr_assignments(), 6);
        Ok(())
    }

    #[test]
    fn dhall_record() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("space.dhall");
        fs::write(
            &path,
            r#"let stas = [ 1, 2, 3 ] in { numStas = stas, phyMode = "DMG_MCS1", allocationPeriod = [ 0, 1 ] }"#,
        )?;
        let space = read_param_space(&path)?;
        assert_eq!(space.len(), 3);
        assert_eq!(space.get("numStas"), Some(&ParamEntry::list([1_i64, 2, 3])));
        assert_eq!(space.get("phyMode"), Some(&ParamEntry::single("DMG_MCS1")));
        assert_eq!(space.nr_assignments(), 6);
        Ok(())
    }

    #[test]
    fn rejects_bad_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let toml = dir.path().join("space.toml");
        fs::write(&toml, "numStas = 4")?;
        assert!(matches!(read_param_space(&toml), Err(Error::UnknownFileType(_))));
        let empty = dir.path().join("space.json");
        fs::write(&empty, "{}")?;
        assert!(matches!(read_param_space(&empty), Err(Error::EmptySpace(_))));
        let dup = dir.path().join("dup.json");
        fs::write(&dup, r#"{"numStas": 1, "numStas": 2}"#)?;
        assert!(matches!(read_param_space(&dup), Err(Error::Json(_))));
        Ok(())
    }
}
