//! Where to look for the ngspice shared library.
//!
//! Candidates are keyed by platform (`std::env::consts::OS`) and tried in
//! order; the first one that exists on disk wins. The built-in table can be
//! replaced with a TOML file:
//!
//! ```toml
//! [platforms]
//! linux = ["/opt/ngspice/lib/libngspice.so", "/usr/local/lib/libngspice.so"]
//! ```
//!
//! `OHMLINK_CONFIG` names such a file; `OHMLINK_NGSPICE` puts one explicit
//! library path in front of every platform's list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;

use crate::error::{OhmlinkError, Result};

pub const CONFIG_ENV: &str = "OHMLINK_CONFIG";
pub const LIBRARY_ENV: &str = "OHMLINK_NGSPICE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchPaths {
    platforms: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for SearchPaths {
    fn default() -> Self {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            "linux".to_string(),
            paths(&["libngspice.so", "/usr/local/lib/libngspice.so", "/usr/lib/libngspice.so"]),
        );
        platforms.insert(
            "windows".to_string(),
            paths(&[
                "C:\\Program Files\\Spice\\bin_dll\\ngspice.dll",
                "C:\\Program Files\\Spice64\\bin_dll\\ngspice.dll",
                "ngspice.dll",
            ]),
        );
        platforms.insert(
            "freebsd".to_string(),
            paths(&["/usr/local/lib/libngspice.so"]),
        );
        platforms.insert(
            "macos".to_string(),
            paths(&[
                "libngspice.dylib",
                "/usr/local/lib/libngspice.dylib",
                "/opt/homebrew/lib/libngspice.dylib",
            ]),
        );
        Self { platforms }
    }
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

impl SearchPaths {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            OhmlinkError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Built-in table, or the file named by `OHMLINK_CONFIG`, with
    /// `OHMLINK_NGSPICE` prepended when set.
    pub fn from_env() -> Result<Self> {
        let mut paths = match std::env::var_os(CONFIG_ENV) {
            Some(file) => Self::load(Path::new(&file))?,
            None => Self::default(),
        };
        if let Some(lib) = std::env::var_os(LIBRARY_ENV) {
            paths.prepend_all(PathBuf::from(lib));
        }
        Ok(paths)
    }

    /// Put `path` first in every platform's list.
    pub fn prepend_all(&mut self, path: PathBuf) {
        for list in self.platforms.values_mut() {
            list.insert(0, path.clone());
        }
    }

    /// Replace the candidates for one platform.
    pub fn set(&mut self, platform: &str, candidates: Vec<PathBuf>) {
        self.platforms.insert(platform.to_string(), candidates);
    }

    pub fn candidates(&self, platform: &str) -> Result<&[PathBuf]> {
        self.platforms
            .get(platform)
            .map(Vec::as_slice)
            .ok_or_else(|| OhmlinkError::UnknownPlatform(platform.to_string()))
    }

    /// First candidate for `platform` that is an existing file.
    pub fn locate(&self, platform: &str) -> Result<PathBuf> {
        let candidates = self.candidates(platform)?;
        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| OhmlinkError::EngineNotFound {
                searched: candidates.to_vec(),
            })
    }

    /// [`SearchPaths::locate`] for the running platform.
    pub fn locate_current(&self) -> Result<PathBuf> {
        self.locate(std::env::consts::OS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_known_platforms() {
        let paths = SearchPaths::default();
        for os in ["linux", "windows", "freebsd", "macos"] {
            assert!(!paths.candidates(os).unwrap().is_empty(), "{}", os);
        }
    }

    #[test]
    fn test_unknown_platform() {
        let err = SearchPaths::default().locate("plan9").unwrap_err();
        assert!(matches!(err, OhmlinkError::UnknownPlatform(ref p) if p == "plan9"));
    }

    #[test]
    fn test_first_existing_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("b.so");
        let third = dir.path().join("c.so");
        std::fs::write(&second, b"").unwrap();
        std::fs::write(&third, b"").unwrap();

        let mut paths = SearchPaths::default();
        paths.set("linux", vec![dir.path().join("a.so"), second.clone(), third]);
        assert_eq!(paths.locate("linux").unwrap(), second);
    }

    #[test]
    fn test_nothing_found_lists_candidates() {
        let mut paths = SearchPaths::default();
        paths.set("linux", vec![PathBuf::from("/nonexistent/libngspice.so")]);
        match paths.locate("linux") {
            Err(OhmlinkError::EngineNotFound { searched }) => {
                assert_eq!(searched, vec![PathBuf::from("/nonexistent/libngspice.so")]);
            }
            other => panic!("expected EngineNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_override() {
        let paths = SearchPaths::from_toml_str(
            r#"
            [platforms]
            linux = ["/opt/ngspice/lib/libngspice.so"]
            "#,
        )
        .unwrap();
        assert_eq!(
            paths.candidates("linux").unwrap(),
            &[PathBuf::from("/opt/ngspice/lib/libngspice.so")]
        );
        assert!(paths.candidates("windows").is_err());
    }

    #[test]
    fn test_load_from_file_and_prepend() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ohmlink.toml");
        std::fs::write(&file, "[platforms]\nfreebsd = [\"/usr/local/lib/libngspice.so\"]\n").unwrap();

        let mut paths = SearchPaths::load(&file).unwrap();
        paths.prepend_all(PathBuf::from("/custom/libngspice.so"));
        assert_eq!(
            paths.candidates("freebsd").unwrap()[0],
            PathBuf::from("/custom/libngspice.so")
        );
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(matches!(
            SearchPaths::from_toml_str("platforms = 3"),
            Err(OhmlinkError::Toml(_))
        ));
    }
}
