//! Loading CQL sources from disk into a translation input

use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::{ElmError, Result};
use crate::core::models::CqlInput;

/// Collects a main CQL file and its dependency libraries
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    declaration: Regex,
}

impl LibraryLoader {
    /// Create a new loader
    pub fn new() -> Result<Self> {
        let declaration =
            Regex::new(r#"(?m)^\s*library\s+(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_]*))"#).map_err(
                |e| ElmError::ConfigError {
                    message: format!("library declaration pattern: {}", e),
                },
            )?;
        Ok(Self { declaration })
    }

    /// Identifier from the `library` declaration of a CQL document
    pub fn declared_name(&self, cql: &str) -> Option<String> {
        let captures = self.declaration.captures(cql)?;
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Library key for a file: its declared name, else its file stem
    pub fn library_name(&self, path: &Path, cql: &str) -> Option<String> {
        self.declared_name(cql).or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
    }

    /// Find CQL files in directory, sorted by path
    pub fn find_files(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ElmError::FileError {
                path: dir.display().to_string(),
                message: "Not a directory".to_string(),
            });
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file() && is_cql_file(path))
            .collect();

        files.sort();
        Ok(files)
    }

    /// Build the translation input from a main file and library files
    pub async fn load(&self, main: &Path, libraries: &[PathBuf]) -> Result<CqlInput> {
        let mut input = CqlInput::new(read_source(main).await?);
        let main_path = canonical(main);

        for path in libraries {
            if canonical(path) == main_path {
                debug!("Skipping main file {} among libraries", path.display());
                continue;
            }

            let cql = read_source(path).await?;
            let name = self.library_name(path, &cql).ok_or_else(|| ElmError::FileError {
                path: path.display().to_string(),
                message: "Cannot determine library name".to_string(),
            })?;

            if input.libraries.contains_key(&name) {
                return Err(ElmError::DuplicateLibraryError {
                    name,
                    path: path.display().to_string(),
                });
            }

            debug!("Loaded library {} from {}", name, path.display());
            input.libraries.insert(name, cql);
        }

        info!(
            "Loaded {} with {} libraries",
            main.display(),
            input.libraries.len()
        );
        Ok(input)
    }
}

fn is_cql_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("cql"))
        .unwrap_or(false)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ElmError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_name() {
        let loader = LibraryLoader::new().unwrap();
        assert_eq!(
            loader.declared_name("// header\nlibrary Helper version '1.0.0'\n"),
            Some("Helper".to_string())
        );
        assert_eq!(
            loader.declared_name("library \"Prior Auth Rule\" version '2'"),
            Some("Prior Auth Rule".to_string())
        );
        assert_eq!(loader.declared_name("define X: 1"), None);
    }

    #[test]
    fn test_library_name_falls_back_to_stem() {
        let loader = LibraryLoader::new().unwrap();
        assert_eq!(
            loader.library_name(Path::new("libs/FHIRHelpers.cql"), "define X: 1"),
            Some("FHIRHelpers".to_string())
        );
    }

    #[test]
    fn test_find_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B.cql"), "library B").unwrap();
        std::fs::write(dir.path().join("A.CQL"), "library A").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/C.cql"), "library C").unwrap();

        let loader = LibraryLoader::new().unwrap();
        let flat = loader.find_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("A.CQL"));

        let deep = loader.find_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);

        assert!(loader.find_files(&dir.path().join("B.cql"), false).is_err());
    }

    #[tokio::test]
    async fn test_load_skips_main_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("Rule.cql");
        std::fs::write(&main, "library Rule\ninclude Helper").unwrap();
        std::fs::write(dir.path().join("Zeta.cql"), "library Zeta").unwrap();
        std::fs::write(dir.path().join("Helper.cql"), "library Helper").unwrap();

        let loader = LibraryLoader::new().unwrap();
        let files = loader.find_files(dir.path(), false).unwrap();
        let input = loader.load(&main, &files).await.unwrap();

        assert_eq!(input.main, "library Rule\ninclude Helper");
        let names: Vec<&str> = input.libraries.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["Helper", "Zeta"]);
    }

    #[tokio::test]
    async fn test_load_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("Main.cql");
        std::fs::write(&main, "library Main").unwrap();
        let a = dir.path().join("a.cql");
        let b = dir.path().join("b.cql");
        std::fs::write(&a, "library Shared").unwrap();
        std::fs::write(&b, "library Shared").unwrap();

        let loader = LibraryLoader::new().unwrap();
        let result = loader.load(&main, &[a, b]).await;
        assert!(matches!(result, Err(ElmError::DuplicateLibraryError { .. })));
    }
}
