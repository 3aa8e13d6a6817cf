//! Core data models for translation

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::errors::{ElmError, Result};

/// Name of the part carrying the entry-point library
pub const MAIN_PART: &str = "main";

/// CQL sources for one translation: the entry point plus its dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlInput {
    pub main: String,
    /// Library name to CQL text, in the order parts are sent
    #[serde(default)]
    pub libraries: IndexMap<String, String>,
}

impl CqlInput {
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            libraries: IndexMap::new(),
        }
    }

    pub fn with_library(mut self, name: impl Into<String>, cql: impl Into<String>) -> Self {
        self.libraries.insert(name.into(), cql.into());
        self
    }
}

/// Translated ELM for a `CqlInput`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElmOutput {
    /// ELM of the part named `main`, if the service returned one
    pub main: Option<Value>,
    #[serde(default)]
    pub libraries: IndexMap<String, Value>,
}

impl ElmOutput {
    /// Fold one named JSON part into the output
    pub fn absorb(mut self, name: &str, elm: Value) -> Self {
        if name == MAIN_PART {
            self.main = Some(elm);
        } else {
            self.libraries.insert(name.to_string(), elm);
        }
        self
    }

    /// Translator annotations of every library, tagged with the library name
    pub fn issues(&self) -> Vec<(String, TranslationIssue)> {
        let main = self
            .main
            .iter()
            .map(|elm| (MAIN_PART.to_string(), elm));
        let libraries = self
            .libraries
            .iter()
            .map(|(name, elm)| (name.clone(), elm));

        main.chain(libraries)
            .flat_map(|(name, elm)| {
                TranslationIssue::from_elm(elm)
                    .into_iter()
                    .map(move |issue| (name.clone(), issue))
            })
            .collect()
    }

    /// Whether any library carries an error-severity annotation
    pub fn has_errors(&self) -> bool {
        self.issues().iter().any(|(_, issue)| issue.is_error())
    }

    /// Write `main.json` and one `<library>.json` per library into `dir`
    pub async fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let main = self.main.iter().map(|elm| (MAIN_PART, elm));
        let libraries = self.libraries.iter().map(|(name, elm)| (name.as_str(), elm));
        let entries: Vec<(&str, &Value)> = main.chain(libraries).collect();

        // Names come from the remote response; check all before touching disk
        for (name, _) in &entries {
            if !is_safe_file_stem(name) {
                return Err(ElmError::UnsafeNameError {
                    name: name.to_string(),
                });
            }
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ElmError::FileError {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;

        let mut written = Vec::new();
        for (name, elm) in entries {
            let path = dir.join(format!("{}.json", name));
            let content = serde_json::to_string_pretty(elm)?;
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| ElmError::FileError {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }
}

/// A single path component that stays inside its parent directory
fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && !Path::new(name).is_absolute()
}

/// Severity the translator attached to an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Source range an annotation points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub start_line: u64,
    pub start_char: u64,
    pub end_line: u64,
    pub end_char: u64,
}

/// A `CqlToElmError` annotation embedded in translated ELM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationIssue {
    pub severity: Severity,
    pub message: String,
    pub locator: Option<Locator>,
}

impl TranslationIssue {
    /// Collect `CqlToElmError` annotations from `library.annotation`
    pub fn from_elm(elm: &Value) -> Vec<Self> {
        let Some(annotations) = elm["library"]["annotation"].as_array() else {
            return Vec::new();
        };

        annotations
            .iter()
            .filter(|a| a["type"].as_str() == Some("CqlToElmError"))
            .map(|a| {
                let severity = match a["errorSeverity"].as_str() {
                    Some("warning") => Severity::Warning,
                    Some("info") => Severity::Info,
                    _ => Severity::Error,
                };

                let line = |key: &str| a[key].as_u64();
                let locator = match (
                    line("startLine"),
                    line("startChar"),
                    line("endLine"),
                    line("endChar"),
                ) {
                    (Some(start_line), Some(start_char), Some(end_line), Some(end_char)) => {
                        Some(Locator {
                            start_line,
                            start_char,
                            end_line,
                            end_char,
                        })
                    }
                    _ => None,
                };

                Self {
                    severity,
                    message: a["message"].as_str().unwrap_or_default().to_string(),
                    locator,
                }
            })
            .collect()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for TranslationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Some(loc) => write!(
                f,
                "[{}:{}, {}:{}]{}",
                loc.start_line, loc.start_char, loc.end_line, loc.end_char, self.message
            ),
            None => write!(f, "[n/a]{}", self.message),
        }
    }
}

/// `library.identifier` of an ELM document as `(id, version)`
pub fn library_identifier(elm: &Value) -> Option<(String, Option<String>)> {
    let identifier = &elm["library"]["identifier"];
    let id = identifier["id"].as_str()?.to_string();
    let version = identifier["version"].as_str().map(|v| v.to_string());
    Some((id, version))
}
