//! YAML Template Loader
//!
//! Reads one template per `.yaml` / `.yml` file from a directory. Template
//! invariants are checked while deserializing, so a file that parses is a
//! valid template.

use futures::future::try_join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::domain::consultation::Template;
use crate::domain::foundation::TemplateId;

/// Errors that can occur while loading templates
#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("template id '{0}' is defined more than once")]
    Duplicate(TemplateId),
}

fn io_error(path: &Path, source: std::io::Error) -> TemplateLoadError {
    TemplateLoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Loads templates from a directory of YAML files.
#[derive(Debug, Clone)]
pub struct YamlTemplateLoader {
    dir: PathBuf,
}

impl YamlTemplateLoader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Parses a single template document.
    pub fn parse(path: &Path, raw: &str) -> Result<Template, TemplateLoadError> {
        serde_yaml::from_str(raw).map_err(|source| TemplateLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads every template file, sorted by file name.
    ///
    /// # Errors
    ///
    /// - `Io` if the directory or a file cannot be read
    /// - `Parse` if a file is not a valid template
    /// - `Duplicate` if two files share a template id
    pub async fn load_all(&self) -> Result<Vec<Template>, TemplateLoadError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "yaml" | "yml"));
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        // Files are read concurrently; results keep path order
        let parsed = try_join_all(paths.iter().map(|path| async move {
            let raw = fs::read_to_string(path)
                .await
                .map_err(|e| io_error(path, e))?;
            Self::parse(path, &raw)
        }))
        .await?;

        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(parsed.len());
        for (template, path) in parsed.into_iter().zip(&paths) {
            if !seen.insert(template.id().clone()) {
                return Err(TemplateLoadError::Duplicate(template.id().clone()));
            }
            tracing::debug!(
                template_id = %template.id(),
                stages = template.stage_count(),
                file = %path.display(),
                "Loaded template"
            );
            templates.push(template);
        }

        Ok(templates)
    }
}
