//! Schema document sources.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SchemaConfig;
use crate::error::{GqlKitError, Result};

/// One schema document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaText {
    /// File path or inline label.
    pub origin: String,
    /// SDL text.
    pub text: String,
}

impl SchemaText {
    /// Creates a document.
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

/// Supplies the schema documents of a build.
pub trait SchemaSource: Send + Sync {
    /// Loads every document.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaSource`] if a document cannot be read.
    fn load(&self) -> Result<Vec<SchemaText>>;
}

/// A single inline document.
#[derive(Debug, Clone)]
pub struct StringSchemaSource {
    document: SchemaText,
}

impl StringSchemaSource {
    /// Creates a source from SDL text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            document: SchemaText::new("<inline>", text),
        }
    }

    /// Creates a source with an explicit origin label.
    pub fn labeled(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document: SchemaText::new(origin, text),
        }
    }
}

impl SchemaSource for StringSchemaSource {
    fn load(&self) -> Result<Vec<SchemaText>> {
        Ok(vec![self.document.clone()])
    }
}

/// Documents discovered recursively under one or more directories.
///
/// Files are matched by extension and loaded in sorted path order.
#[derive(Debug, Clone)]
pub struct DirectorySchemaSource {
    roots: Vec<PathBuf>,
    extension: String,
}

impl DirectorySchemaSource {
    /// Scans `root` for `.graphqls` files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            extension: "graphqls".to_string(),
        }
    }

    /// Scans the directories named in the configuration.
    #[must_use]
    pub fn from_config(config: &SchemaConfig) -> Self {
        Self {
            roots: config.directories.clone(),
            extension: config.extension.clone(),
        }
    }

    /// Adds another directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Sets the file extension, without the leading dot.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Lists matching files in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::SchemaSource`] if a directory cannot be read.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for root in &self.roots {
            self.collect(root, &mut files)?;
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn collect(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| source_error(dir, &e))?;
        for entry in entries {
            let path = entry.map_err(|e| source_error(dir, &e))?.path();
            if path.is_dir() {
                self.collect(&path, files)?;
            } else if path.extension().is_some_and(|ext| ext == self.extension.as_str()) {
                files.push(path);
            }
        }
        Ok(())
    }
}

impl SchemaSource for DirectorySchemaSource {
    fn load(&self) -> Result<Vec<SchemaText>> {
        let files = self.discover()?;
        tracing::debug!(files = files.len(), extension = %self.extension, "discovered schema files");
        files
            .into_iter()
            .map(|path| {
                let text = fs::read_to_string(&path).map_err(|e| source_error(&path, &e))?;
                Ok(SchemaText::new(path.display().to_string(), text))
            })
            .collect()
    }
}

fn source_error(path: &Path, err: &std::io::Error) -> GqlKitError {
    GqlKitError::SchemaSource {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
