// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Result document persistence
//!
//! Every save rewrites the whole document through a temporary file in the
//! same directory followed by a rename, so a crash leaves either the previous
//! document or the new one. Only one writer may target a path at a time.

use super::schema::ResultTree;
use crate::error::{EvalError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// JSON file holding a [`ResultTree`]
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<ResultTree> {
        load_tree(&self.path)
    }

    /// Load the document, or an empty tree if it does not exist yet
    pub fn load_or_default(&self) -> Result<ResultTree> {
        if self.exists() {
            self.load()
        } else {
            Ok(ResultTree::new())
        }
    }

    /// Atomically replace the document with `tree`
    pub fn save(&self, tree: &ResultTree) -> Result<()> {
        save_tree(tree, &self.path)
    }
}

/// Read a result document
pub fn load_tree(path: &Path) -> Result<ResultTree> {
    let file = std::fs::File::open(path).map_err(|e| EvalError::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| EvalError::json(path, e))
}

/// Write a result document through a temporary file and rename
pub fn save_tree(tree: &ResultTree, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| EvalError::io(&dir, e))?;

    let json = serde_json::to_string_pretty(tree).map_err(|e| EvalError::json(path, e))?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| EvalError::io(&dir, e))?;
    temp.write_all(json.as_bytes())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| EvalError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| EvalError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ObjectResult;
    use tempfile::TempDir;

    #[test]
    fn test_missing_document_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("results.json"));
        assert!(store.load_or_default().unwrap().is_empty());
        assert!(matches!(store.load(), Err(EvalError::Io { .. })));
    }

    #[test]
    fn test_save_overwrites_whole_document() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("nested").join("results.json"));

        let mut tree = ResultTree::new();
        tree.insert("apple", ObjectResult::new("apple_001"));
        store.save(&tree).unwrap();

        tree.insert("banana", ObjectResult::new("banana_001"));
        store.save(&tree).unwrap();

        assert_eq!(store.load().unwrap(), tree);
        let leftovers = std::fs::read_dir(temp.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_document_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("results.json");
        std::fs::write(&path, "{ not json").unwrap();

        match ResultStore::new(&path).load() {
            Err(EvalError::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }
}
