//! Collection store: maps passage ids to their text.
//!
//! Raw collections are TSV files with one `pid<TAB>text[<TAB>title]` record per
//! line. When a title column is present the stored text is `title | text`;
//! columns after the title are ignored. A first line whose leading field is not
//! numeric is treated as a header.

use crate::error::CollectionError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Passage identifier (`pid`).
pub type DocId = u64;

/// An immutable, loaded document collection.
#[derive(Debug, Default)]
pub struct Collection {
    /// Passages in file order.
    passages: Vec<(DocId, String)>,
    /// pid → position in `passages`.
    positions: HashMap<DocId, usize>,
}

impl Collection {
    /// Loads a TSV collection from disk.
    pub fn load(path: &Path) -> Result<Self, CollectionError> {
        let file = File::open(path).map_err(|source| CollectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut collection = Collection::default();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| CollectionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            collection.push_line(path, idx + 1, &line)?;
        }

        tracing::debug!(
            path = %path.display(),
            documents = collection.len(),
            "Loaded collection"
        );
        Ok(collection)
    }

    /// Builds a collection from in-memory passages. Later duplicates replace earlier ones.
    pub fn from_passages<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = (DocId, S)>,
        S: Into<String>,
    {
        let mut collection = Collection::default();
        for (pid, text) in passages {
            let text = text.into();
            match collection.positions.get(&pid) {
                Some(&pos) => collection.passages[pos].1 = text,
                None => {
                    collection
                        .positions
                        .insert(pid, collection.passages.len());
                    collection.passages.push((pid, text));
                }
            }
        }
        collection
    }

    fn push_line(&mut self, path: &Path, line_no: usize, line: &str) -> Result<(), CollectionError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return Ok(());
        }

        let mut fields = line.split('\t');
        let pid_field = fields.next().unwrap_or_default().trim();
        let pid: DocId = match pid_field.parse() {
            Ok(pid) => pid,
            Err(_) if line_no == 1 => return Ok(()),
            Err(_) => {
                return Err(CollectionError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason: format!("invalid pid '{}'", pid_field),
                })
            }
        };
        let passage = fields.next().ok_or_else(|| CollectionError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            reason: "expected pid<TAB>text".to_string(),
        })?;
        let text = match fields.next() {
            Some(title) => format!("{} | {}", title, passage),
            None => passage.to_string(),
        };

        if self.positions.contains_key(&pid) {
            return Err(CollectionError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("duplicate pid {}", pid),
            });
        }
        self.positions.insert(pid, self.passages.len());
        self.passages.push((pid, text));
        Ok(())
    }

    /// Returns the text of passage `pid`.
    pub fn text_of(&self, pid: DocId) -> Result<&str, CollectionError> {
        self.positions
            .get(&pid)
            .map(|&pos| self.passages[pos].1.as_str())
            .ok_or(CollectionError::NotFound(pid))
    }

    /// Iterates over `(pid, text)` in file order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &str)> + '_ {
        self.passages.iter().map(|(pid, text)| (*pid, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}
