use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use async_trait::async_trait;

use super::traits::{Loader, Page};
use crate::error::{ImportError, Result};

/// Loader for JSONL bulk exports: one JSON record per line.
///
/// The whole file is yielded as a single terminal page. Calling
/// [`next_page`](Loader::next_page) again after that returns the empty
/// terminal page.
#[derive(Debug)]
pub struct BulkFileLoader {
    path: PathBuf,
    consumed: bool,
}

impl BulkFileLoader {
    pub fn new(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ImportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }
        Ok(Self {
            path,
            consumed: false,
        })
    }
}

#[async_trait]
impl Loader for BulkFileLoader {
    async fn next_page(&mut self) -> Result<Page> {
        if self.consumed {
            return Ok(Page::empty());
        }
        self.consumed = true;

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => records.push(value),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed line {} in {}: {}",
                        line_no + 1,
                        self.path.display(),
                        e
                    );
                }
            }
        }

        Ok(Page::terminal(records))
    }

    fn source_name(&self) -> &str {
        "bulk-file"
    }
}
