//! Loading the knowledge agent's source documents from disk

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions read as plain text
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "text", "csv", "json", "toml", "yaml", "yml", "html",
];

/// One source document
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the data directory, `/`-separated
    pub id: String,
    pub path: PathBuf,
    pub content: String,
}

/// Read every text document under `dir`, recursively, in path order.
///
/// Hidden files and directories are skipped, as are files that are not
/// valid UTF-8. Fails if `dir` cannot be read or holds no documents.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        bail!("Data directory does not exist: {}", dir.display());
    }

    let mut documents = Vec::new();
    walk(dir, dir, &mut documents)?;

    if documents.is_empty() {
        bail!("No documents found in {}", dir.display());
    }
    info!("Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}

fn walk(base: &Path, dir: &Path, documents: &mut Vec<Document>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk(base, &path, documents)?;
            continue;
        }
        if !is_text_file(&path) {
            debug!("Skipping non-text file {}", path.display());
            continue;
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let id = path
                    .strip_prefix(base)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                documents.push(Document { id, path, content });
            }
            Err(e) => warn!("Failed to read {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
