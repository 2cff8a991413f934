//! Recursive PDF corpus loader.
//!
//! Walks the source directory, applies the include globs (`**/*.pdf` by
//! default), and extracts text one page at a time so chunk metadata can carry
//! page numbers. One unparseable file aborts the whole load: a pass must
//! never partially commit a corpus it could not fully read.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::models::Document;

/// Load every matching PDF under `config.source_path`, one [`Document`] per
/// page. Pages whose extracted text is empty are dropped.
pub fn load_documents(config: &SyncConfig) -> Result<Vec<Document>> {
    let root = &config.source_path;
    if !root.exists() {
        bail!("Corpus source path does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut documents = Vec::new();
    let mut paths = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        paths.push((path.to_path_buf(), rel_str));
    }

    // Deterministic corpus order.
    paths.sort_by(|a, b| a.1.cmp(&b.1));

    for (path, rel_str) in paths {
        documents.extend(load_pdf(&path, &rel_str)?);
    }

    Ok(documents)
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<Document>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .with_context(|| format!("Failed to parse PDF {}", path.display()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Document {
            content: text,
            source: source.to_string(),
            page: i as i64 + 1,
        })
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
