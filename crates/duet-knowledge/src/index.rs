//! Tantivy full-text index over document passages

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tantivy::{
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, collector::TopDocs,
    query::QueryParser, schema::*,
};
use tracing::{debug, info};

/// A passage to index
#[derive(Debug, Clone)]
pub struct Passage {
    pub id: String,
    /// Where the passage came from (relative file path)
    pub source: String,
    pub content: String,
}

/// Search hit with score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub source: String,
    pub content: String,
    pub score: f32,
}

/// Passage index backed by tantivy, in memory or on disk
pub struct PassageIndex {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    source_field: Field,
    content_field: Field,
}

impl PassageIndex {
    /// Index that lives only in memory
    pub fn in_memory() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        Self::from_index(index, fields)
    }

    /// Create or open an index in `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening passage index at {:?}", path);
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create index directory {:?}", path))?;

        let (schema, fields) = build_schema();
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path).context("Failed to open index")?
        } else {
            Index::create_in_dir(path, schema).context("Failed to create index")?
        };
        Self::from_index(index, fields)
    }

    fn from_index(index: Index, (id_field, source_field, content_field): (Field, Field, Field)) -> Result<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;
        Ok(Self {
            index,
            reader,
            id_field,
            source_field,
            content_field,
        })
    }

    /// Replace the whole index content with `passages`
    pub fn rebuild(&self, passages: &[Passage]) -> Result<()> {
        let mut writer = self.writer()?;
        writer.delete_all_documents()?;
        for passage in passages {
            writer.add_document(self.to_document(passage))?;
        }
        writer.commit().context("Failed to commit index")?;
        self.reader.reload()?;
        info!("Indexed {} passages", passages.len());
        Ok(())
    }

    /// Add passages to the index
    pub fn add(&self, passages: &[Passage]) -> Result<()> {
        let mut writer = self.writer()?;
        for passage in passages {
            writer.add_document(self.to_document(passage))?;
        }
        writer.commit().context("Failed to commit index")?;
        self.reader.reload()?;
        debug!("Added {} passages", passages.len());
        Ok(())
    }

    /// Number of indexed passages
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best `limit` passages for a natural-language query.
    ///
    /// Parsing is lenient: stray query syntax (`?`, `:`, quotes) is ignored
    /// rather than failing the search.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let (query, errors) = parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            debug!("Ignored {} query syntax errors in '{}'", errors.len(), query_str);
        }

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(SearchHit {
                id: self.text_of(&doc, self.id_field),
                source: self.text_of(&doc, self.source_field),
                content: self.text_of(&doc, self.content_field),
                score,
            });
        }

        debug!("Search for '{}' returned {} hits", query_str, hits.len());
        Ok(hits)
    }

    fn to_document(&self, passage: &Passage) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id_field, &passage.id);
        doc.add_text(self.source_field, &passage.source);
        doc.add_text(self.content_field, &passage.content);
        doc
    }

    fn text_of(&self, doc: &TantivyDocument, field: Field) -> String {
        doc.get_first(field)
            .and_then(|v: &OwnedValue| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    fn writer(&self) -> Result<IndexWriter> {
        // 50MB heap for the writer
        self.index
            .writer(50_000_000)
            .context("Failed to create index writer")
    }
}

fn build_schema() -> (Schema, (Field, Field, Field)) {
    let mut builder = Schema::builder();
    let id = builder.add_text_field("id", STRING | STORED);
    let source = builder.add_text_field("source", STRING | STORED);
    let content = builder.add_text_field("content", TEXT | STORED);
    (builder.build(), (id, source, content))
}
