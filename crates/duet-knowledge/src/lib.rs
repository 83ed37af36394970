//! duet-knowledge: the knowledge agent's document store
//!
//! Loads text documents, splits them into overlapping passages, indexes them
//! with tantivy and answers `query_knowledge_base` calls from the index.

pub mod chunking;
pub mod documents;
pub mod engine;
pub mod index;
pub mod tool;

pub use chunking::{Chunk, ChunkingConfig, chunk_text};
pub use documents::{Document, load_documents};
pub use engine::{NO_RELEVANT_INFORMATION, QueryEngine, RetrievalQueryEngine, build_index};
pub use index::{Passage, PassageIndex, SearchHit};
pub use tool::{KnowledgeBaseTool, NOT_INITIALIZED, knowledge_responder};
