mod embedding;
mod storage;
mod summarizer;

pub use embedding::IEmbeddingProvider;
pub use storage::ICorpusStorage;
pub use summarizer::IEpisodeSummarizer;
