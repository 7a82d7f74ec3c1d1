pub mod chunking_strategy;
pub mod corpus_loader;
pub mod index_handle;
pub mod retriever;
pub mod vector_index;
