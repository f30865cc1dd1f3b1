pub mod classifier;
pub mod diagnostics;
pub mod dispatcher;
pub mod document;
pub mod downloads;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod retry;
