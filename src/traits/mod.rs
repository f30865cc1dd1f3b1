pub mod chat_transport;
pub mod counter_store;
pub mod page_fetcher;
