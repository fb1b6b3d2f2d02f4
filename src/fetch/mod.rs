pub mod coordinator;
pub mod day_fetcher;
pub mod error;
pub mod job;
pub mod normalizer;
pub mod output_path;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
