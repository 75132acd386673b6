//! Unit tests for the sync job queue.

mod pickup_concurrency_tests;
mod service_tests;
