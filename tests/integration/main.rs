//! Integration tests for the namespace directory index

mod support;

mod concurrent_writers;
mod end_to_end;
mod interleaved_writers;
mod sled_store;
