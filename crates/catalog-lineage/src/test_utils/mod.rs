//! Test doubles for lineage consumers

pub mod fakes;

pub use fakes::FakeLineageBackend;
