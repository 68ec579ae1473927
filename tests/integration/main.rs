//! Integration tests for the harvest
//!
//! These tests drive the coordinator end-to-end against an on-disk SQLite
//! ledger and shard directory. Most use a scripted in-process fetcher; the
//! HTTP tests use wiremock to stand in for the catalog site.

mod common;
mod harvest_tests;
mod http_tests;
