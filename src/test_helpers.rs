//! Shared test fixtures for the rokka-render test suite.

/// A real 40-character content hash.
pub const HASH: &str = "c421f4e8cefe0fd3aab22832f51e85bacda0a47a";
