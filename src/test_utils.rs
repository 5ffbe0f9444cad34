//! Shared test utilities for ccpd-build tests
//!
//! Fixtures for unit tests that need a real file on disk.
