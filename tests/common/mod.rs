//! Common test utilities and helpers
//!
//! This module provides shared functionality used across integration tests:
//! - Binary path resolution (via `helpers::ccpd_build_binary`)
//! - A throwaway Bazel project with a fake `bazel` (via `helpers::Project`)

pub(crate) mod helpers;

pub(crate) use helpers::Project;
