//! Purpose: Shared library crate used by the `mdbq` CLI and tests.
//! Exports: `api` (stable surface), `core` (tool invocation, decoding, errors).
//! Role: Thin binding over the installed mdbtools executables; all reading of
//! the binary MDB format happens in the external tools, never here.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
