//! Workspace root crate.
//!
//! Holds no logic of its own — it exists so the root-level integration test
//! suites in `tests/integration/` (the literal S1-S6 scenarios from the
//! protocol specification) have a package to attach to, and so they can
//! depend on every other workspace member via `[dev-dependencies]`.
