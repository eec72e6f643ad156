//! Workspace root. The crates live in `fluxion-core`, `fluxion-diff`,
//! and `fluxion`; the end-to-end suites over all of them live in this
//! package's `tests/` directory.
