//! Helpers for testing code built on fluxion. Enabled by the
//! `test-utils` feature.

mod recording_middleware;

pub use recording_middleware::RecordingMiddleware;
