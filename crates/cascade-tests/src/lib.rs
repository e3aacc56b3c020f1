//! Test infrastructure for Cascade.
//!
//! This crate provides an in-memory host implementing every port the trigger
//! engine talks to, plus builders for describing pipeline graphs.
//!
//! # Usage
//!
//! ```ignore
//! use cascade_tests::{PipelineFixture, TestHost, artifact};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let lib = artifact("com.example", "lib", "1.0");
//!     let host = TestHost::builder()
//!         .pipeline(PipelineFixture::new("lib").build(1, [lib.clone()]))
//!         .pipeline(PipelineFixture::new("app").depends_on(lib).build(1, []))
//!         .build();
//!     // Wrap it in an Arc and hand it to the engine as every port.
//! }
//! ```

pub mod fixtures;
pub mod helpers;
pub mod host;

pub use fixtures::*;
pub use helpers::*;
pub use host::{TestHost, TestHostBuilder};

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,cascade_scheduler=debug")),
        )
        .with_test_writer()
        .try_init();
}
