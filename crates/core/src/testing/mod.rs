//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the controller's collaborator
//! traits, so the whole job lifecycle can be exercised without ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use squeezer_core::testing::{EngineStep, MockEngine, MockResolver, MockStager};
//!
//! let engine = MockEngine::new();
//! let resolver = MockResolver::new();
//! let stager = MockStager::new(temp_dir.path());
//!
//! // Configure mock behavior
//! engine.set_script(vec![EngineStep::Start, EngineStep::Fail("boom".into())]);
//! ```

mod memory_content_index;
mod mock_engine;
mod mock_resolver;
mod mock_stager;

pub use memory_content_index::MemoryContentIndex;
pub use mock_engine::{EngineStep, MockEngine};
pub use mock_resolver::MockResolver;
pub use mock_stager::{MockStager, StagerCalls};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs::File;
    use std::io;
    use std::path::{Path, PathBuf};

    /// Create a sparse file of `len` bytes in `dir`.
    pub fn sparse_file(dir: &Path, name: &str, len: u64) -> io::Result<PathBuf> {
        let path = dir.join(name);
        File::create(&path)?.set_len(len)?;
        Ok(path)
    }

    /// Create a small file with real content in `dir`.
    pub fn small_file(dir: &Path, name: &str, len: usize) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, vec![0x5a; len])?;
        Ok(path)
    }
}
