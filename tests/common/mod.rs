//! Shared test utilities for E2E tests.
//!
//! Add `mod common;` to a test file, then `use common::prelude::*;`.

use assert_cmd::Command;
use assert_fs::prelude::*;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::filesync_cmd;
    #[allow(unused_imports)]
    pub use super::TestFixture;
}

/// Variable that never holds a token in tests.
pub const UNSET_TOKEN_VARIABLE: &str = "FILESYNC_E2E_UNSET_TOKEN";

/// The `filesync` binary with token and clone-root variables cleared, so a
/// run never reaches the network.
pub fn filesync_cmd() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("filesync");
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove(UNSET_TOKEN_VARIABLE)
        .env_remove("FILESYNC_CLONE_ROOT")
        .env("NO_COLOR", "1");
    cmd
}

/// A temporary directory holding config files for a run.
pub struct TestFixture {
    pub temp: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp: assert_fs::TempDir::new().unwrap(),
        }
    }

    /// Write `content` to `name` inside the fixture and return its path.
    pub fn file(&self, name: &str, content: &str) -> std::path::PathBuf {
        let child = self.temp.child(name);
        child.write_str(content).unwrap();
        child.path().to_path_buf()
    }

    pub fn clone_root(&self) -> std::path::PathBuf {
        self.temp.path().join("clones")
    }
}
