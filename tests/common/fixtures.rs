//! Shared fixtures for integration tests.
//!
//! Include with:
//!
//! ```rust
//! #[path = "common/fixtures.rs"]
//! mod fixtures;
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use rand::rngs::OsRng;
use ssh_key::private::Ed25519Keypair;
use ssh_key::{LineEnding, PrivateKey};
use tempfile::TempDir;

/// Temporary directory with a UTF-8 root path.
pub struct Workspace {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("create temp dir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp dir is not UTF-8: {}", path.display()));
        Self { _tmp: tmp, root }
    }

    /// Root directory of the workspace.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Writes `contents` to `name` and returns the full path.
    pub fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let dir = Dir::open_ambient_dir(&self.root, ambient_authority())
            .unwrap_or_else(|err| panic!("open workspace: {err}"));
        dir.write(name, contents)
            .unwrap_or_else(|err| panic!("write {name}: {err}"));
        self.root.join(name)
    }
}

/// Generates a fresh unencrypted Ed25519 key in OpenSSH format.
pub fn ed25519_private_key() -> String {
    PrivateKey::from(Ed25519Keypair::random(&mut OsRng))
        .to_openssh(LineEnding::LF)
        .unwrap_or_else(|err| panic!("encode key: {err}"))
        .to_string()
}
