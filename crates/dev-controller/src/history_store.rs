//! The edit-history sidecar (spec §4.A "write-back", §6 "round-trip
//! invariant"): a dedicated artifact, distinct from `dev-metacache`'s
//! free-text notes sidecar (`<name>.txt`, the `HAS_TXT` flag) even though
//! both derive their path from the raw file's name.

use dev_types::ImageId;
use std::path::{Path, PathBuf};

pub fn history_path(fullpath: &str) -> PathBuf {
    let mut p = PathBuf::from(fullpath);
    let mut name = p.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".history.toml");
    p.set_file_name(name);
    p
}

pub trait HistorySidecarStore: Send + Sync {
    fn load(&self, id: ImageId, fullpath: &str) -> Option<String>;
    fn save(&self, id: ImageId, fullpath: &str, toml: &str) -> std::io::Result<()>;
    fn exists(&self, fullpath: &str) -> bool;
}

pub struct FsHistorySidecarStore;

impl HistorySidecarStore for FsHistorySidecarStore {
    fn load(&self, _id: ImageId, fullpath: &str) -> Option<String> {
        std::fs::read_to_string(history_path(fullpath)).ok()
    }

    fn save(&self, _id: ImageId, fullpath: &str, toml: &str) -> std::io::Result<()> {
        std::fs::write(history_path(fullpath), toml)
    }

    fn exists(&self, fullpath: &str) -> bool {
        Path::new(&history_path(fullpath)).is_file()
    }
}
