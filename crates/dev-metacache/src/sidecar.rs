//! The sidecar-file collaborator (spec §4.A "write-back", §6). We resolved
//! the open question of sidecar format in favor of TOML (kept aligned with
//! `dev-config`'s format rather than the XML the original tooling used —
//! nothing in spec.md names a wire format, so we pick the one already in
//! this workspace's toolbox instead of adding a second serialization crate).

use dev_types::ImageId;
use std::path::{Path, PathBuf};

/// Derives the sidecar path for a raw file: `IMG_0001.CR2` -> `IMG_0001.CR2.txt`,
/// matching the `HAS_TXT` flag semantics in spec §3 (a sidecar's mere
/// presence is what that flag records).
pub fn notes_path(fullpath: &str) -> PathBuf {
    let mut p = PathBuf::from(fullpath);
    let mut name = p.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".txt");
    p.set_file_name(name);
    p
}

/// Opaque per-image sidecar payload (history stack serialized by
/// `dev-graph`, kept opaque here to avoid a dependency cycle).
pub type SidecarBlob = Vec<u8>;

/// The sidecar-file collaborator contract.
pub trait SidecarStore: Send + Sync {
    fn load(&self, id: ImageId, fullpath: &str) -> Option<SidecarBlob>;
    fn save(&self, id: ImageId, fullpath: &str, blob: &SidecarBlob) -> std::io::Result<()>;
    fn exists(&self, fullpath: &str) -> bool;
}

/// A filesystem-backed sidecar store writing `<name>.txt` next to the raw
/// file.
pub struct FsSidecarStore;

impl SidecarStore for FsSidecarStore {
    fn load(&self, _id: ImageId, fullpath: &str) -> Option<SidecarBlob> {
        std::fs::read(notes_path(fullpath)).ok()
    }

    fn save(&self, _id: ImageId, fullpath: &str, blob: &SidecarBlob) -> std::io::Result<()> {
        std::fs::write(notes_path(fullpath), blob)
    }

    fn exists(&self, fullpath: &str) -> bool {
        Path::new(&notes_path(fullpath)).is_file()
    }
}
