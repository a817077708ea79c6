// files.rs -- search-path file system used to load runtime assets (shader text)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::common::{com_dprintf, com_printf};

/// Callback type for loading a file. Returns file contents or None.
/// This is the only file-system surface other subsystems depend on.
pub type FsLoadFileFn = Box<dyn Fn(&str) -> Option<Vec<u8>> + Send>;

/// Ordered search path. Later additions take priority, so a mod directory
/// added after the base directory overrides it.
#[derive(Debug, Default)]
pub struct FileSystem {
    search_paths: Vec<PathBuf>,
    /// In-memory files, checked before the search path (used for built-in
    /// assets and by tools).
    overrides: HashMap<String, Vec<u8>>,
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to the front of the search order.
    pub fn add_game_directory(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref().to_path_buf();
        com_dprintf(&format!("FS_AddGameDirectory: {}\n", dir.display()));
        self.search_paths.insert(0, dir);
    }

    /// Register an in-memory file under `path`.
    pub fn add_memory_file(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        self.overrides.insert(normalize(path), data.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Load a whole file. Returns `None` if it does not exist anywhere on the path.
    pub fn load_file(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path);
        if path.contains("..") {
            com_printf(&format!("FS_LoadFile: refusing relative path {}\n", path));
            return None;
        }

        if let Some(data) = self.overrides.get(&path) {
            return Some(data.clone());
        }

        for dir in &self.search_paths {
            let full = dir.join(&path);
            let mut f = match File::open(&full) {
                Ok(f) => f,
                Err(_) => continue,
            };
            let mut buf = Vec::new();
            if let Err(e) = f.read_to_end(&mut buf) {
                com_printf(&format!("FS_LoadFile: read error on {}: {}\n", full.display(), e));
                return None;
            }
            com_dprintf(&format!("FindFile: {}\n", full.display()));
            return Some(buf);
        }

        None
    }

    /// Snapshot this file system into a loader callback.
    pub fn into_loader(self) -> FsLoadFileFn {
        Box::new(move |path: &str| self.load_file(path))
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
