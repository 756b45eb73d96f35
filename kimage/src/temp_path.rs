use std::path::{Path, PathBuf};

use log::debug;

/// Returns a path in the temporary directory that is unlikely to exist, like
/// `/tmp/kimage-Xa81Lq0vB2mN7cPz.json`. The file is not created.
fn temp_file_path(extension: &str) -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    const PREFIX: &str = "kimage-";
    const LEN: usize = 16;

    let mut name = String::with_capacity(PREFIX.len() + LEN + 1 + extension.len());
    name.push_str(PREFIX);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, LEN);
    name.push('.');
    name.push_str(extension);
    std::env::temp_dir().join(name)
}

/// A [`temp_file_path`] that is removed, if something created it, when this is dropped.
pub struct TempFile(PathBuf);

impl TempFile {
    pub fn new(extension: &str) -> Self {
        Self(temp_file_path(extension))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => debug!("failed to remove {:?}: {error}", self.0),
        }
    }
}
