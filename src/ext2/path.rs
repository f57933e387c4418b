use tracing::debug;

use super::dir::lookup_in_directory;
use super::image::{Image, InodeNo, ROOT_INO};
use super::Error;

/// Splits an absolute path into its name components.
///
/// Empty components are skipped, so `"/a//b/"` gives `["a", "b"]` and `"/"`
/// gives nothing.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Resolves `path` to an inode number, starting from the root directory.
///
/// Intermediate components are not type-checked: whatever inode a component
/// names is scanned as a directory for the next one. A missing component
/// gives `Ok(None)`.
pub fn resolve(img: &Image<'_>, path: &str) -> Result<Option<InodeNo>, Error> {
    if !path.starts_with('/') {
        return Err(Error::NotAbsolute(path.to_owned()));
    }
    let parts = split_path(path);
    if parts.is_empty() {
        return Ok(Some(ROOT_INO));
    }

    let mut ino = ROOT_INO;
    let mut cur = img.root_inode()?;
    for name in parts {
        let Some(next) = lookup_in_directory(img, &cur, name)? else {
            debug!(path, component = name, "path does not resolve");
            return Ok(None);
        };
        debug!(component = name, ino = next.get(), "resolved component");
        cur = img.inode(next)?;
        ino = next;
    }
    Ok(Some(ino))
}
