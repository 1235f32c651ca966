//! Naming output files after their source.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Splits the file name of `path` into its stem and extension (with the dot).
fn split(path: &Path) -> (OsString, OsString) {
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let extension = path
        .extension()
        .map(|extension| {
            let mut dotted = OsString::from(".");
            dotted.push(extension);
            dotted
        })
        .unwrap_or_default();
    (stem, extension)
}

/// Appends `_extra` to the stem of `path`, keeping the directory and extension.
///
/// # Examples
/// ```
/// # use pngsqueeze::paths::sibling_path;
/// # use std::path::Path;
/// assert_eq!(sibling_path("out/to.png", "extra"), Path::new("out/to_extra.png"));
/// assert_eq!(sibling_path("to", "extra"), Path::new("to_extra"));
/// ```
#[must_use]
pub fn sibling_path(path: impl AsRef<Path>, extra: &str) -> PathBuf {
    let path = path.as_ref();
    let (mut name, extension) = split(path);
    name.push("_");
    name.push(extra);
    name.push(extension);
    path.with_file_name(name)
}

/// Prepends `extra_` to the file name of `path`, keeping the directory.
///
/// # Examples
/// ```
/// # use pngsqueeze::paths::prefixed_path;
/// # use std::path::Path;
/// assert_eq!(prefixed_path("out/to.png", "extra"), Path::new("out/extra_to.png"));
/// ```
#[must_use]
pub fn prefixed_path(path: impl AsRef<Path>, extra: &str) -> PathBuf {
    let path = path.as_ref();
    let (stem, extension) = split(path);
    let mut name = OsString::from(extra);
    name.push("_");
    name.push(stem);
    name.push(extension);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(sibling_path("to.ext", "extra"), PathBuf::from("to_extra.ext"));
        assert_eq!(prefixed_path("to.ext", "extra"), PathBuf::from("extra_to.ext"));
        assert_eq!(sibling_path("/a/b/c.tar.gz", "32"), PathBuf::from("/a/b/c.tar_32.gz"));
        assert_eq!(prefixed_path("/a/b/.hidden", "x"), PathBuf::from("/a/b/x_.hidden"));
    }
}
