//! In-memory output filesystem.
//!
//! Bundler output never touches disk. Every unit writes into a [`MemoryFs`]
//! under its output directory (`/hello/world`, `/client/hello/world`, ...)
//! and requests are answered from it. A rebuild overwrites files in place.

use parking_lot::RwLock;
use path_clean::PathClean;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Thread-safe hierarchical byte store.
///
/// Paths are normalized (`/a/./b/../c` is `/a/c`) and always absolute.
/// Readers get an `Arc` to the content, so a concurrent overwrite never tears
/// a response.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<PathBuf, Arc<[u8]>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(path: impl AsRef<Path>) -> PathBuf {
        Path::new("/").join(path.as_ref()).clean()
    }

    /// Write (or overwrite) a file.
    pub fn write_file(&self, path: impl AsRef<Path>, content: impl Into<Arc<[u8]>>) {
        let path = Self::normalize(path);
        self.files.write().insert(path, content.into());
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Option<Arc<[u8]>> {
        self.files.read().get(&Self::normalize(path)).cloned()
    }

    /// Read a file as UTF-8 text, lossily.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.read_file(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// True for files only; directories are implicit.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.files.read().contains_key(&Self::normalize(path))
    }

    /// Remove one file. Returns whether it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.files.write().remove(&Self::normalize(path)).is_some()
    }

    /// Remove every file below `dir`. Returns how many were removed.
    pub fn remove_dir(&self, dir: impl AsRef<Path>) -> usize {
        let dir = Self::normalize(dir);
        let mut files = self.files.write();
        let before = files.len();
        files.retain(|path, _| !path.starts_with(&dir));
        before - files.len()
    }

    /// Files below `dir`, in path order.
    pub fn list(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = Self::normalize(dir);
        self.files
            .read()
            .range(dir.clone()..)
            .take_while(|(path, _)| path.starts_with(&dir))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

/// Content type for a store-served asset, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "js" | "mjs" | "ts" => "application/javascript",
        "json" | "map" => "application/json",
        "css" | "scss" | "sass" | "less" => "text/css",
        "html" | "htm" => "text/html; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "ttf" => "application/font-ttf",
        "eot" => "application/vnd.ms-fontobject",
        "woff" => "application/font-woff",
        "woff2" => "application/font-woff2",
        "otf" => "application/x-font-opentype",
        "swf" => "application/x-shockwave-flash",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "mov" => "video/quicktime",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        "apk" => "application/vnd.android.package-archive",
        "plist" => "application/xml",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_overwrite() {
        let fs = MemoryFs::new();
        assert!(fs.is_empty());

        fs.write_file("/hello/world/index.js", b"v1".to_vec());
        assert_eq!(&*fs.read_file("/hello/world/index.js").unwrap(), b"v1");

        let held = fs.read_file("/hello/world/index.js").unwrap();
        fs.write_file("/hello/world/index.js", b"v2".to_vec());
        assert_eq!(&*held, b"v1");
        assert_eq!(fs.read_to_string("/hello/world/index.js").unwrap(), "v2");
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn paths_are_normalized() {
        let fs = MemoryFs::new();
        fs.write_file("client/a/./b/../app.js", b"x".to_vec());
        assert!(fs.exists("/client/a/app.js"));
        assert!(!fs.exists("/client/a"));
    }

    #[test]
    fn remove_dir_only_touches_subtree() {
        let fs = MemoryFs::new();
        fs.write_file("/client/foo/app.js", b"1".to_vec());
        fs.write_file("/client/foo/css/app.css", b"2".to_vec());
        fs.write_file("/client/foobar/app.js", b"3".to_vec());
        fs.write_file("/server/foo/bundle.json", b"4".to_vec());

        assert_eq!(fs.remove_dir("/client/foo"), 2);
        assert!(fs.exists("/client/foobar/app.js"));
        assert!(fs.exists("/server/foo/bundle.json"));
    }

    #[test]
    fn remove_file_is_exact() {
        let fs = MemoryFs::new();
        fs.write_file("/bar/index.js", b"1".to_vec());
        fs.write_file("/bar/qux/index.js", b"2".to_vec());

        assert!(fs.remove_file("/bar/index.js"));
        assert!(!fs.remove_file("/bar/index.js"));
        assert!(fs.exists("/bar/qux/index.js"));
    }

    #[test]
    fn list_is_sorted_and_scoped() {
        let fs = MemoryFs::new();
        fs.write_file("/p/b.js", b"".to_vec());
        fs.write_file("/p/a.js", b"".to_vec());
        fs.write_file("/q/c.js", b"".to_vec());

        assert_eq!(
            fs.list("/p"),
            vec![PathBuf::from("/p/a.js"), PathBuf::from("/p/b.js")]
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("/a/b.js"), "application/javascript");
        assert_eq!(content_type_for("/a/b.CSS"), "text/css");
        assert_eq!(content_type_for("/a/b.js.map"), "application/json");
        assert_eq!(content_type_for("/a/b"), "application/octet-stream");
    }
}
