//! Source → destination path mapping.
//!
//! The destination tree never nests deeper than `max_depth` directories.
//! Directory components past that depth are folded into the file name,
//! joined with dashes:
//!
//! ```text
//! max_depth = 2
//! 2019/Trip/Day1/Beach/IMG_01.jpg  →  2019/Trip/Day1-Beach-IMG_01.jpg
//! 2019/Trip/IMG_02.jpg             →  2019/Trip/IMG_02.jpg
//! ```
//!
//! Mapping is a pure function of the relative path and the mapper settings.
//! Recording a mapped path as "should exist after this run" is a separate
//! step on [`DesiredPaths`], so code that only needs to recompute the
//! mapping (orphan detection) cannot disturb a registry owned by someone
//! else.
//!
//! ## Collisions
//!
//! Folding is lossy: `A/B-C/x.jpg` and `A/B/C-x.jpg` both become `A/B-C-x.jpg`
//! at `max_depth = 1`. By default the last file written wins. The registry
//! reports every collision it sees, and `flatten_hash_suffix` adds an
//! 8-character hash of the original path to folded names so they no longer
//! coincide.

use crate::config::MirrorConfig;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Separator used when folding directory components into a file name.
const FOLD_SEPARATOR: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMapper {
    max_depth: usize,
    hash_suffix: bool,
}

impl PathMapper {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            hash_suffix: false,
        }
    }

    pub fn with_hash_suffix(self, hash_suffix: bool) -> Self {
        Self {
            hash_suffix,
            ..self
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.max_depth).with_hash_suffix(config.flatten_hash_suffix)
    }

    /// Map a source-relative path to its destination-relative path.
    ///
    /// Accepts `/` or `\` separated input (whichever the input uses) and
    /// always returns a `/` separated path. `new_extension` replaces the file
    /// extension, e.g. `Some("jpg")` for re-encoded images.
    pub fn map(&self, source_relative: &str, new_extension: Option<&str>) -> String {
        let separator = if source_relative.contains('\\') { '\\' } else { '/' };
        let parts: Vec<&str> = source_relative
            .split(separator)
            .filter(|part| !part.is_empty())
            .collect();
        self.map_components(&parts, new_extension)
    }

    /// Map an already split relative path, last component being the file name.
    ///
    /// Components are never split again, so a name containing `\` (legal on
    /// Unix) stays one name.
    pub fn map_components<S: AsRef<str>>(
        &self,
        parts: &[S],
        new_extension: Option<&str>,
    ) -> String {
        let (file_name, dirs) = match parts.split_last() {
            Some((file_name, dirs)) => (file_name.as_ref(), dirs),
            None => ("", parts),
        };
        let mut dirs: Vec<&str> = dirs.iter().map(AsRef::as_ref).collect();

        let mut file_name = if dirs.len() > self.max_depth {
            let folded = dirs.split_off(self.max_depth);
            let name = format!(
                "{}{FOLD_SEPARATOR}{}",
                folded.join(FOLD_SEPARATOR),
                file_name
            );
            if self.hash_suffix {
                with_suffix(&name, &short_hash(&dirs, &folded, file_name))
            } else {
                name
            }
        } else {
            file_name.to_string()
        };

        if let Some(ext) = new_extension {
            file_name = format!("{}.{ext}", strip_extension(&file_name));
        }

        dirs.push(&file_name);
        dirs.join("/")
    }

    /// Absolute destination path under `dest_root`.
    pub fn destination(
        &self,
        dest_root: &Path,
        source_relative: &str,
        new_extension: Option<&str>,
    ) -> PathBuf {
        dest_root.join(self.map(source_relative, new_extension))
    }
}

/// Components of `path` relative to `root`. `None` if `path` is not under `root`.
pub fn relative_components(root: &Path, path: &Path) -> Option<Vec<String>> {
    let relative = path.strip_prefix(root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect(),
    )
}

/// `path` relative to `root`, `/`-separated. `None` if `path` is not under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    relative_components(root, path).map(|parts| parts.join("/"))
}

/// Everything before the last dot. A name that is all extension (`.jpg`)
/// has an empty stem.
fn strip_extension(name: &str) -> &str {
    name.rfind('.').map_or(name, |i| &name[..i])
}

/// Split `name.ext` into `("name", Some("ext"))`. Dot-files keep their name.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], Some(&name[i + 1..])),
        _ => (name, None),
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match split_extension(name) {
        (stem, Some(ext)) => format!("{stem}{FOLD_SEPARATOR}{suffix}.{ext}"),
        (stem, None) => format!("{stem}{FOLD_SEPARATOR}{suffix}"),
    }
}

/// First 8 hex chars of SHA-256 over the `/`-joined original path, so the
/// suffix is the same whichever separator the input used.
fn short_hash(kept: &[&str], folded: &[&str], file_name: &str) -> String {
    let mut hasher = Sha256::new();
    for part in kept.iter().chain(folded) {
        hasher.update(part.as_bytes());
        hasher.update(b"/");
    }
    hasher.update(file_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Destination paths a run expects to exist when it finishes.
///
/// Safe to share between workers. Inserting a path that is already present
/// is a collision: two different sources map to the same destination.
#[derive(Debug, Default)]
pub struct DesiredPaths {
    inner: Mutex<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    paths: HashSet<String>,
    collisions: Vec<String>,
}

impl DesiredPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if absent. Returns `false` (and records a collision) if the
    /// path was already registered.
    pub fn register(&self, path: String) -> bool {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.paths.contains(&path) {
            registry.collisions.push(path);
            false
        } else {
            registry.paths.insert(path);
            true
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths registered more than once, one entry per extra registration.
    pub fn collisions(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collisions
            .clone()
    }

    pub fn into_set(self) -> HashSet<String> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // =========================================================================
    // PathMapper::map
    // =========================================================================

    #[test]
    fn shallow_path_is_unchanged() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map("X/Y/photo.png", None), "X/Y/photo.png");
        assert_eq!(mapper.map("photo.png", None), "photo.png");
    }

    #[test]
    fn deep_path_folds_excess_components() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map("X/Y/Z/W/photo.png", None), "X/Y/Z-W-photo.png");
    }

    #[test]
    fn one_level_over_folds_a_single_component() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map("X/Y/Z/photo.png", None), "X/Y/Z-photo.png");
    }

    #[test]
    fn zero_depth_folds_everything_into_the_root() {
        let mapper = PathMapper::new(0);
        assert_eq!(mapper.map("A/B/c.jpg", None), "A-B-c.jpg");
        assert_eq!(mapper.map("c.jpg", None), "c.jpg");
    }

    #[test]
    fn new_extension_replaces_the_old_one() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map("X/Y/photo.PNG", Some("jpg")), "X/Y/photo.jpg");
        assert_eq!(
            mapper.map("X/Y/Z/W/photo.tar.png", Some("jpg")),
            "X/Y/Z-W-photo.tar.jpg"
        );
    }

    #[test]
    fn new_extension_on_name_without_extension_appends() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map("X/README", Some("txt")), "X/README.txt");
    }

    #[test]
    fn backslash_input_uses_backslash_separator() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map(r"X\Y\Z\W\photo.png", None), "X/Y/Z-W-photo.png");
    }

    #[test]
    fn components_keep_backslash_inside_a_name() {
        let mapper = PathMapper::new(1);
        assert_eq!(
            mapper.map_components(&["A", "B", r"x\y.jpg"], None),
            r"A/B-x\y.jpg"
        );
        assert_eq!(
            mapper.map_components(&["A", r"x\y.png"], Some("jpg")),
            r"A/x\y.jpg"
        );
    }

    #[test]
    fn components_match_string_mapping_for_plain_names() {
        let mapper = PathMapper::new(2);
        assert_eq!(
            mapper.map_components(&["X", "Y", "Z", "W", "photo.png"], None),
            mapper.map("X/Y/Z/W/photo.png", None)
        );
    }

    #[test]
    fn name_that_is_only_an_extension_keeps_it() {
        let mapper = PathMapper::new(2);
        assert_eq!(mapper.map(".jpg", Some("jpg")), ".jpg");
        assert_eq!(mapper.map("X/.png", Some("jpg")), "X/.jpg");
        assert_eq!(mapper.map("X/.hidden.png", Some("jpg")), "X/.hidden.jpg");
    }

    #[test]
    fn mapping_is_deterministic() {
        let mapper = PathMapper::new(1).with_hash_suffix(true);
        let first = mapper.map("a/b/c/d.jpg", Some("webp"));
        for _ in 0..10 {
            assert_eq!(mapper.map("a/b/c/d.jpg", Some("webp")), first);
        }
    }

    #[test]
    fn destination_directory_depth_is_bounded() {
        let source = "a/b/c/d/e/f/g/h/file.jpg";
        for max_depth in 0..10 {
            let mapped = PathMapper::new(max_depth).map(source, None);
            let dir_count = mapped.split('/').count() - 1;
            assert!(
                dir_count <= max_depth,
                "{mapped} has {dir_count} directories at max_depth {max_depth}"
            );
        }
    }

    #[test]
    fn folding_can_collide_without_hash_suffix() {
        let mapper = PathMapper::new(1);
        assert_eq!(
            mapper.map("A/B-C/x.jpg", None),
            mapper.map("A/B/C-x.jpg", None)
        );
    }

    #[test]
    fn hash_suffix_separates_colliding_names() {
        let mapper = PathMapper::new(1).with_hash_suffix(true);
        let first = mapper.map("A/B-C/x.jpg", None);
        let second = mapper.map("A/B/C/x.jpg", None);
        assert_ne!(first, second);
        assert!(first.starts_with("A/B-C-x-"));
        assert!(first.ends_with(".jpg"));
    }

    #[test]
    fn hash_suffix_only_applies_to_folded_names() {
        let mapper = PathMapper::new(3).with_hash_suffix(true);
        assert_eq!(mapper.map("A/B/x.jpg", None), "A/B/x.jpg");
    }

    #[test]
    fn hash_suffix_ignores_separator_style() {
        let mapper = PathMapper::new(1).with_hash_suffix(true);
        assert_eq!(mapper.map(r"A\B\C\x.jpg", None), mapper.map("A/B/C/x.jpg", None));
    }

    #[test]
    fn relative_key_joins_with_slashes() {
        let root = Path::new("/photos");
        assert_eq!(
            relative_key(root, &root.join("2019").join("a.jpg")).as_deref(),
            Some("2019/a.jpg")
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/a.jpg")), None);
    }

    #[test]
    fn relative_components_splits_on_path_structure() {
        let root = Path::new("/photos");
        assert_eq!(
            relative_components(root, &root.join("2019").join("a.jpg")),
            Some(vec!["2019".to_string(), "a.jpg".to_string()])
        );
        assert_eq!(relative_components(root, Path::new("/elsewhere/a.jpg")), None);
    }

    #[test]
    fn destination_joins_under_root() {
        let mapper = PathMapper::new(1);
        assert_eq!(
            mapper.destination(Path::new("/dst"), "A/B/x.jpg", Some("webp")),
            PathBuf::from("/dst/A/B-x.webp")
        );
    }

    // =========================================================================
    // DesiredPaths
    // =========================================================================

    #[test]
    fn register_is_insert_if_absent() {
        let desired = DesiredPaths::new();
        assert!(desired.register("a/b.jpg".into()));
        assert!(!desired.register("a/b.jpg".into()));
        assert_eq!(desired.len(), 1);
        assert_eq!(desired.collisions(), vec!["a/b.jpg".to_string()]);
    }

    #[test]
    fn register_from_many_threads() {
        let desired = Arc::new(DesiredPaths::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let desired = Arc::clone(&desired);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        desired.register(format!("{}/{}.jpg", t % 4, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(desired.len(), 400);
        assert_eq!(desired.collisions().len(), 400);
    }

    #[test]
    fn into_set_returns_registered_paths() {
        let desired = DesiredPaths::new();
        desired.register("x.jpg".into());
        desired.register("y/z.mp4".into());
        let set = desired.into_set();
        assert!(set.contains("x.jpg"));
        assert!(set.contains("y/z.mp4"));
    }
}
