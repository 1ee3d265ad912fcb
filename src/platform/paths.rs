use crate::platform::traits::PathNormalizer;
use std::path::{Component, Path, PathBuf};

/// Home directory shorthand
const HOME_SHORTHAND: &str = "~";

/// Expands `~`, anchors relative paths at the working directory and folds
/// `.`/`..` segments lexically. The path does not need to exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomePathNormalizer;

impl PathNormalizer for HomePathNormalizer {
    fn normalize(&self, path: &Path) -> PathBuf {
        let expanded = expand_home(path);

        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(expanded),
                Err(e) => {
                    tracing::debug!(
                        "Cannot resolve working directory for '{}': {}",
                        path.display(),
                        e
                    );
                    expanded
                }
            }
        };

        clean_components(&absolute)
    }
}

/// Normalize with the default [`HomePathNormalizer`]
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    HomePathNormalizer.normalize(path.as_ref())
}

/// Replace a leading `~` component with the home directory.
/// `~user` forms are left alone, and so is `~` when no home directory is known.
fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();

    match components.next() {
        Some(Component::Normal(first)) if first == HOME_SHORTHAND => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => {
                tracing::debug!("Home directory unknown, leaving '{}' unexpanded", path.display());
                path.to_path_buf()
            }
        },
        _ => path.to_path_buf(),
    }
}

/// Resolve `.` and `..` without touching the filesystem. `..` never climbs above the root.
fn clean_components(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_shorthand_is_expanded() {
        let normalized = normalize_path("~/test");

        assert!(normalized.is_absolute());
        assert!(!normalized.to_string_lossy().contains('~'));
        assert!(normalized.ends_with("test"));
    }

    #[test]
    fn test_bare_home_shorthand() {
        let normalized = normalize_path("~");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(normalized, normalize_path(home));
        }
    }

    #[test]
    fn test_tilde_user_form_is_not_expanded() {
        let normalized = normalize_path("~someone/file.txt");
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("~someone/file.txt"));
    }

    #[test]
    fn test_relative_path_is_anchored_at_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let normalized = normalize_path("playlists/./news.m3u");

        assert_eq!(normalized, cwd.join("playlists").join("news.m3u"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dot_segments_are_folded() {
        assert_eq!(normalize_path("/a/b/../c/./d"), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_path("/a/b/c/../../"), PathBuf::from("/a"));
    }

    #[cfg(unix)]
    #[test]
    fn test_parent_never_climbs_above_root() {
        assert_eq!(normalize_path("/../../etc/passwd"), PathBuf::from("/etc/passwd"));
        assert_eq!(normalize_path("/.."), PathBuf::from("/"));
    }

    #[test]
    fn test_nonexistent_path_is_accepted() {
        let normalized = normalize_path("does/not/exist/anywhere.txt");
        assert!(normalized.is_absolute());
        assert!(!normalized.exists());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "~/x",
            "~",
            "relative/../path",
            "./a/./b",
            "../../up",
            "/abs/../abs2/./f.txt",
            "~other/./x",
            "",
        ];

        for input in inputs {
            let once = normalize_path(input);
            let twice = normalize_path(&once);
            assert_eq!(once, twice, "Not idempotent for input: {:?}", input);
        }
    }

    #[test]
    fn test_trait_object_usage() {
        let normalizer: &dyn PathNormalizer = &HomePathNormalizer;
        assert_eq!(
            normalizer.normalize(Path::new("a/b")),
            normalize_path("a/b")
        );
    }
}
