// MIST Gateway - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// App root discovery and user path expansion.
// Root is cached via OnceLock: resolved once per process.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static APP_ROOT_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Find the MIST root directory.
///
/// Resolution order:
///   1. Walk up from binary location looking for Cargo.toml
///   2. MIST_ROOT environment variable
///   3. Current working directory
pub fn app_root() -> &'static Path {
    APP_ROOT_CACHE.get_or_init(|| {
        if let Ok(exe) = std::env::current_exe() {
            if let Ok(canonical) = exe.canonicalize() {
                let mut dir = canonical.parent();
                while let Some(d) = dir {
                    if d.join("Cargo.toml").exists() {
                        return d.to_path_buf();
                    }
                    dir = d.parent();
                }
            }
        }

        if let Ok(root) = std::env::var("MIST_ROOT") {
            let p = PathBuf::from(&root);
            if p.exists() {
                return p;
            }
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    })
}

/// Default notes directory: {app root}/notes
pub fn default_notes_dir() -> PathBuf {
    app_root().join("notes")
}

/// Expand a leading "~" to $HOME. Other paths are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_home("/var/notes"), PathBuf::from("/var/notes"));
        assert_eq!(expand_home("token.json"), PathBuf::from("token.json"));
        assert_eq!(expand_home("a/~/b"), PathBuf::from("a/~/b"));
    }

    #[test]
    fn tilde_expands_under_home() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_home("~/notes"), PathBuf::from(&home).join("notes"));
            assert_eq!(expand_home("~"), PathBuf::from(&home));
        }
    }

    #[test]
    fn notes_dir_lives_under_root() {
        assert!(default_notes_dir().starts_with(app_root()));
        assert!(default_notes_dir().ends_with("notes"));
    }
}
