use std::{
    collections::VecDeque,
    ffi::OsString,
    fs,
    path::{Component, Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

use crate::config::{EXCLUDED_PATH_FRAGMENTS, EXCLUDED_PATH_PREFIXES, MAX_SYMLINK_HOPS};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

enum Step {
    Parent,
    Name(OsString),
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Finds the shallowest executable named one of `names` in an unpacked image filesystem.
///
/// Candidates are ordered by depth and then by path. Symlinks are resolved inside `rootfs` and a
/// candidate must end at a regular file. Returns the path as seen from inside the image.
pub fn find_binary(rootfs: &Path, names: &[&str]) -> Option<String> {
    let mut candidates: Vec<(usize, String)> = WalkDir::new(rootfs)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(rootfs, entry))
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| names.contains(&name))
        })
        .filter_map(|entry| {
            let in_image = in_image_path(rootfs, entry.path())?;
            (!is_excluded(&in_image)).then_some((entry.depth(), in_image))
        })
        .collect();

    candidates.sort();
    candidates
        .into_iter()
        .find(|(_, in_image)| match resolve_in_root(rootfs, in_image) {
            Some(target) => fs::metadata(&target).is_ok_and(|m| m.is_file()),
            None => {
                tracing::debug!("{in_image} does not resolve inside the image");
                false
            }
        })
        .map(|(_, in_image)| in_image)
}

/// Resolves an in-image path to a host path under `root`, following symlinks inside `root`.
///
/// Absolute link targets are taken relative to `root`. Returns `None` when resolution climbs out
/// of `root`, loops, or hits a missing component.
pub fn resolve_in_root(root: &Path, in_image: &str) -> Option<PathBuf> {
    let mut pending = steps(Path::new(in_image));
    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0;

    while let Some(step) = pending.pop_front() {
        let name = match step {
            Step::Parent => {
                resolved.pop()?;
                continue;
            }
            Step::Name(name) => name,
        };

        let candidate = host_path(root, &resolved).join(&name);
        let metadata = fs::symlink_metadata(&candidate).ok()?;
        if !metadata.file_type().is_symlink() {
            resolved.push(name);
            continue;
        }

        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return None;
        }

        let target = fs::read_link(&candidate).ok()?;
        if target.is_absolute() {
            resolved.clear();
        }

        let mut next = steps(&target);
        next.extend(pending);
        pending = next;
    }

    Some(host_path(root, &resolved))
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn steps(path: &Path) -> VecDeque<Step> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(Step::Name(name.to_os_string())),
            Component::ParentDir => Some(Step::Parent),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect()
}

fn host_path(root: &Path, resolved: &[OsString]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(resolved);
    path
}

fn in_image_path(rootfs: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(rootfs).ok()?;
    Some(format!("/{}", relative.to_str()?))
}

fn is_excluded(in_image: &str) -> bool {
    EXCLUDED_PATH_PREFIXES
        .iter()
        .any(|prefix| in_image.starts_with(prefix))
        || EXCLUDED_PATH_FRAGMENTS
            .iter()
            .any(|fragment| in_image.contains(fragment))
}

fn is_excluded_dir(rootfs: &Path, entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }

    in_image_path(rootfs, entry.path()).is_some_and(|path| is_excluded(&format!("{path}/")))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
