//! Host to container path translation.
//!
//! The project directory on the host is bind-mounted at `/<project>` inside
//! the toolchain container. Anything under the mount path on the host has an
//! equivalent path under that root.

use std::path::{Component, Path, PathBuf};

use crate::errors::{Result, ToolchainError};

/// Root directory of the bind mount inside the container.
pub fn container_root(project_name: &str) -> String {
    format!("/{}", project_name)
}

/// Translate a host path under `mount_path` into the path the container sees.
///
/// `host_path` and `mount_path` are compared lexically after resolving `.` and
/// `..` components, so both should be absolute. The result always uses forward
/// slashes, and a backslash inside a component is treated as a separator too.
pub fn to_container_path(host_path: &Path, mount_path: &Path, project_name: &str) -> Result<String> {
    let host = normalize(host_path);
    let mount = normalize(mount_path);

    let relative = host
        .strip_prefix(&mount)
        .map_err(|_| ToolchainError::PathOutsideMount {
            path: host_path.to_path_buf(),
            mount: mount_path.to_path_buf(),
        })?;

    let mut container_path = container_root(project_name);
    for part in relative.components() {
        let part = part.as_os_str().to_string_lossy();
        for segment in part.split('\\').filter(|s| !s.is_empty()) {
            container_path.push('/');
            container_path.push_str(segment);
        }
    }
    Ok(container_path)
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
