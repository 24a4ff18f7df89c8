use typed_path::{Utf8UnixComponent, Utf8UnixPathBuf};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The path of the root directory of a snapshot.
pub const ROOT_PATH: &str = "/";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Joins an archive entry name onto `/` and normalizes it into a snapshot key.
///
/// Rules:
/// - The result always starts with `/`
/// - `.` components and redundant separators are dropped
/// - `..` removes the previous component, and stops at the root instead of escaping it
/// - Trailing slashes are removed, except for the root itself
///
/// ## Examples
///
/// ```
/// use cbormanifest::utils::normalize_entry_path;
///
/// assert_eq!(normalize_entry_path("./etc/passwd"), "/etc/passwd");
/// assert_eq!(normalize_entry_path("usr/lib/"), "/usr/lib");
/// assert_eq!(normalize_entry_path("./"), "/");
/// ```
pub fn normalize_entry_path(name: &str) -> String {
    let path = Utf8UnixPathBuf::from(name);
    let mut normalized: Vec<&str> = Vec::new();
    let mut clamped = false;

    for component in path.components() {
        match component {
            Utf8UnixComponent::RootDir | Utf8UnixComponent::CurDir => continue,
            Utf8UnixComponent::ParentDir => {
                if normalized.pop().is_none() {
                    clamped = true;
                }
            }
            Utf8UnixComponent::Normal(c) => {
                if !c.is_empty() {
                    normalized.push(c);
                }
            }
        }
    }

    if clamped {
        tracing::warn!("entry name {name:?} traverses above the root, clamped at /");
    }

    format!("/{}", normalized.join("/"))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
