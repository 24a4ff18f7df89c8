use std::fmt::{self, Display};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const S_ISUID: u32 = 0o4000; // set-user-id
const S_ISGID: u32 = 0o2000; // set-group-id
const S_ISVTX: u32 = 0o1000; // sticky

const S_IRUSR: u32 = 0o400;
const S_IWUSR: u32 = 0o200;
const S_IXUSR: u32 = 0o100;

const S_IRGRP: u32 = 0o040;
const S_IWGRP: u32 = 0o020;
const S_IXGRP: u32 = 0o010;

const S_IROTH: u32 = 0o004;
const S_IWOTH: u32 = 0o002;
const S_IXOTH: u32 = 0o001;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Read, write and execute flags for one class of user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rwx {
    /// Read permission.
    pub read: bool,

    /// Write permission.
    pub write: bool,

    /// Execute (or search, for directories) permission.
    pub execute: bool,
}

/// POSIX permission bits of an entry, decomposed into flags.
///
/// The file type bits of a raw mode are not part of this; the kind of an entry is carried by its
/// payload.
///
/// ## Examples
///
/// ```
/// use cbormanifest::record::Permissions;
///
/// let perms = Permissions::from_mode(0o4755);
/// assert!(perms.user.write);
/// assert!(!perms.group.write);
/// assert!(perms.other.execute);
/// assert!(perms.setuid);
/// assert_eq!(perms.to_mode(), 0o4755);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions {
    /// Owner permissions.
    pub user: Rwx,

    /// Group permissions.
    pub group: Rwx,

    /// Permissions for everyone else.
    pub other: Rwx,

    /// Set-user-id on execution.
    pub setuid: bool,

    /// Set-group-id on execution.
    pub setgid: bool,

    /// Restricted deletion flag.
    pub sticky: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Rwx {
    /// Creates flags from three booleans.
    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Self {
            read,
            write,
            execute,
        }
    }

    fn from_bits(mode: u32, r: u32, w: u32, x: u32) -> Self {
        Self::new(mode & r != 0, mode & w != 0, mode & x != 0)
    }

    fn to_bits(self, r: u32, w: u32, x: u32) -> u32 {
        (if self.read { r } else { 0 })
            | (if self.write { w } else { 0 })
            | (if self.execute { x } else { 0 })
    }
}

impl Permissions {
    /// Decomposes the permission bits of a raw mode. Bits above `0o7777` are ignored.
    pub fn from_mode(mode: u32) -> Self {
        Self {
            user: Rwx::from_bits(mode, S_IRUSR, S_IWUSR, S_IXUSR),
            group: Rwx::from_bits(mode, S_IRGRP, S_IWGRP, S_IXGRP),
            other: Rwx::from_bits(mode, S_IROTH, S_IWOTH, S_IXOTH),
            setuid: mode & S_ISUID != 0,
            setgid: mode & S_ISGID != 0,
            sticky: mode & S_ISVTX != 0,
        }
    }

    /// Recombines the flags into a raw mode.
    pub fn to_mode(&self) -> u32 {
        self.user.to_bits(S_IRUSR, S_IWUSR, S_IXUSR)
            | self.group.to_bits(S_IRGRP, S_IWGRP, S_IXGRP)
            | self.other.to_bits(S_IROTH, S_IWOTH, S_IXOTH)
            | (if self.setuid { S_ISUID } else { 0 })
            | (if self.setgid { S_ISGID } else { 0 })
            | (if self.sticky { S_ISVTX } else { 0 })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for Permissions {
    /// Formats the permissions the way `ls -l` does, e.g. `rwsr-xr-t`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = |rwx: Rwx, special: bool, set: char, unset: char| {
            let exec = match (rwx.execute, special) {
                (true, true) => set,
                (false, true) => unset,
                (true, false) => 'x',
                (false, false) => '-',
            };
            [
                if rwx.read { 'r' } else { '-' },
                if rwx.write { 'w' } else { '-' },
                exec,
            ]
        };

        let chars = class(self.user, self.setuid, 's', 'S')
            .into_iter()
            .chain(class(self.group, self.setgid, 's', 'S'))
            .chain(class(self.other, self.sticky, 't', 'T'));

        for c in chars {
            write!(f, "{c}")?;
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_from_mode() {
        let perms = Permissions::from_mode(0o100640);
        assert_eq!(perms.user, Rwx::new(true, true, false));
        assert_eq!(perms.group, Rwx::new(true, false, false));
        assert_eq!(perms.other, Rwx::default());
        assert!(!perms.setuid && !perms.setgid && !perms.sticky);
    }

    #[test]
    fn test_permissions_group_execute_is_its_own_bit() {
        let perms = Permissions::from_mode(0o010);
        assert!(perms.group.execute);
        assert!(!perms.user.execute);

        let perms = Permissions::from_mode(0o100);
        assert!(perms.user.execute);
        assert!(!perms.group.execute);
    }

    #[test]
    fn test_permissions_mode_roundtrip_every_bit() {
        for bit in 0..12 {
            let mode = 1 << bit;
            assert_eq!(Permissions::from_mode(mode).to_mode(), mode);
        }
        assert_eq!(Permissions::from_mode(0o7777).to_mode(), 0o7777);
        assert_eq!(Permissions::from_mode(0o170000).to_mode(), 0);
    }

    #[test]
    fn test_permissions_display() {
        assert_eq!(Permissions::from_mode(0o755).to_string(), "rwxr-xr-x");
        assert_eq!(Permissions::from_mode(0o4755).to_string(), "rwsr-xr-x");
        assert_eq!(Permissions::from_mode(0o2640).to_string(), "rw-r-S---");
        assert_eq!(Permissions::from_mode(0o1777).to_string(), "rwxrwxrwt");
        assert_eq!(Permissions::from_mode(0o1776).to_string(), "rwxrwxrwT");
    }
}
