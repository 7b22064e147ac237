use std::path::Path;

use fsdiff_common::Result;

use super::SYMLINK_MODE;
use crate::operation::{Operation, Reason, ReasonKind, Witness};

/// A symbolic link. The target is an opaque string and is never resolved
/// during comparison. There is no change operation for links; a changed
/// target is expressed as a remove/create pair by the diff engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symlink {
    target: String,
}

impl Symlink {
    pub fn new(target: &str) -> Self {
        Symlink {
            target: target.to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> u32 {
        SYMLINK_MODE
    }

    pub fn equal_with_reason(&self, other: &Symlink) -> Option<Reason> {
        if self.target != other.target {
            return Some(Reason::new(
                ReasonKind::ContentChanged,
                Witness::Text(self.target.clone()),
                Witness::Text(other.target.clone()),
            ));
        }
        None
    }

    pub fn create_operation(&self, relative_path: &str) -> Operation {
        Operation::create_link(relative_path, &self.target)
    }

    pub fn remove_operation(&self, relative_path: &str) -> Operation {
        Operation::remove_link(relative_path, &self.target)
    }

    #[cfg(unix)]
    pub fn write_to(&self, location: &Path) -> Result<()> {
        std::os::unix::fs::symlink(&self.target, location)?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn write_to(&self, location: &Path) -> Result<()> {
        Err(fsdiff_common::FsdiffError::UnsupportedEntry {
            path: location.display().to_string(),
            detail: "symlinks require a unix platform".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural_over_target() {
        let a = Symlink::new("dest");
        let b = Symlink::new("dest");
        let c = Symlink::new("elsewhere");
        assert!(a.equal_with_reason(&b).is_none());

        let reason = a.equal_with_reason(&c).unwrap();
        assert_eq!(reason.kind, ReasonKind::ContentChanged);
        assert_eq!(reason.before, Witness::Text("dest".to_string()));
    }

    #[test]
    fn mode_is_fixed() {
        assert_eq!(Symlink::new("x").mode(), 0o777);
    }
}
