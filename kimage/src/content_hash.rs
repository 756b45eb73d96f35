use std::{fmt, path::Path, str::FromStr};

use log::debug;

use crate::Result;

/// Appended to the tree hash when the working tree differs from the commit it was taken from.
pub const DIRTY_MARKER: &str = "dirty";

/// The ref that names the current checkout.
pub const CHECKOUT_TIP: &str = "HEAD";

/// Content address of a build directory: the tree hash, plus a dirty marker when the working tree
/// has changes that are not part of that tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    hex: String,
    dirty: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidContentHash(String);

impl std::error::Error for InvalidContentHash {}

impl fmt::Display for InvalidContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid content hash {:?}, expected lowercase hex digits",
            self.0
        )
    }
}

impl ContentHash {
    pub fn new(hex: &str, dirty: bool) -> Result<Self, InvalidContentHash> {
        let is_hex = !hex.is_empty()
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !is_hex {
            return Err(InvalidContentHash(hex.to_owned()));
        }
        Ok(Self {
            hex: hex.to_owned(),
            dirty,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)?;
        if self.dirty {
            write!(f, "-{DIRTY_MARKER}")?;
        }
        Ok(())
    }
}

impl FromStr for ContentHash {
    type Err = InvalidContentHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s
            .strip_suffix(DIRTY_MARKER)
            .and_then(|rest| rest.strip_suffix('-'))
        {
            Some(hex) => Self::new(hex, true),
            None => Self::new(s, false),
        }
    }
}

/// What we need from version control to address build directories by content.
pub trait Vcs {
    /// Hash of the tree at `path` as recorded in `commit_ref`.
    fn tree_hash(&self, path: &Path, commit_ref: &str) -> Result<String>;

    /// Full commit hash `commit_ref` resolves to.
    fn commit(&self, path: &Path, commit_ref: &str) -> Result<String>;

    /// Whether the working tree under `path` has untracked files or differs from `commit_ref`.
    fn is_dirty(&self, path: &Path, commit_ref: &str) -> Result<bool>;
}

/// Computes the content hash of `path` at `commit_ref`, defaulting to the checkout tip. Builds
/// always read the working tree, so it is compared against `commit_ref` whichever commit that is.
pub fn compute_content_hash(
    vcs: &dyn Vcs,
    path: &Path,
    commit_ref: Option<&str>,
) -> Result<ContentHash> {
    let commit_ref = commit_ref.unwrap_or(CHECKOUT_TIP);
    let tree = vcs.tree_hash(path, commit_ref)?;
    let dirty = vcs.is_dirty(path, commit_ref)?;
    debug!("content hash of {path:?} at {commit_ref}: tree {tree}, dirty: {dirty}");

    Ok(ContentHash::new(&tree, dirty)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    /// A repository with a fixed set of refs. `worktree` is the tree hash the working tree would
    /// have if it were committed.
    pub(crate) struct FakeVcs {
        pub trees: HashMap<&'static str, &'static str>,
        pub commits: HashMap<&'static str, &'static str>,
        pub worktree: &'static str,
    }

    impl Vcs for FakeVcs {
        fn tree_hash(&self, _path: &Path, commit_ref: &str) -> Result<String> {
            Ok(self
                .trees
                .get(commit_ref)
                .ok_or_else(|| format!("unknown ref {commit_ref}"))?
                .to_string())
        }

        fn commit(&self, _path: &Path, commit_ref: &str) -> Result<String> {
            Ok(self
                .commits
                .get(commit_ref)
                .ok_or_else(|| format!("unknown ref {commit_ref}"))?
                .to_string())
        }

        fn is_dirty(&self, path: &Path, commit_ref: &str) -> Result<bool> {
            Ok(self.tree_hash(path, commit_ref)? != self.worktree)
        }
    }

    /// `HEAD` and `main` share a tree, `v1` is an older commit.
    pub(crate) fn fake(dirty: bool) -> FakeVcs {
        FakeVcs {
            trees: [("HEAD", "abc123"), ("main", "abc123"), ("v1", "0ff1ce")]
                .into_iter()
                .collect(),
            commits: [("HEAD", "c0ffee"), ("main", "c0ffee"), ("v1", "decade")]
                .into_iter()
                .collect(),
            worktree: if dirty { "fee1de" } else { "abc123" },
        }
    }

    #[test]
    fn clean_checkout() {
        let hash = compute_content_hash(&fake(false), Path::new("."), None).unwrap();
        assert_eq!(hash.to_string(), "abc123");
        assert!(!hash.is_dirty());
    }

    #[test]
    fn dirty_checkout_gets_marker() {
        let hash = compute_content_hash(&fake(true), Path::new("."), None).unwrap();
        assert_eq!(hash.to_string(), "abc123-dirty");
        assert!(hash.is_dirty());
    }

    #[test]
    fn ref_naming_the_tip_checks_working_tree() {
        let hash = compute_content_hash(&fake(true), Path::new("."), Some("main")).unwrap();
        assert!(hash.is_dirty());
    }

    #[test]
    fn other_ref_is_compared_against_working_tree() {
        let hash = compute_content_hash(&fake(false), Path::new("."), Some("v1")).unwrap();
        assert_eq!(hash.to_string(), "0ff1ce-dirty");

        let hash = compute_content_hash(&fake(true), Path::new("."), Some("v1")).unwrap();
        assert!(hash.is_dirty());
    }

    #[test]
    fn other_ref_matching_working_tree_is_clean() {
        let vcs = FakeVcs {
            worktree: "0ff1ce",
            ..fake(false)
        };
        let hash = compute_content_hash(&vcs, Path::new("."), Some("v1")).unwrap();
        assert_eq!(hash.to_string(), "0ff1ce");
        assert!(compute_content_hash(&vcs, Path::new("."), None)
            .unwrap()
            .is_dirty());
    }

    #[test]
    fn parses_and_validates() {
        assert_eq!(
            "abc123-dirty".parse::<ContentHash>().unwrap(),
            ContentHash::new("abc123", true).unwrap()
        );
        assert_eq!(
            "def456".parse::<ContentHash>().unwrap(),
            ContentHash::new("def456", false).unwrap()
        );
        assert!("ABC123".parse::<ContentHash>().is_err());
        assert!("".parse::<ContentHash>().is_err());
        assert!("-dirty".parse::<ContentHash>().is_err());
    }
}
