use std::path::Path;

use log::debug;

use crate::{content_hash::Vcs, process, Result};

/// [`Vcs`] backed by the `git` command line.
pub struct Git;

impl Git {
    fn git(dir: &Path) -> process::Command {
        process::command!("git", "-C", dir)
    }
}

impl Vcs for Git {
    fn tree_hash(&self, path: &Path, commit_ref: &str) -> Result<String> {
        // `<rev>:./` resolves the tree relative to the current directory of git, which `-C` sets.
        let output = process::args!(
            Self::git(path),
            "rev-parse",
            "--verify",
            format!("{commit_ref}:./")
        )
        .output()?;
        let hash = output.stdout_trimmed()?.to_owned();
        debug!("git tree hash of {path:?} at {commit_ref}: {hash}");
        Ok(hash)
    }

    fn commit(&self, path: &Path, commit_ref: &str) -> Result<String> {
        let output = process::args!(
            Self::git(path),
            "rev-parse",
            "--verify",
            format!("{commit_ref}^{{commit}}")
        )
        .output()?;
        Ok(output.stdout_trimmed()?.to_owned())
    }

    /// Returns true if files under `path` differ from `commit_ref` or are untracked.
    fn is_dirty(&self, path: &Path, commit_ref: &str) -> Result<bool> {
        // `--quiet` exits with 1 when there are differences.
        let diff = process::args!(Self::git(path), "diff", "--quiet", commit_ref, "--", ".")
            .try_output()?;
        let modified = match diff.status.code() {
            Some(1) => true,
            _ => {
                diff.require_success()?;
                false
            }
        };

        let untracked = process::args!(
            Self::git(path),
            "ls-files",
            "--others",
            "--exclude-standard",
            "--",
            "."
        )
        .output()?;
        let untracked = !untracked.stdout_trimmed()?.is_empty();

        debug!("git under {path:?} against {commit_ref}: modified {modified}, untracked {untracked}");
        Ok(modified || untracked)
    }
}
