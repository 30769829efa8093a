use anyhow::Result;
use std::path::{Path, PathBuf};

/// Resolve the default project directory for a new session: an explicit
/// `--dir` wins, otherwise walk up from the current directory looking for
/// a `.git` root, falling back to the current directory itself.
pub fn resolve_project_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p);
    }

    let cwd = std::env::current_dir()?;
    Ok(find_git_root(&cwd).unwrap_or(cwd))
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut cur = Some(start);
    while let Some(dir) = cur {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        cur = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let explicit = PathBuf::from("/tmp/some/project");
        assert_eq!(resolve_project_dir(Some(explicit.clone())).unwrap(), explicit);
    }
}
