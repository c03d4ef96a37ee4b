/// git-branch-keeper - find merged and stale branches and delete them safely
///
/// Installed as `git-branch-keeper`, so it also runs as `git branch-keeper`.
use anyhow::Result;

fn main() -> Result<()> {
    let code = branch_keeper::commands::run()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
