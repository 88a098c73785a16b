use std::path::Path;

use crate::error::Result;
use crate::store::repo::Repo;

pub fn run(base: &Path) -> Result<()> {
    let repo = Repo::open(base)?;
    let count = repo.reindex()?;
    eprintln!("Reindexed {count} tasks");
    Ok(())
}
