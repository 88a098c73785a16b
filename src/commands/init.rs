use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::store::repo::Repo;

pub fn run(base: &Path) -> Result<()> {
    Repo::init(base, Config::default())?;
    eprintln!("Initialized .taskboard/ in {}", base.display());
    Ok(())
}
