use std::path::Path;

use crate::catalog::{StatusCreate, StatusUpdate};
use crate::commands::read_payload;
use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Repo;

pub fn list(base: &Path, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_statuses(&repo.list_statuses()?, format)
}

pub fn show(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_status(&repo.show_status(id)?, format)
}

pub fn create(base: &Path, name: String, slug: String, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    let status = repo.create_status(&StatusCreate { name, slug })?;
    output::print_status(&status, format)
}

pub fn update(base: &Path, id: u64, data: &str, format: Format) -> Result<()> {
    let request: StatusUpdate = read_payload(data)?;
    let repo = Repo::open(base)?;
    output::print_status(&repo.update_status(id, &request)?, format)
}

pub fn delete(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_status(&repo.delete_status(id)?, format)
}
