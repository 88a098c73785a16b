use std::path::Path;

use crate::catalog::{LabelCreate, LabelUpdate};
use crate::commands::read_payload;
use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Repo;

pub fn list(base: &Path, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_labels(&repo.list_labels()?, format)
}

pub fn show(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_label(&repo.show_label(id)?, format)
}

pub fn create(base: &Path, name: String, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_label(&repo.create_label(&LabelCreate { name })?, format)
}

pub fn update(base: &Path, id: u64, data: &str, format: Format) -> Result<()> {
    let request: LabelUpdate = read_payload(data)?;
    let repo = Repo::open(base)?;
    output::print_label(&repo.update_label(id, &request)?, format)
}

pub fn delete(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_label(&repo.delete_label(id)?, format)
}
