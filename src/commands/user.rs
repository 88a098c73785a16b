use std::path::Path;

use crate::catalog::{UserCreate, UserUpdate};
use crate::commands::read_payload;
use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Repo;

pub fn list(base: &Path, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_users(&repo.list_users()?, format)
}

pub fn show(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_user(&repo.show_user(id)?, format)
}

pub fn create(base: &Path, request: UserCreate, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_user(&repo.create_user(&request)?, format)
}

pub fn update(base: &Path, id: u64, data: &str, format: Format) -> Result<()> {
    let request: UserUpdate = read_payload(data)?;
    let repo = Repo::open(base)?;
    output::print_user(&repo.update_user(id, &request)?, format)
}

pub fn delete(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_user(&repo.delete_user(id)?, format)
}

pub fn login(base: &Path, email: &str, password: &str, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_user(&repo.authenticate(email, password)?, format)
}
