use std::path::Path;

use crate::commands::read_payload;
use crate::error::Result;
use crate::filter::TaskFilter;
use crate::output::{self, Format};
use crate::store::repo::Repo;
use crate::update::{TaskCreate, TaskUpdate};

pub fn list(base: &Path, filter: TaskFilter, page: u32, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    let page = repo.list_tasks(&filter, page)?;
    output::print_task_page(&page, format)
}

pub fn show(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    output::print_task(&repo.show_task(id)?, format)
}

pub fn create(base: &Path, request: TaskCreate, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    let task = repo.create_task(&request)?;
    output::print_task(&task, format)
}

pub fn update(base: &Path, id: u64, data: &str, format: Format) -> Result<()> {
    let request: TaskUpdate = read_payload(data)?;
    let repo = Repo::open(base)?;
    let task = repo.update_task(id, &request)?;
    output::print_task(&task, format)
}

pub fn delete(base: &Path, id: u64, format: Format) -> Result<()> {
    let repo = Repo::open(base)?;
    let task = repo.delete_task(id)?;
    output::print_task(&task, format)
}
