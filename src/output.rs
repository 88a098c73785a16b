use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::filter::TaskPage;
use crate::model::{Label, Task, TaskStatus, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn label_list(task: &Task) -> String {
    task.labels
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn task_line(task: &Task) -> String {
    let assignee = task
        .assignee
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{:>4} {:20} {:12} {:>8} {}",
        task.id,
        truncate_title(&task.name, 20),
        task.status,
        assignee,
        label_list(task)
    )
}

fn task_header() -> String {
    format!(
        "{:>4} {:20} {:12} {:>8} LABELS\n{}",
        "ID",
        "TITLE",
        "STATUS",
        "ASSIGNEE",
        "-".repeat(56)
    )
}

pub fn print_task(task: &Task, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(task)?),
        Format::Pretty => {
            println!("[{}] {} ({})", task.id, task.name.bold(), task.status.cyan());
            if let Some(ref desc) = task.description {
                println!("  {desc}");
            }
            if let Some(index) = task.index {
                println!("  index: {index}");
            }
            if let Some(assignee) = task.assignee {
                println!("  assignee: {assignee}");
            }
            if !task.labels.is_empty() {
                println!("  labels: {}", label_list(task));
            }
            println!("  created: {}", task.created_at.format("%Y-%m-%d"));
        }
        Format::Minimal => println!("{}", task_line(task)),
    }
    Ok(())
}

pub fn print_task_page(page: &TaskPage, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(page)?),
        Format::Pretty => {
            for task in &page.tasks {
                print_task(task, Format::Pretty)?;
                println!();
            }
            println!(
                "{}",
                format!(
                    "page {} ({} of {} task(s))",
                    page.page,
                    page.tasks.len(),
                    page.total
                )
                .dimmed()
            );
        }
        Format::Minimal => {
            println!("{}", task_header());
            for task in &page.tasks {
                println!("{}", task_line(task));
            }
        }
    }
    Ok(())
}

pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let truncated: String = title.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    }
}

pub fn print_statuses(statuses: &[TaskStatus], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(statuses)?),
        Format::Pretty | Format::Minimal => {
            for status in statuses {
                println!("{:>4} {:20} {}", status.id, status.name, status.slug.cyan());
            }
        }
    }
    Ok(())
}

pub fn print_status(status: &TaskStatus, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(status)?),
        _ => print_statuses(std::slice::from_ref(status), format)?,
    }
    Ok(())
}

pub fn print_labels(labels: &[Label], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(labels)?),
        Format::Pretty | Format::Minimal => {
            for label in labels {
                println!("{:>4} {}", label.id, label.name);
            }
        }
    }
    Ok(())
}

pub fn print_label(label: &Label, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(label)?),
        _ => print_labels(std::slice::from_ref(label), format)?,
    }
    Ok(())
}

pub fn print_users(users: &[User], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let views: Vec<_> = users.iter().map(User::view).collect();
            println!("{}", serde_json::to_string(&views)?);
        }
        Format::Pretty | Format::Minimal => {
            for user in users {
                let name = [user.first_name.as_deref(), user.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{:>4} {:30} {}", user.id, user.email, name);
            }
        }
    }
    Ok(())
}

pub fn print_user(user: &User, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(&user.view())?),
        _ => print_users(std::slice::from_ref(user), format)?,
    }
    Ok(())
}
