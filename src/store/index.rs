use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::Result;
use crate::filter::{PageRequest, Predicate, fold_case};
use crate::model::{Label, Reference, Task, TaskStatus, User};
use crate::update::BackrefDelta;

/// Derived SQLite index over the record files: unique-key lookups, filtered
/// listing, and the task back-reference tables.
pub struct Index {
    conn: Connection,
}

impl Index {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let idx = Self { conn };
        idx.prepare()?;
        Ok(idx)
    }

    pub fn open_memory() -> Result<Self> {
        let idx = Self {
            conn: Connection::open_in_memory()?,
        };
        idx.prepare()?;
        Ok(idx)
    }

    fn prepare(&self) -> Result<()> {
        // Title matching must fold exactly like `Predicate::matches`, which
        // SQLite's ASCII-only lower() does not.
        self.conn.create_scalar_function(
            "fold_case",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: String = ctx.get(0)?;
                Ok(fold_case(&text))
            },
        )?;
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                idx INTEGER,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                assignee_id INTEGER
            );
            CREATE TABLE IF NOT EXISTS task_labels (
                task_id INTEGER NOT NULL,
                label_id INTEGER NOT NULL,
                PRIMARY KEY (task_id, label_id)
            );
            CREATE TABLE IF NOT EXISTS statuses (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS labels (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
            CREATE INDEX IF NOT EXISTS idx_task_labels_label ON task_labels(label_id);
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn rebuild(
        &self,
        tasks: &[Task],
        statuses: &[TaskStatus],
        labels: &[Label],
        users: &[User],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM task_labels; DELETE FROM tasks; DELETE FROM statuses;
             DELETE FROM labels; DELETE FROM users;",
        )?;
        for status in statuses {
            tx.execute(
                "INSERT INTO statuses (id, name, slug) VALUES (?1, ?2, ?3)",
                params![status.id, status.name, status.slug],
            )?;
        }
        for label in labels {
            tx.execute(
                "INSERT INTO labels (id, name) VALUES (?1, ?2)",
                params![label.id, label.name],
            )?;
        }
        for user in users {
            tx.execute(
                "INSERT INTO users (id, email) VALUES (?1, ?2)",
                params![user.id, user.email],
            )?;
        }
        for task in tasks {
            Self::write_task_row(&tx, task)?;
            for label in &task.labels {
                tx.execute(
                    "INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?1, ?2)",
                    params![task.id, label],
                )?;
            }
        }
        tx.commit()?;
        tracing::info!(
            tasks = tasks.len(),
            statuses = statuses.len(),
            labels = labels.len(),
            users = users.len(),
            "index rebuilt"
        );
        Ok(())
    }

    fn write_task_row(conn: &Connection, task: &Task) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, idx, name, status, assignee_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![task.id, task.index, task.name, task.status, task.assignee],
        )?;
        Ok(())
    }

    /// Write a task row and move its label edges by `delta`, atomically.
    /// Status and assignee edges live on the row itself.
    pub fn upsert_task(&self, task: &Task, delta: &BackrefDelta) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_task_row(&tx, task)?;
        for reference in &delta.removed {
            if let Reference::Label(label) = reference {
                tx.execute(
                    "DELETE FROM task_labels WHERE task_id = ?1 AND label_id = ?2",
                    params![task.id, label],
                )?;
            }
        }
        for reference in &delta.added {
            if let Reference::Label(label) = reference {
                tx.execute(
                    "INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?1, ?2)",
                    params![task.id, label],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn remove_task(&self, id: u64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM task_labels WHERE task_id = ?1", params![id])?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_status(&self, status: &TaskStatus) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO statuses (id, name, slug) VALUES (?1, ?2, ?3)",
            params![status.id, status.name, status.slug],
        )?;
        Ok(())
    }

    pub fn upsert_label(&self, label: &Label) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO labels (id, name) VALUES (?1, ?2)",
            params![label.id, label.name],
        )?;
        Ok(())
    }

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO users (id, email) VALUES (?1, ?2)",
            params![user.id, user.email],
        )?;
        Ok(())
    }

    pub fn remove_status(&self, id: u64) -> Result<()> {
        self.conn
            .execute("DELETE FROM statuses WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn remove_label(&self, id: u64) -> Result<()> {
        self.conn
            .execute("DELETE FROM labels WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn remove_user(&self, id: u64) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn lookup_id(&self, sql: &str, key: &str) -> Result<Option<u64>> {
        Ok(self
            .conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?)
    }

    pub fn status_id_by_slug(&self, slug: &str) -> Result<Option<u64>> {
        self.lookup_id("SELECT id FROM statuses WHERE slug = ?1", slug)
    }

    pub fn status_id_by_name(&self, name: &str) -> Result<Option<u64>> {
        self.lookup_id("SELECT id FROM statuses WHERE name = ?1", name)
    }

    pub fn label_id_by_name(&self, name: &str) -> Result<Option<u64>> {
        self.lookup_id("SELECT id FROM labels WHERE name = ?1", name)
    }

    pub fn user_id_by_email(&self, email: &str) -> Result<Option<u64>> {
        self.lookup_id("SELECT id FROM users WHERE email = ?1", email)
    }

    /// Count of matching tasks and the ids on the requested page.
    pub fn query(&self, predicate: &Predicate, page: PageRequest) -> Result<(u64, Vec<u64>)> {
        let mut values = Vec::new();
        let clause = compile(predicate, &mut values);

        let total: u64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tasks t WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(i64::from(page.size())));
        values.push(Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT t.id FROM tasks t WHERE {clause} ORDER BY t.id LIMIT ? OFFSET ?"
        ))?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<std::result::Result<Vec<u64>, _>>()?;
        Ok((total, ids))
    }

    pub fn referencing_tasks(&self, reference: &Reference) -> Result<Vec<u64>> {
        let (sql, key) = match reference {
            Reference::Status(slug) => (
                "SELECT id FROM tasks WHERE status = ?1 ORDER BY id",
                Value::Text(slug.clone()),
            ),
            Reference::Assignee(user) => (
                "SELECT id FROM tasks WHERE assignee_id = ?1 ORDER BY id",
                Value::Integer(sql_int(*user)),
            ),
            Reference::Label(label) => (
                "SELECT task_id FROM task_labels WHERE label_id = ?1 ORDER BY task_id",
                Value::Integer(sql_int(*label)),
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<std::result::Result<Vec<u64>, _>>()?;
        Ok(ids)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn get_fingerprint(&self) -> Result<Option<String>> {
        self.get_metadata("fingerprint")
    }

    pub fn set_fingerprint(&self, fingerprint: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('fingerprint', ?1)",
            params![fingerprint],
        )?;
        Ok(())
    }
}

fn sql_int(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

/// Compile a predicate into a `WHERE` clause over `tasks t`, pushing bound
/// values in placeholder order.
fn compile(predicate: &Predicate, values: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::All => "1".to_string(),
        Predicate::AssigneeIs(id) => {
            values.push(Value::Integer(sql_int(*id)));
            "t.assignee_id = ?".to_string()
        }
        Predicate::TitleContains(needle) => {
            values.push(Value::Text(needle.clone()));
            "instr(fold_case(t.name), ?) > 0".to_string()
        }
        Predicate::StatusIs(slug) => {
            values.push(Value::Text(slug.clone()));
            "t.status = ?".to_string()
        }
        Predicate::HasLabel(id) => {
            values.push(Value::Integer(sql_int(*id)));
            "EXISTS (SELECT 1 FROM task_labels tl WHERE tl.task_id = t.id AND tl.label_id = ?)"
                .to_string()
        }
        Predicate::And(terms) => {
            let parts: Vec<String> = terms.iter().map(|term| compile(term, values)).collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::filter::TaskFilter;

    fn task(id: u64, name: &str, status: &str, labels: &[u64], assignee: Option<u64>) -> Task {
        Task {
            id,
            index: None,
            name: name.into(),
            description: None,
            status: status.into(),
            assignee,
            labels: labels.iter().copied().collect::<BTreeSet<_>>(),
            created_at: Utc::now(),
        }
    }

    fn seeded() -> Index {
        let idx = Index::open_memory().unwrap();
        let tasks = vec![
            task(1, "A", "draft", &[1], Some(1)),
            task(2, "B", "to_be_fixed", &[1, 2], None),
            task(3, "C", "draft", &[], Some(1)),
        ];
        idx.rebuild(&tasks, &[], &[], &[]).unwrap();
        idx
    }

    fn ids(idx: &Index, filter: TaskFilter) -> Vec<u64> {
        idx.query(&filter.build(), PageRequest::new(1, 10).unwrap())
            .unwrap()
            .1
    }

    #[test]
    fn compiled_filters_match_in_memory_semantics() {
        let idx = seeded();
        assert_eq!(ids(&idx, TaskFilter::default()), vec![1, 2, 3]);
        assert_eq!(
            ids(
                &idx,
                TaskFilter {
                    status: Some("draft".into()),
                    ..Default::default()
                }
            ),
            vec![1, 3]
        );
        assert_eq!(
            ids(
                &idx,
                TaskFilter {
                    label_id: Some(1),
                    ..Default::default()
                }
            ),
            vec![1, 2]
        );
        assert_eq!(
            ids(
                &idx,
                TaskFilter {
                    status: Some("draft".into()),
                    label_id: Some(1),
                    ..Default::default()
                }
            ),
            vec![1]
        );
        assert_eq!(
            ids(
                &idx,
                TaskFilter {
                    assignee_id: Some(1),
                    ..Default::default()
                }
            ),
            vec![1, 3]
        );
    }

    #[test]
    fn title_filter_folds_unicode_case() {
        let idx = Index::open_memory().unwrap();
        idx.rebuild(
            &[
                task(1, "newCreateTask", "draft", &[], None),
                task(2, "ÜBERSICHT", "draft", &[], None),
            ],
            &[],
            &[],
            &[],
        )
        .unwrap();
        let by_title = |needle: &str| {
            ids(
                &idx,
                TaskFilter {
                    title_cont: Some(needle.into()),
                    ..Default::default()
                },
            )
        };
        assert_eq!(by_title("Create"), vec![1]);
        assert_eq!(by_title("übersicht"), vec![2]);
        assert!(by_title("delete").is_empty());
    }

    #[test]
    fn pagination_counts_all_matches() {
        let idx = seeded();
        let (total, page) = idx
            .query(&Predicate::All, PageRequest::new(2, 2).unwrap())
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page, vec![3]);
    }

    #[test]
    fn label_edges_follow_delta() {
        let idx = seeded();
        let before = task(2, "B", "to_be_fixed", &[1, 2], None);
        let after = task(2, "B", "draft", &[2, 3], Some(4));
        let delta = BackrefDelta::between(Some(&before), Some(&after));
        idx.upsert_task(&after, &delta).unwrap();

        assert_eq!(idx.referencing_tasks(&Reference::Label(1)).unwrap(), vec![1]);
        assert_eq!(idx.referencing_tasks(&Reference::Label(3)).unwrap(), vec![2]);
        assert_eq!(
            idx.referencing_tasks(&Reference::Status("draft".into()))
                .unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(idx.referencing_tasks(&Reference::Assignee(4)).unwrap(), vec![2]);
    }

    #[test]
    fn removing_task_clears_its_edges() {
        let idx = seeded();
        idx.remove_task(2).unwrap();
        assert!(idx.referencing_tasks(&Reference::Label(2)).unwrap().is_empty());
        assert_eq!(
            idx.referencing_tasks(&Reference::Status("to_be_fixed".into()))
                .unwrap(),
            Vec::<u64>::new()
        );
    }

    #[test]
    fn unique_key_lookups() {
        let idx = Index::open_memory().unwrap();
        let now = Utc::now();
        idx.upsert_status(&TaskStatus {
            id: 4,
            name: "Draft".into(),
            slug: "draft".into(),
            created_at: now,
        })
        .unwrap();
        idx.upsert_label(&Label {
            id: 2,
            name: "bug".into(),
            created_at: now,
        })
        .unwrap();
        assert_eq!(idx.status_id_by_slug("draft").unwrap(), Some(4));
        assert_eq!(idx.status_id_by_name("Draft").unwrap(), Some(4));
        assert_eq!(idx.label_id_by_name("bug").unwrap(), Some(2));
        assert_eq!(idx.user_id_by_email("x@example.com").unwrap(), None);

        idx.remove_status(4).unwrap();
        assert_eq!(idx.status_id_by_slug("draft").unwrap(), None);
    }

    #[test]
    fn fingerprint_round_trip() {
        let idx = Index::open_memory().unwrap();
        assert_eq!(idx.get_fingerprint().unwrap(), None);
        idx.set_fingerprint("abc").unwrap();
        assert_eq!(idx.get_fingerprint().unwrap().as_deref(), Some("abc"));
    }
}
