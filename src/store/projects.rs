//! Project records.
//!
//! Updates arrive as a JSON object that has already been through the policy
//! projection; this module applies whichever whitelisted keys survived and
//! ignores everything else.

use super::Store;
use crate::error::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub const PROJECT_STATUSES: &[&str] = &["Pending", "Running", "Completed", "Active"];
const PRIORITIES: &[&str] = &["High", "Medium", "Low"];
const PROJECT_TYPES: &[&str] = &["Web Development", "Mobile App", "Security Audit", "UI/UX Design", "Other"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub client: String,
    pub client_email: String,
    pub description: String,
    pub deadline: String,
    pub budget: f64,
    pub status: String,
    pub assigned_to: Option<String>,
    pub priority: String,
    pub tech_stack: String,
    pub project_type: String,
    pub docs_link: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub client: String,
    pub client_email: String,
    pub description: String,
    pub deadline: String,
    pub budget: f64,
    pub status: String,
    pub assigned_to: Option<String>,
    pub priority: String,
    pub tech_stack: String,
    pub project_type: String,
    pub docs_link: String,
    pub created_by: String,
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        client: row.get("client")?,
        client_email: row.get("client_email")?,
        description: row.get("description")?,
        deadline: row.get("deadline")?,
        budget: row.get("budget")?,
        status: row.get("status")?,
        assigned_to: row.get("assigned_to")?,
        priority: row.get("priority")?,
        tech_stack: row.get("tech_stack")?,
        project_type: row.get("project_type")?,
        docs_link: row.get("docs_link")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const PROJECT_COLS: &str = "id, name, client, client_email, description, deadline, budget, status, \
     assigned_to, priority, tech_stack, project_type, docs_link, created_by, created_at, updated_at";

fn check_enum(field: &str, value: &str, allowed: &[&str]) -> AppResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AppError::validation(
            "invalid_value".to_string(),
            format!("{field} must be one of: {}", allowed.join(", ")),
        ))
    }
}

impl Store {
    pub fn create_project(&self, new: NewProject) -> AppResult<Project> {
        check_enum("status", &new.status, PROJECT_STATUSES)?;
        check_enum("priority", &new.priority, PRIORITIES)?;
        check_enum("projectType", &new.project_type, PROJECT_TYPES)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO projects (id, name, client, client_email, description, deadline, budget, status, \
             assigned_to, priority, tech_stack, project_type, docs_link, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            params![
                id, new.name, new.client, new.client_email, new.description, new.deadline, new.budget,
                new.status, new.assigned_to, new.priority, new.tech_stack, new.project_type,
                new.docs_link, new.created_by, now
            ],
        )?;
        self.find_project(&id)?
            .ok_or_else(|| AppError::internal("store_error", "created project not readable"))
    }

    pub fn find_project(&self, id: &str) -> AppResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLS} FROM projects WHERE id = ?1"),
                [id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self) -> AppResult<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PROJECT_COLS} FROM projects ORDER BY created_at"))?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    /// Ownership is strict id equality against `assigned_to`; an unassigned
    /// project belongs to nobody's list.
    pub fn list_projects_assigned_to(&self, user_id: &str) -> AppResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLS} FROM projects WHERE assigned_to = ?1 ORDER BY created_at"
        ))?;
        let projects = stmt
            .query_map([user_id], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    /// Apply a (policy-projected) update payload. Unknown keys are ignored, a
    /// null `assignedTo` clears the assignment, and enum-valued fields are
    /// validated before anything is written.
    pub fn update_project(&self, id: &str, payload: &Map<String, Value>) -> AppResult<Project> {
        if self.find_project(id)?.is_none() {
            return Err(AppError::not_found("project_not_found", "Project not found"));
        }
        let mut sets: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        fn push_str(sets: &mut Vec<String>, args: &mut Vec<Box<dyn rusqlite::ToSql>>, col: &str, v: &Value) {
            if let Some(s) = v.as_str() {
                sets.push(format!("{col} = ?{}", args.len() + 1));
                args.push(Box::new(s.to_string()));
            }
        }

        for (key, value) in payload.iter() {
            match key.as_str() {
                "name" => push_str(&mut sets, &mut args, "name", value),
                "client" => push_str(&mut sets, &mut args, "client", value),
                "clientEmail" => push_str(&mut sets, &mut args, "client_email", value),
                "description" => push_str(&mut sets, &mut args, "description", value),
                "deadline" => push_str(&mut sets, &mut args, "deadline", value),
                "docsLink" => push_str(&mut sets, &mut args, "docs_link", value),
                "techStack" => push_str(&mut sets, &mut args, "tech_stack", value),
                "status" => {
                    if let Some(s) = value.as_str() {
                        check_enum("status", s, PROJECT_STATUSES)?;
                        push_str(&mut sets, &mut args, "status", value);
                    }
                }
                "priority" => {
                    if let Some(s) = value.as_str() {
                        check_enum("priority", s, PRIORITIES)?;
                        push_str(&mut sets, &mut args, "priority", value);
                    }
                }
                "projectType" => {
                    if let Some(s) = value.as_str() {
                        check_enum("projectType", s, PROJECT_TYPES)?;
                        push_str(&mut sets, &mut args, "project_type", value);
                    }
                }
                "budget" => {
                    if let Some(n) = value.as_f64() {
                        sets.push(format!("budget = ?{}", args.len() + 1));
                        args.push(Box::new(n));
                    }
                }
                "assignedTo" => {
                    let v: Option<String> = value.as_str().map(|s| s.to_string());
                    sets.push(format!("assigned_to = ?{}", args.len() + 1));
                    args.push(Box::new(v));
                }
                _ => {}
            }
        }

        if !sets.is_empty() {
            sets.push(format!("updated_at = ?{}", args.len() + 1));
            args.push(Box::new(Utc::now().to_rfc3339()));
            let sql = format!(
                "UPDATE projects SET {} WHERE id = ?{}",
                sets.join(", "),
                args.len() + 1
            );
            args.push(Box::new(id.to_string()));
            let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            self.conn.execute(&sql, params.as_slice())?;
        }

        self.find_project(id)?
            .ok_or_else(|| AppError::not_found("project_not_found", "Project not found"))
    }

    pub fn delete_project(&self, id: &str) -> AppResult<()> {
        let changed = self.conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(AppError::not_found("project_not_found", "Project not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(created_by: &str) -> NewProject {
        NewProject {
            name: "Site rebuild".into(),
            client: "Acme".into(),
            client_email: "acme@client.com".into(),
            description: String::new(),
            deadline: "2026-12-31".into(),
            budget: 5000.0,
            status: "Pending".into(),
            assigned_to: None,
            priority: "Medium".into(),
            tech_stack: String::new(),
            project_type: "Web Development".into(),
            docs_link: String::new(),
            created_by: created_by.into(),
        }
    }

    #[test]
    fn update_applies_known_keys_and_ignores_unknown() {
        let s = Store::in_memory().unwrap();
        let p = s.create_project(sample("admin1")).unwrap();
        let payload = json!({"status": "Running", "budget": 999.0, "nonsense": "x"});
        let updated = s.update_project(&p.id, payload.as_object().unwrap()).unwrap();
        assert_eq!(updated.status, "Running");
        assert_eq!(updated.budget, 999.0);
        assert_eq!(updated.name, "Site rebuild");
    }

    #[test]
    fn update_rejects_invalid_status() {
        let s = Store::in_memory().unwrap();
        let p = s.create_project(sample("admin1")).unwrap();
        let payload = json!({"status": "Paused"});
        let err = s.update_project(&p.id, payload.as_object().unwrap()).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn null_assignment_clears_assignee() {
        let s = Store::in_memory().unwrap();
        let mut new = sample("admin1");
        new.assigned_to = Some("emp1".into());
        let p = s.create_project(new).unwrap();
        let payload = json!({"assignedTo": null});
        let updated = s.update_project(&p.id, payload.as_object().unwrap()).unwrap();
        assert_eq!(updated.assigned_to, None);
    }

    #[test]
    fn assigned_listing_excludes_unassigned_projects() {
        let s = Store::in_memory().unwrap();
        s.create_project(sample("admin1")).unwrap();
        let mut mine = sample("admin1");
        mine.assigned_to = Some("emp1".into());
        s.create_project(mine).unwrap();
        assert_eq!(s.list_projects().unwrap().len(), 2);
        assert_eq!(s.list_projects_assigned_to("emp1").unwrap().len(), 1);
        assert_eq!(s.list_projects_assigned_to("emp2").unwrap().len(), 0);
    }
}
