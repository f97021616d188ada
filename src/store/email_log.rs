//! Audit log of invoice emails, newest first.

use super::Store;
use crate::error::AppResult;
use chrono::Utc;
use rusqlite::{params, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    #[serde(rename = "_id")]
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    pub invoice_number: String,
    pub project_id: String,
    pub sent_by: String,
    pub status: String,
    pub sent_at: String,
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<EmailLog> {
    Ok(EmailLog {
        id: row.get("id")?,
        client_name: row.get("client_name")?,
        client_email: row.get("client_email")?,
        invoice_number: row.get("invoice_number")?,
        project_id: row.get("project_id")?,
        sent_by: row.get("sent_by")?,
        status: row.get("status")?,
        sent_at: row.get("sent_at")?,
    })
}

impl Store {
    pub fn log_email(
        &self,
        client_name: &str,
        client_email: &str,
        invoice_number: &str,
        project_id: &str,
        sent_by: &str,
        status: &str,
    ) -> AppResult<EmailLog> {
        let id = Uuid::new_v4().to_string();
        let sent_at = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO email_log (id, client_name, client_email, invoice_number, project_id, sent_by, status, sent_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, client_name, client_email, invoice_number, project_id, sent_by, status, sent_at],
        )?;
        Ok(EmailLog {
            id,
            client_name: client_name.to_string(),
            client_email: client_email.to_string(),
            invoice_number: invoice_number.to_string(),
            project_id: project_id.to_string(),
            sent_by: sent_by.to_string(),
            status: status.to_string(),
            sent_at,
        })
    }

    pub fn list_email_logs(&self) -> AppResult<Vec<EmailLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_name, client_email, invoice_number, project_id, sent_by, status, sent_at \
             FROM email_log ORDER BY sent_at DESC",
        )?;
        let logs = stmt
            .query_map([], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }
}
