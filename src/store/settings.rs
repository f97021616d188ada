//! Global settings singleton.
//!
//! One configuration row for the whole deployment. The `is_default` column
//! carries a CHECK + UNIQUE guard so a second row cannot appear through any
//! code path; first read creates the row with company defaults.

use super::Store;
use crate::error::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_name: String,
    pub contact_email: String,
    pub whatsapp_number: String,
    pub address: String,
    pub gstin: String,
    pub website: String,
    pub facebook_url: String,
    pub instagram_url: String,
    pub twitter_url: String,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Explicit allow-list of updatable fields; anything else in a request body
/// never reaches the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpdate {
    pub company_name: Option<String>,
    pub contact_email: Option<String>,
    pub whatsapp_number: Option<String>,
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub website: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub twitter_url: Option<String>,
}

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<Setting> {
    Ok(Setting {
        id: row.get("id")?,
        company_name: row.get("company_name")?,
        contact_email: row.get("contact_email")?,
        whatsapp_number: row.get("whatsapp_number")?,
        address: row.get("address")?,
        gstin: row.get("gstin")?,
        website: row.get("website")?,
        facebook_url: row.get("facebook_url")?,
        instagram_url: row.get("instagram_url")?,
        twitter_url: row.get("twitter_url")?,
        is_default: row.get::<_, i64>("is_default")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SETTING_COLS: &str = "id, company_name, contact_email, whatsapp_number, address, gstin, website, \
     facebook_url, instagram_url, twitter_url, is_default, created_at, updated_at";

impl Store {
    pub fn get_or_create_settings(&self) -> AppResult<Setting> {
        if let Some(existing) = self
            .conn
            .query_row(
                &format!("SELECT {SETTING_COLS} FROM settings WHERE is_default = 1"),
                [],
                setting_from_row,
            )
            .optional()?
        {
            return Ok(existing);
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO settings (id, company_name, contact_email, whatsapp_number, address, gstin, website, is_default, created_at, updated_at) \
             VALUES (?1, 'GrowthServices Inc.', 'finance@growth.com', '+91 98765 43210', '123 Innovation Park, Sector 62, Noida', '09AAACG1234A1Z5', 'www.growthservices.com', 1, ?2, ?2)",
            params![id, now],
        )?;
        self.conn
            .query_row(
                &format!("SELECT {SETTING_COLS} FROM settings WHERE is_default = 1"),
                [],
                setting_from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::internal("store_error", "settings row not readable"))
    }

    /// Apply an update. Core fields keep their old value when the incoming one
    /// is absent or empty; social links overwrite whenever the key is present,
    /// so they can be cleared.
    pub fn update_settings(&self, update: &SettingUpdate) -> AppResult<Setting> {
        let current = self.get_or_create_settings()?;
        let keep = |incoming: &Option<String>, old: &str| -> String {
            match incoming.as_deref() {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => old.to_string(),
            }
        };
        let social = |incoming: &Option<String>, old: &str| -> String {
            incoming.clone().unwrap_or_else(|| old.to_string())
        };
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE settings SET company_name = ?1, contact_email = ?2, whatsapp_number = ?3, address = ?4, \
             gstin = ?5, website = ?6, facebook_url = ?7, instagram_url = ?8, twitter_url = ?9, updated_at = ?10 \
             WHERE is_default = 1",
            params![
                keep(&update.company_name, &current.company_name),
                keep(&update.contact_email, &current.contact_email),
                keep(&update.whatsapp_number, &current.whatsapp_number),
                keep(&update.address, &current.address),
                keep(&update.gstin, &current.gstin),
                keep(&update.website, &current.website),
                social(&update.facebook_url, &current.facebook_url),
                social(&update.instagram_url, &current.instagram_url),
                social(&update.twitter_url, &current.twitter_url),
                now
            ],
        )?;
        self.get_or_create_settings()
    }
}
