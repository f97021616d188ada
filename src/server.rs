//!
//! agencyd HTTP server
//! -------------------
//! Axum-based JSON API for projects, accounts, invoice emailing and global
//! settings.
//!
//! Responsibilities:
//! - Bearer-token authentication on every protected route (signature, expiry,
//!   identity and session-version checks, in that order).
//! - Policy gating per action: admin-only resources, ownership-scoped project
//!   access, field-restricted employee updates.
//! - Translation of `AppError` into status codes without leaking internals.
//!

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{self, Action, Decision, TokenSigner};
use crate::mailer::{self, Attachment, EmailMessage, SharedMailer, TracingMailer};
use crate::security;
use crate::store::{NewProject, NewUser, Role, SettingUpdate, SharedStore, User};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub signer: Arc<TokenSigner>,
    pub mailer: SharedMailer,
}

impl AppState {
    pub fn new(store: SharedStore, signer: TokenSigner, mailer: SharedMailer) -> Self {
        Self { store, signer: Arc::new(signer), mailer }
    }
}

/// Start the server with the given configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = SharedStore::open(&config.db_path)?;
    let signer = match config.token_key {
        Some(seed) => TokenSigner::new(seed, config.token_ttl_days),
        None => {
            warn!("AGENCYD_TOKEN_KEY unset; using an ephemeral signing key, sessions will not survive restart");
            TokenSigner::ephemeral(config.token_ttl_days)?
        }
    };
    let state = AppState::new(store, signer, Arc::new(TracingMailer));
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "agencyd ok" }))
        .route("/api/users", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users/me", get(me))
        .route("/api/users/profile", put(update_profile))
        .route("/api/users/create", post(create_employee))
        .route("/api/users/employees", get(list_employees))
        .route("/api/users/{id}", delete(delete_user))
        .route("/api/users/{id}/reset", put(reset_password))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/email/send-invoice", post(send_invoice))
        .route("/api/email/logs", get(email_logs))
        .with_state(state)
}

fn err_response(e: &AppError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {e}");
    }
    (status, Json(json!({"code": e.code_str(), "message": e.message()})))
}

fn bearer_token(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::unauthenticated("no_token", "Not authorized, no token"))
}

/// Per-request entry point of the access decision path: verify the bearer
/// token and return the live identity record every downstream policy decision
/// works on.
fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let token = bearer_token(headers)?;
    let guard = state.store.0.lock();
    state.signer.verify(&token, &guard)
}

fn require_admin(user: &User, denied_msg: &'static str) -> AppResult<()> {
    match identity::require_admin(user, denied_msg) {
        Decision::Allowed => Ok(()),
        _ => Err(AppError::forbidden("admin_only", denied_msg)),
    }
}

// ---- users ----

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> impl IntoResponse {
    let res = {
        let guard = state.store.0.lock();
        // Public signup provisions an admin: first-run bootstrap convenience.
        identity::register(&guard, &state.signer, &payload.name, &payload.email, &payload.password, Role::Admin)
    };
    match res {
        Ok(out) => (
            StatusCode::CREATED,
            Json(json!({
                "_id": out.user.id,
                "name": out.user.name,
                "email": out.user.email,
                "role": out.user.role,
                "token": out.token,
            })),
        ),
        Err(e) => err_response(&e),
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let res = {
        let guard = state.store.0.lock();
        identity::login(&guard, &state.signer, &payload.email, &payload.password)
    };
    match res {
        Ok(out) => (
            StatusCode::OK,
            Json(json!({
                "_id": out.user.id,
                "name": out.user.name,
                "email": out.user.email,
                "role": out.user.role,
                "jobTitle": out.user.job_title,
                "token": out.token,
            })),
        ),
        Err(e) => err_response(&e),
    }
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match authenticate(&state, &headers) {
        Ok(user) => (StatusCode::OK, Json(json!(user))),
        Err(e) => err_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct ProfilePayload {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ProfilePayload>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|user| {
        let guard = state.store.0.lock();
        let updated = guard.update_user_profile(&user.id, payload.name.as_deref(), payload.email.as_deref())?;
        // A password change revokes every outstanding session; the token
        // handed back is minted against the new version so this client
        // survives its own change.
        let token = match payload.password.as_deref().filter(|p| !p.is_empty()) {
            Some(pw) => identity::change_password(&guard, &state.signer, &updated.id, pw)?,
            None => state.signer.mint(&updated),
        };
        let updated = guard
            .find_user_by_id(&updated.id)?
            .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
        Ok((updated, token))
    });
    match res {
        Ok((user, token)) => (
            StatusCode::OK,
            Json(json!({
                "_id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.role,
                "token": token,
            })),
        ),
        Err(e) => err_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEmployeePayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    phone: Option<String>,
    job_title: Option<String>,
    department: Option<String>,
    role: Option<Role>,
}

async fn create_employee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEmployeePayload>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can provision accounts")?;
        if payload.name.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
            return Err(AppError::validation("missing_field", "Please add name, email, and password"));
        }
        let hash = security::hash_password(&payload.password)?;
        let mut new = NewUser::new(&payload.name, &payload.email, &hash, payload.role.unwrap_or(Role::Employee));
        if let Some(phone) = payload.phone {
            new.phone = phone;
        }
        if let Some(title) = payload.job_title {
            new.job_title = title;
        }
        if let Some(dept) = payload.department {
            new.department = dept;
        }
        let guard = state.store.0.lock();
        guard.create_user(new)
    });
    match res {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({
                "_id": user.id,
                "name": user.name,
                "email": user.email,
                "role": user.role,
                "jobTitle": user.job_title,
            })),
        ),
        Err(e) => err_response(&e),
    }
}

async fn list_employees(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can list accounts")?;
        let guard = state.store.0.lock();
        guard.list_users()
    });
    match res {
        Ok(users) => (StatusCode::OK, Json(json!(users))),
        Err(e) => err_response(&e),
    }
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can delete accounts")?;
        let guard = state.store.0.lock();
        guard.delete_user(&id)
    });
    match res {
        Ok(()) => (StatusCode::OK, Json(json!({"message": "User removed"}))),
        Err(e) => err_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct ResetPayload {
    #[serde(default)]
    password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ResetPayload>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can reset passwords")?;
        let guard = state.store.0.lock();
        if guard.find_user_by_id(&id)?.is_none() {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        // Forced reset: the version bump inside revokes the target's
        // sessions. The fresh token is discarded; the user logs back in with
        // the new password.
        identity::change_password(&guard, &state.signer, &id, &payload.password)?;
        Ok(())
    });
    match res {
        Ok(()) => (StatusCode::OK, Json(json!({"message": "Password updated successfully"}))),
        Err(e) => err_response(&e),
    }
}

// ---- projects ----

async fn list_projects(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        let guard = state.store.0.lock();
        match actor.role {
            Role::Admin => guard.list_projects(),
            Role::Employee => guard.list_projects_assigned_to(&actor.id),
        }
    });
    match res {
        Ok(projects) => (StatusCode::OK, Json(json!(projects))),
        Err(e) => err_response(&e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    client: String,
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    description: String,
    deadline: Option<String>,
    budget: Option<f64>,
    status: Option<String>,
    assigned_to: Option<String>,
    priority: Option<String>,
    tech_stack: Option<String>,
    project_type: Option<String>,
    docs_link: Option<String>,
}

async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProjectPayload>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can launch projects")?;
        let (Some(deadline), Some(budget)) = (payload.deadline.clone(), payload.budget) else {
            return Err(AppError::validation("missing_field", "Please add all required fields"));
        };
        if payload.name.is_empty() || payload.client.is_empty() {
            return Err(AppError::validation("missing_field", "Please add all required fields"));
        }
        let new = NewProject {
            name: payload.name.clone(),
            client: payload.client.clone(),
            client_email: payload.client_email.clone(),
            description: payload.description.clone(),
            deadline,
            budget,
            status: payload.status.clone().unwrap_or_else(|| "Pending".to_string()),
            assigned_to: payload.assigned_to.clone(),
            priority: payload.priority.clone().unwrap_or_else(|| "Medium".to_string()),
            tech_stack: payload.tech_stack.clone().unwrap_or_default(),
            project_type: payload.project_type.clone().unwrap_or_else(|| "Other".to_string()),
            docs_link: payload.docs_link.clone().unwrap_or_default(),
            created_by: actor.id.clone(),
        };
        let guard = state.store.0.lock();
        guard.create_project(new)
    });
    match res {
        Ok(project) => (StatusCode::CREATED, Json(json!(project))),
        Err(e) => err_response(&e),
    }
}

async fn get_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        let guard = state.store.0.lock();
        let Some(project) = guard.find_project(&id)? else {
            return Err(AppError::not_found("project_not_found", "Project not found"));
        };
        match identity::project_decision(&actor, Action::Read, &project) {
            Decision::Denied(msg) => Err(AppError::forbidden("not_project_member", msg)),
            _ => Ok(project),
        }
    });
    match res {
        Ok(project) => (StatusCode::OK, Json(json!(project))),
        Err(e) => err_response(&e),
    }
}

async fn update_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        let body = payload.as_object().cloned().unwrap_or_default();
        let guard = state.store.0.lock();
        let Some(project) = guard.find_project(&id)? else {
            return Err(AppError::not_found("project_not_found", "Project not found"));
        };
        // Field restriction rebuilds the payload from the whitelist; extra
        // keys from a non-admin are dropped, never an error.
        let effective = match identity::project_decision(&actor, Action::Update, &project) {
            Decision::Allowed => body,
            Decision::AllowedWithFields(fields) => identity::restrict_payload(&body, fields),
            Decision::Denied(msg) => return Err(AppError::forbidden("not_project_member", msg)),
        };
        guard.update_project(&id, &effective)
    });
    match res {
        Ok(project) => (StatusCode::OK, Json(json!(project))),
        Err(e) => err_response(&e),
    }
}

async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        let guard = state.store.0.lock();
        let Some(project) = guard.find_project(&id)? else {
            return Err(AppError::not_found("project_not_found", "Project not found"));
        };
        match identity::project_decision(&actor, Action::Delete, &project) {
            Decision::Allowed => guard.delete_project(&id),
            _ => Err(AppError::forbidden("admin_only", "Access Denied: Only Admins can delete projects")),
        }
    });
    match res {
        Ok(()) => (StatusCode::OK, Json(json!({"id": id}))),
        Err(e) => err_response(&e),
    }
}

// ---- settings ----

async fn get_settings(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|_actor| {
        let guard = state.store.0.lock();
        guard.get_or_create_settings()
    });
    match res {
        Ok(settings) => (StatusCode::OK, Json(json!(settings))),
        Err(e) => err_response(&e),
    }
}

async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SettingUpdate>,
) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can modify global settings")?;
        let guard = state.store.0.lock();
        guard.update_settings(&payload)
    });
    match res {
        Ok(settings) => (StatusCode::OK, Json(json!(settings))),
        Err(e) => err_response(&e),
    }
}

// ---- invoice email ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceAttachment {
    filename: Option<String>,
    /// Base64-encoded rendered invoice document.
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendInvoicePayload {
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    client_name: String,
    #[serde(default)]
    invoice_number: String,
    #[serde(default)]
    project_id: String,
    invoice: Option<InvoiceAttachment>,
}

async fn send_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendInvoicePayload>,
) -> impl IntoResponse {
    let res = (|| {
        let actor = authenticate(&state, &headers)?;
        let Some(attachment) = payload.invoice.as_ref() else {
            return Err(AppError::validation("missing_field", "Missing email, invoice file, or project ID"));
        };
        if payload.client_email.is_empty() || payload.project_id.is_empty() {
            return Err(AppError::validation("missing_field", "Missing email, invoice file, or project ID"));
        }
        let content = base64::engine::general_purpose::STANDARD
            .decode(&attachment.content)
            .map_err(|_| AppError::validation("invalid_attachment", "Invoice attachment is not valid base64"))?;

        let company_name = {
            let guard = state.store.0.lock();
            guard.get_or_create_settings()?.company_name
        };
        let msg = EmailMessage {
            to: payload.client_email.clone(),
            subject: format!("Invoice #{} from {}", payload.invoice_number, company_name),
            html_body: mailer::invoice_html(&company_name, &payload.client_name, &payload.invoice_number),
            attachments: vec![Attachment {
                filename: attachment
                    .filename
                    .clone()
                    .unwrap_or_else(|| format!("Invoice_{}.pdf", payload.invoice_number)),
                content,
            }],
        };
        if let Err(e) = state.mailer.send(&msg) {
            error!("invoice email failed: {e}");
            return Err(AppError::internal("email_failed", "Failed to send email"));
        }
        // Only successful sends are logged.
        let guard = state.store.0.lock();
        guard.log_email(
            &payload.client_name,
            &payload.client_email,
            &payload.invoice_number,
            &payload.project_id,
            &actor.id,
            "Success",
        )?;
        Ok(())
    })();
    match res {
        Ok(()) => (StatusCode::OK, Json(json!({"message": "Email sent successfully!"}))),
        Err(e) => err_response(&e),
    }
}

async fn email_logs(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let res = authenticate(&state, &headers).and_then(|actor| {
        require_admin(&actor, "Access Denied: Only Admins can read email logs")?;
        let guard = state.store.0.lock();
        guard.list_email_logs()
    });
    match res {
        Ok(logs) => (StatusCode::OK, Json(json!(logs))),
        Err(e) => err_response(&e),
    }
}
