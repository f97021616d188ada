//! Authorization integration tests: the policy decision feeding the store,
//! exactly as the HTTP handlers compose them. Field restriction is exercised
//! end to end: a non-admin sending forbidden keys silently loses them while
//! the permitted keys land.

use anyhow::Result;
use serde_json::json;

use agencyd::identity::{self, Action, Decision, TokenSigner};
use agencyd::store::{NewProject, Role, Store, User};

fn setup() -> Result<(Store, TokenSigner, User, User)> {
    let store = Store::in_memory()?;
    let signer = TokenSigner::new([3u8; 32], 30);
    let admin = identity::register(&store, &signer, "Boss", "boss@agency.com", "pw", Role::Admin)?.user;
    let emp = {
        let hash = agencyd::security::hash_password("pw")?;
        store.create_user(agencyd::store::NewUser::new("Dev", "dev@agency.com", &hash, Role::Employee))?
    };
    Ok((store, signer, admin, emp))
}

fn seed_project(store: &Store, admin: &User, assigned_to: Option<&str>) -> Result<agencyd::store::Project> {
    Ok(store.create_project(NewProject {
        name: "CRM rollout".into(),
        client: "Acme".into(),
        client_email: "billing@acme.com".into(),
        description: "Phase one".into(),
        deadline: "2026-12-31".into(),
        budget: 12000.0,
        status: "Pending".into(),
        assigned_to: assigned_to.map(|s| s.to_string()),
        priority: "High".into(),
        tech_stack: "Rust".into(),
        project_type: "Web Development".into(),
        docs_link: String::new(),
        created_by: admin.id.clone(),
    })?)
}

/// Apply an update the way the handler does: decide, project, write.
fn update_as(
    store: &Store,
    actor: &User,
    project_id: &str,
    body: serde_json::Value,
) -> agencyd::error::AppResult<agencyd::store::Project> {
    let project = store
        .find_project(project_id)?
        .ok_or_else(|| agencyd::error::AppError::not_found("project_not_found", "Project not found"))?;
    let body = body.as_object().cloned().unwrap_or_default();
    let effective = match identity::project_decision(actor, Action::Update, &project) {
        Decision::Allowed => body,
        Decision::AllowedWithFields(fields) => identity::restrict_payload(&body, fields),
        Decision::Denied(msg) => return Err(agencyd::error::AppError::forbidden("not_project_member", msg)),
    };
    store.update_project(project_id, &effective)
}

#[test]
fn assigned_employee_update_keeps_whitelisted_fields_only() -> Result<()> {
    let (store, _signer, admin, emp) = setup()?;
    let project = seed_project(&store, &admin, Some(&emp.id))?;

    let updated = update_as(
        &store,
        &emp,
        &project.id,
        json!({
            "status": "Running",
            "docsLink": "https://docs.acme.com",
            "name": "Hijacked",
            "budget": 1.0,
            "assignedTo": null,
        }),
    )?;

    assert_eq!(updated.status, "Running");
    assert_eq!(updated.docs_link, "https://docs.acme.com");
    // Forbidden keys were dropped, not rejected.
    assert_eq!(updated.name, "CRM rollout");
    assert_eq!(updated.budget, 12000.0);
    assert_eq!(updated.assigned_to.as_deref(), Some(emp.id.as_str()));
    Ok(())
}

#[test]
fn admin_update_is_unrestricted() -> Result<()> {
    let (store, _signer, admin, emp) = setup()?;
    let project = seed_project(&store, &admin, Some(&emp.id))?;

    let updated = update_as(
        &store,
        &admin,
        &project.id,
        json!({"name": "CRM rollout v2", "budget": 15000.0, "assignedTo": null}),
    )?;
    assert_eq!(updated.name, "CRM rollout v2");
    assert_eq!(updated.budget, 15000.0);
    assert_eq!(updated.assigned_to, None);
    Ok(())
}

#[test]
fn unassigned_employee_is_denied_update_and_read() -> Result<()> {
    let (store, _signer, admin, emp) = setup()?;
    let project = seed_project(&store, &admin, None)?;

    let err = update_as(&store, &emp, &project.id, json!({"status": "Running"})).unwrap_err();
    assert_eq!(err.http_status(), 403);
    assert!(matches!(
        identity::project_decision(&emp, Action::Read, &project),
        Decision::Denied(_)
    ));
    Ok(())
}

#[test]
fn employee_listing_is_scoped_to_assignment() -> Result<()> {
    let (store, _signer, admin, emp) = setup()?;
    seed_project(&store, &admin, None)?;
    seed_project(&store, &admin, Some(&emp.id))?;

    assert_eq!(store.list_projects()?.len(), 2);
    let mine = store.list_projects_assigned_to(&emp.id)?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].assigned_to.as_deref(), Some(emp.id.as_str()));
    Ok(())
}

#[test]
fn admin_gate_covers_identity_and_settings_resources() -> Result<()> {
    let (_store, _signer, admin, emp) = setup()?;
    assert_eq!(
        identity::require_admin(&admin, "Access Denied: Only Admins can modify global settings"),
        Decision::Allowed
    );
    assert!(matches!(
        identity::require_admin(&emp, "Access Denied: Only Admins can modify global settings"),
        Decision::Denied(_)
    ));
    Ok(())
}

#[test]
fn invalid_enum_from_a_permitted_field_is_rejected() -> Result<()> {
    let (store, _signer, admin, emp) = setup()?;
    let project = seed_project(&store, &admin, Some(&emp.id))?;
    // "status" survives the projection but the value fails validation.
    let err = update_as(&store, &emp, &project.id, json!({"status": "Paused"})).unwrap_err();
    assert_eq!(err.http_status(), 400);
    Ok(())
}
