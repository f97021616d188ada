//! Session lifecycle integration tests: login supersession, password-driven
//! revocation, and token survival across a store reopen with a stable key.

use anyhow::Result;
use tempfile::tempdir;

use agencyd::identity::{self, TokenSigner};
use agencyd::store::{Role, Store};

fn signer() -> TokenSigner {
    TokenSigner::new([17u8; 32], 30)
}

#[test]
fn login_on_second_device_logs_out_the_first() -> Result<()> {
    let store = Store::in_memory()?;
    let s = signer();
    identity::register(&store, &s, "Asha", "asha@agency.com", "pw1", Role::Admin)?;

    let phone = identity::login(&store, &s, "asha@agency.com", "pw1")?;
    let laptop = identity::login(&store, &s, "asha@agency.com", "pw1")?;

    let err = s.verify(&phone.token, &store).unwrap_err();
    assert_eq!(err.code_str(), "session_superseded");
    assert_eq!(err.http_status(), 401);
    assert_eq!(
        err.message(),
        "Session expired. You logged in on another device."
    );
    assert!(s.verify(&laptop.token, &store).is_ok());
    Ok(())
}

#[test]
fn admin_forced_reset_revokes_target_session() -> Result<()> {
    let store = Store::in_memory()?;
    let s = signer();
    let emp = identity::register(&store, &s, "Ravi", "ravi@agency.com", "pw1", Role::Employee)?;
    let session = identity::login(&store, &s, "ravi@agency.com", "pw1")?;

    // Admin resets; the minted token is thrown away on this path.
    identity::change_password(&store, &s, &emp.user.id, "pw2")?;

    let err = s.verify(&session.token, &store).unwrap_err();
    assert_eq!(err.code_str(), "session_superseded");
    assert!(identity::login(&store, &s, "ravi@agency.com", "pw1").is_err());
    assert!(identity::login(&store, &s, "ravi@agency.com", "pw2").is_ok());
    Ok(())
}

#[test]
fn profile_update_without_password_keeps_session_alive() -> Result<()> {
    let store = Store::in_memory()?;
    let s = signer();
    identity::register(&store, &s, "Asha", "asha@agency.com", "pw1", Role::Admin)?;
    let session = identity::login(&store, &s, "asha@agency.com", "pw1")?;

    let updated = store.update_user_profile(&session.user.id, Some("Asha K"), None)?;
    assert_eq!(updated.name, "Asha K");
    assert!(s.verify(&session.token, &store).is_ok());
    Ok(())
}

#[test]
fn token_survives_store_reopen_with_stable_key() -> Result<()> {
    let tmp = tempdir()?;
    let db = tmp.path().join("agency.db");
    let s = signer();

    let token = {
        let store = Store::open(&db)?;
        identity::register(&store, &s, "Asha", "asha@agency.com", "pw1", Role::Admin)?;
        identity::login(&store, &s, "asha@agency.com", "pw1")?.token
    };

    // Version counters are durable, so a restart does not log anyone out.
    let store = Store::open(&db)?;
    let user = s.verify(&token, &store)?;
    assert_eq!(user.email, "asha@agency.com");
    assert_eq!(user.token_version, 1);
    Ok(())
}

#[test]
fn deleting_an_identity_kills_its_token() -> Result<()> {
    let store = Store::in_memory()?;
    let s = signer();
    let out = identity::register(&store, &s, "Temp", "temp@agency.com", "pw", Role::Employee)?;
    store.delete_user(&out.user.id)?;
    let err = s.verify(&out.token, &store).unwrap_err();
    assert_eq!(err.code_str(), "identity_not_found");
    Ok(())
}
