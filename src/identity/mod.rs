//! Identity, session tokens and the authorization policy.
//! Keep the public surface thin and split implementation across sub-modules.

mod policy;
mod provider;
mod token;

pub use policy::{project_decision, require_admin, restrict_payload, Action, Decision, EMPLOYEE_PROJECT_FIELDS};
pub use provider::{change_password, login, register, LoginOutcome};
pub use token::{session_current, Claims, TokenError, TokenSigner};
