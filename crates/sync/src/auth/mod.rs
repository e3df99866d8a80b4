//! Authentication boundary and the storage reactions to identity changes.

mod provider;
mod session;

pub use provider::{AUTH_USER_KEY, AuthError, AuthProvider, LocalAuthProvider};
pub use session::{AuthSession, AuthTransition};
