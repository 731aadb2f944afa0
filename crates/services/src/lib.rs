pub mod auth;
pub mod common;
pub mod email;
pub mod invitation;
pub mod organization;

pub use auth::{AuthService, User, UserId};
pub use invitation::InvitationService;
pub use organization::{ActiveOrgResolver, AuthContext, OrganizationService};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
