pub mod invitation;
pub mod organization;
pub mod retry;
pub mod session;
pub mod user;
pub mod utils;

pub use invitation::PgInvitationRepository;
pub use organization::PgOrganizationRepository;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;
