/// Request validation limits
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_SLUG_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_LOGO_URL_LENGTH: usize = 2048;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;
