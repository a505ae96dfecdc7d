// Ambient identity layer: argon2 credentials plus DB-backed sessions carried
// in a signed cookie. The interesting authorization rules (author-only edit,
// login redirects) live in the handlers; this module only answers "who is
// making this request".

pub mod password;
pub mod sessions;

pub use sessions::{CurrentUser, OptionalUser, SessionTokens, SESSION_COOKIE};
