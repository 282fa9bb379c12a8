//! Authentication core: credential verification, token lifecycle, session
//! consistency.
//!
//! The components here mirror the request pipeline: [`password`] hashes and
//! verifies credentials, [`resolver`] maps credentials and federated
//! identities onto durable user records, [`tokens`] mints and verifies the
//! JWT pair, [`session`] tracks the single currently-valid refresh token per
//! user, and [`extract`] guards protected routes.

pub mod extract;
pub mod password;
pub mod resolver;
pub mod session;
pub mod tokens;

pub use extract::AuthUser;
pub use resolver::AccountResolver;
pub use session::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, AccessClaims, RefreshClaims, TokenKeys};
