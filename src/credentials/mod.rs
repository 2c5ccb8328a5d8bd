pub mod provider;
pub mod session;
pub mod token;

pub use provider::TokenProvider;
pub use session::{CookieSessionStore, MemorySessionStore, SessionTokenStore};
pub use token::{StoredTokens, TokenPair};
