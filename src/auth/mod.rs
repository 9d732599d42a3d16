mod credentials;
mod session;

pub use credentials::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore, TOKEN_REALM};
pub use session::{AstakosSession, AuthSession, AuthToken, NoPrompt, TokenPrompter};
