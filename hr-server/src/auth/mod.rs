//! Authentication: password hashing, tokens and the request extractor

pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::CurrentUser;
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};
pub use tokens::{expires_after, AccessClaims, TokenService};
