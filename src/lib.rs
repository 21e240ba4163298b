//! Embeddable authentication and authorization engine.
//!
//! The engine decides *who* a caller is — through one or more [`realm`]s
//! queried by the [`authenticator`] — and, independently, *what* they may
//! do, through hierarchical wildcard [`permission`]s evaluated by ordered
//! [`chain`] rules. Persistence, HTTP routing, and configuration loading
//! stay with the embedder behind the [`store`] traits and [`config`] types.

pub mod authenticator;
pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod credential;
pub mod error;
pub mod hashing;
pub mod permission;
pub mod realm;
pub mod remember_me;
pub mod session;
pub mod store;

pub use authenticator::{AuthenticationStrategy, MultiRealmAuthenticator};
pub use chain::{
    AccessFilter, Allowed, ChainRule, Decision, DenyResponse, Dispatcher, IssuedToken, Logical,
    PathPattern, SecurityChain, SecurityRequest,
};
pub use config::{ChainRuleConfig, EngineConfig, RememberMeOptions, TimeUnit};
pub use credential::{CredentialKind, Credentials};
pub use error::Error;
pub use hashing::{HashAlgorithm, HashingConfig};
pub use permission::WildcardPermission;
pub use realm::{
    AuthenticationInfo, AuthorizationInfo, PasswordRealm, Principal, Realm, SmsCodeRealm,
};
pub use remember_me::{RememberMeKey, RememberMeManager};
pub use session::{AuthorizationCache, CachePolicy};
pub use store::{MemoryStore, MetadataStore, SmsCodeStore, UserRecord, UserStore};
