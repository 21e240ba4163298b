//! Engine configuration: hashing scheme, remember-me options, chain rules.

use serde::{Deserialize, Serialize};

use crate::authenticator::AuthenticationStrategy;
use crate::bootstrap::SeedData;
use crate::chain::{AccessFilter, ChainRule, Logical, PathPattern, SecurityChain};
use crate::error::Error;
use crate::hashing::HashingConfig;
use crate::permission::WildcardPermission;
use crate::remember_me::{RememberMeKey, RememberMeManager};
use crate::session::CachePolicy;

const DEFAULT_COOKIE_NAME: &str = "rememberMe";
const DEFAULT_LIFETIME: i64 = 30;

/// Unit for the configured remember-me lifetime. Whatever the unit, the
/// engine normalizes to seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Minutes,
    Hours,
    #[default]
    Days,
}

impl TimeUnit {
    #[must_use]
    pub fn to_seconds(self, amount: i64) -> i64 {
        match self {
            Self::Minutes => amount * 60,
            Self::Hours => amount * 60 * 60,
            Self::Days => amount * 24 * 60 * 60,
        }
    }
}

/// Remember-me cookie settings. The cipher key is not configuration — it is
/// sourced from an external secret and handed to [`RememberMeOptions::manager`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RememberMeOptions {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_lifetime")]
    pub lifetime: i64,
    #[serde(default)]
    pub unit: TimeUnit,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_lifetime() -> i64 {
    DEFAULT_LIFETIME
}

impl Default for RememberMeOptions {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime: DEFAULT_LIFETIME,
            unit: TimeUnit::default(),
        }
    }
}

impl RememberMeOptions {
    #[must_use]
    pub fn lifetime_seconds(&self) -> i64 {
        self.unit.to_seconds(self.lifetime)
    }

    /// Build the token manager with the externally sourced cipher key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the lifetime is not positive.
    pub fn manager(&self, key: RememberMeKey) -> Result<RememberMeManager, Error> {
        if self.lifetime <= 0 {
            return Err(Error::Config(
                "remember-me lifetime must be positive".to_string(),
            ));
        }
        Ok(RememberMeManager::new(key, self.lifetime_seconds())?
            .with_cookie_name(self.cookie_name.clone()))
    }
}

/// One chain rule in its configuration form: a path pattern and a filter
/// spec such as `anon`, `authc`, or `anyOfRoles[editor, author]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainRuleConfig {
    pub pattern: String,
    pub filter: String,
}

impl ChainRuleConfig {
    #[must_use]
    pub fn new(pattern: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            filter: filter.into(),
        }
    }
}

/// Parse a filter spec into its access filter.
///
/// Recognized names: `anon`, `logout` (engine-side an alias of `anon`;
/// session teardown is transport work), `authc`, `roles[...]`,
/// `anyOfRoles[...]`, `perms[...]`, `anyOfPerms[...]`.
///
/// # Errors
///
/// Returns `Error::Config` for unknown names or malformed argument lists.
pub fn parse_filter(spec: &str) -> Result<AccessFilter, Error> {
    let spec = spec.trim();
    let (name, args) = split_spec(spec)?;
    match name {
        "anon" | "logout" => {
            require_no_args(name, &args)?;
            Ok(AccessFilter::Anonymous)
        }
        "authc" => {
            require_no_args(name, &args)?;
            Ok(AccessFilter::Authenticated)
        }
        "roles" => Ok(AccessFilter::Roles(args)),
        "anyOfRoles" => Ok(AccessFilter::AnyOfRoles(args)),
        "perms" => Ok(AccessFilter::Permissions(
            parse_permissions(&args)?,
            Logical::And,
        )),
        "anyOfPerms" => Ok(AccessFilter::Permissions(
            parse_permissions(&args)?,
            Logical::Or,
        )),
        other => Err(Error::Config(format!("unknown filter {other:?}"))),
    }
}

fn split_spec(spec: &str) -> Result<(&str, Vec<String>), Error> {
    let Some(open) = spec.find('[') else {
        if spec.is_empty() {
            return Err(Error::Config("filter spec is empty".to_string()));
        }
        return Ok((spec, Vec::new()));
    };
    if !spec.ends_with(']') {
        return Err(Error::Config(format!(
            "filter spec {spec:?} has an unterminated argument list"
        )));
    }
    let name = spec[..open].trim();
    if name.is_empty() {
        return Err(Error::Config(format!("filter spec {spec:?} has no name")));
    }
    let inner = &spec[open + 1..spec.len() - 1];
    let args = inner
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name, args))
}

fn require_no_args(name: &str, args: &[String]) -> Result<(), Error> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!("filter {name:?} takes no arguments")))
    }
}

fn parse_permissions(args: &[String]) -> Result<Vec<WildcardPermission>, Error> {
    args.iter()
        .map(|raw| WildcardPermission::parse(raw))
        .collect()
}

/// The whole engine configuration, loaded once at startup by the embedder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub hashing: HashingConfig,
    #[serde(default)]
    pub strategy: AuthenticationStrategy,
    #[serde(default)]
    pub cache_policy: CachePolicy,
    #[serde(default)]
    pub remember_me: Option<RememberMeOptions>,
    #[serde(default)]
    pub rules: Vec<ChainRuleConfig>,
    #[serde(default)]
    pub seed: SeedData,
}

impl EngineConfig {
    /// Compile the configured rules into an ordered chain. Declaration order
    /// is kept verbatim; it is part of the policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid pattern or filter spec.
    pub fn security_chain(&self) -> Result<SecurityChain, Error> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let pattern = PathPattern::parse(&rule.pattern)?;
            let filter = parse_filter(&rule.filter)?;
            rules.push(ChainRule::new(pattern, filter));
        }
        Ok(SecurityChain::new(rules))
    }
}
