pub mod client;
pub mod configmaps;

/// Default user agent for `cmwatch` - automatically uses the package version
///
/// Every client built by [`client::new`] sends this unless it is overridden
/// through the `CMWATCH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Environment variable that replaces [`USER_AGENT`]
pub const USER_AGENT_ENV: &str = "CMWATCH_USER_AGENT";

/// Resolve the user agent to send, preferring the environment override
#[must_use]
pub fn user_agent() -> String {
    std::env::var(USER_AGENT_ENV)
        .ok()
        .filter(|ua| !ua.trim().is_empty())
        .unwrap_or_else(|| USER_AGENT.to_string())
}
