//! Rate limit key generation and handling.

use std::fmt;
use std::time::Duration;

/// The identity an action is throttled against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    /// A logged in user
    User(String),
    /// A remote address, for anonymous endpoints such as signup
    Ip(String),
    /// An address/username pair, used to slow down password guessing
    /// against one account from one address
    IpAndUser { ip: String, username: String },
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Actor::User(id.into())
    }

    pub fn ip(addr: impl Into<String>) -> Self {
        Actor::Ip(addr.into())
    }

    pub fn ip_and_user(ip: impl Into<String>, username: impl Into<String>) -> Self {
        Actor::IpAndUser {
            ip: ip.into(),
            username: username.into(),
        }
    }

    fn write_key(&self, out: &mut String) {
        match self {
            Actor::User(id) => {
                out.push('u');
                push_component(out, id);
            }
            Actor::Ip(ip) => {
                out.push('i');
                push_component(out, ip);
            }
            Actor::IpAndUser { ip, username } => {
                out.push_str("iu");
                push_component(out, ip);
                push_component(out, username);
            }
        }
    }
}

/// A key that uniquely identifies one throttled resource: an action
/// performed by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The action tag, e.g. `join_community`
    pub action: String,
    /// Who is performing the action
    pub actor: Actor,
}

impl RateLimitKey {
    pub fn new(action: impl Into<String>, actor: Actor) -> Self {
        Self {
            action: action.into(),
            actor,
        }
    }

    /// Serialize the key into a flat string.
    ///
    /// Every component is length-prefixed, so two distinct keys never
    /// produce the same string regardless of the characters they contain.
    /// Suitable as a key for an external key-value backend.
    pub fn to_string_key(&self) -> String {
        let mut out = String::with_capacity(self.action.len() + 24);
        push_component(&mut out, &self.action);
        self.actor.write_key(&mut out);
        out
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

fn push_component(out: &mut String, value: &str) {
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

/// The Counter Store key: one window of one throttled resource.
///
/// An action may be guarded by several windows at once, each of which
/// counts independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub key: RateLimitKey,
    pub window: Duration,
}

impl CounterKey {
    pub fn new(key: RateLimitKey, window: Duration) -> Self {
        Self { key, window }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}ms", self.key, self.window.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_string() {
        let key = RateLimitKey::new("join_community", Actor::user("u1"));
        assert_eq!(key.to_string_key(), "14:join_communityu2:u1");
    }

    #[test]
    fn test_key_equality() {
        let key1 = RateLimitKey::new("signup", Actor::ip("10.0.0.1"));
        let key2 = RateLimitKey::new("signup", Actor::ip("10.0.0.1"));
        assert_eq!(key1, key2);
        assert_eq!(key1.to_string_key(), key2.to_string_key());
    }

    #[test]
    fn test_concatenation_does_not_collide() {
        // "login_2_" + ip + username would collide for these two pairs.
        let a = RateLimitKey::new("login", Actor::ip_and_user("1.2.3.4", "5bob"));
        let b = RateLimitKey::new("login", Actor::ip_and_user("1.2.3.45", "bob"));
        assert_ne!(a, b);
        assert_ne!(a.to_string_key(), b.to_string_key());

        // Action tags sharing a prefix with the actor must not collide either.
        let c = RateLimitKey::new("list_c", Actor::user("1_u"));
        let d = RateLimitKey::new("list_c_1", Actor::user("u"));
        assert_ne!(c.to_string_key(), d.to_string_key());
    }

    #[test]
    fn test_actor_kinds_do_not_collide() {
        let user = RateLimitKey::new("signup", Actor::user("10.0.0.1"));
        let ip = RateLimitKey::new("signup", Actor::ip("10.0.0.1"));
        assert_ne!(user.to_string_key(), ip.to_string_key());
    }

    #[test]
    fn test_counter_keys_differ_by_window() {
        let key = RateLimitKey::new("reporting", Actor::user("u1"));
        let burst = CounterKey::new(key.clone(), Duration::from_secs(5));
        let sustained = CounterKey::new(key, Duration::from_secs(86400));
        assert_ne!(burst, sustained);
        assert_eq!(burst.to_string(), "9:reportingu2:u1@5000ms");
    }
}
