use std::fmt;

/// Opaque identifier of one session.
///
/// The raw value `0` is reserved and means "no session"; it is what
/// [`SessionId::default`] returns.  Non-zero ids only come out of a
/// [`SessionAllocator`](crate::SessionAllocator), so callers cannot mint
/// ids that collide with real sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// True for the reserved zero value, which names no session.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Raw counter value, for logs and metrics labels.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        let id = SessionId::default();
        assert!(id.is_zero());
        assert_eq!(id.to_string(), "session-0");
    }

    #[test]
    fn renders_with_prefix() {
        assert_eq!(SessionId::from_raw(7).to_string(), "session-7");
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(SessionId::from_raw(3), SessionId::from_raw(3));
        assert_ne!(SessionId::from_raw(3), SessionId::from_raw(4));
    }
}
