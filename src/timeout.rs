//! Cooperative cancellation.

use std::time::{Duration, Instant};

use crate::diagnostics::ErrorKind;

/// A shared deadline token threaded through every potentially-long
/// operation. Work detects expiry at its next [`Timeout::check`] call and
/// unwinds with [`ErrorKind::Timeout`]; there is no other suspension point.
#[derive(Clone, Debug)]
pub enum Timeout {
    /// Checks always pass.
    NoTimeout,
    /// Checks fail once the monotonic clock passes the deadline.
    DeadlineAt(Instant),
}

impl Timeout {
    /// A token expiring `duration` from now; `None` disables the check.
    pub fn from_duration(duration: Option<Duration>) -> Timeout {
        match duration {
            Some(d) => Timeout::DeadlineAt(Instant::now() + d),
            None => Timeout::NoTimeout,
        }
    }

    /// Fails with a timeout error when the deadline has passed. The `tag`
    /// names the checking site and is kept stable for comparable traces.
    pub fn check(&self, tag: &'static str) -> Result<(), ErrorKind> {
        match self {
            Timeout::NoTimeout => Ok(()),
            Timeout::DeadlineAt(deadline) => {
                if Instant::now() >= *deadline {
                    tracing::debug!(tag, "deadline exceeded");
                    Err(ErrorKind::Timeout)
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_timeout_always_passes() {
        assert!(Timeout::NoTimeout.check("test").is_ok());
    }

    #[test]
    fn test_expired_deadline_fails() {
        let t = Timeout::DeadlineAt(Instant::now() - Duration::from_millis(1));
        assert!(matches!(t.check("test"), Err(ErrorKind::Timeout)));
    }

    #[test]
    fn test_future_deadline_passes() {
        let t = Timeout::from_duration(Some(Duration::from_secs(3600)));
        assert!(t.check("test").is_ok());
    }
}
