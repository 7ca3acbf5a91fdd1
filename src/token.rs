use std::time::Duration;
use tokio::time::Instant;

/// Default time between two token rotations.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Length of a token in bytes.
pub const TOKEN_LEN: usize = 8;

/// Opaque value a node must echo back in `announce_peer`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    fn random() -> Self {
        Self(rand::random())
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ----------------------------------------------------------------------------//

/// We hand out the same token to everybody who asks within one rotation interval, so
/// nothing is stored per exchange. A token stays acceptable for the interval it was
/// issued in and the one after it, which gives a remote node between one and two
/// intervals to come back with its `announce_peer`.
///
/// Rotation happens lazily on access. Boundaries stay anchored to the time the store
/// was created.
pub(crate) struct TokenStore {
    curr_token: Token,
    last_token: Token,
    last_refresh: Instant,
    interval: Duration,
}

impl TokenStore {
    pub fn new(interval: Duration) -> TokenStore {
        // The initial last token is random and never handed out.
        TokenStore {
            curr_token: Token::random(),
            last_token: Token::random(),
            last_refresh: Instant::now(),
            interval,
        }
    }

    /// The token to hand out right now.
    pub fn current(&mut self) -> Token {
        self.refresh_check();
        self.curr_token
    }

    /// Whether `candidate` was handed out during the current or the previous interval.
    pub fn is_valid(&mut self, candidate: &[u8]) -> bool {
        self.refresh_check();
        candidate == self.curr_token.as_ref() || candidate == self.last_token.as_ref()
    }

    fn refresh_check(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refresh);
        let interval = self.interval.as_nanos().max(1);

        // Since tokens rotate lazily, more than one interval could have passed since the
        // last rotation, in which case neither token is valid anymore.
        let passed = elapsed.as_nanos() / interval;
        match passed {
            0 => return,
            1 => {
                self.last_token = self.curr_token;
                self.curr_token = Token::random();
            }
            _ => {
                self.last_token = Token::random();
                self.curr_token = Token::random();
            }
        }

        // Anchor to the last boundary rather than to `now`.
        let since_boundary = elapsed.as_nanos() % interval;
        self.last_refresh = now - Duration::from_nanos(since_boundary as u64);

        log::trace!("Rotated announce token ({} intervals passed)", passed);
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenStore, DEFAULT_ROTATION_INTERVAL};
    use std::time::Duration;
    use tokio::time;

    const INTERVAL: Duration = DEFAULT_ROTATION_INTERVAL;

    #[tokio::test(start_paused = true)]
    async fn positive_accept_fresh_token() {
        let mut store = TokenStore::new(INTERVAL);

        let token = store.current();

        assert!(store.is_valid(token.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn positive_same_token_within_interval() {
        let mut store = TokenStore::new(INTERVAL);

        let first = store.current();
        time::advance(INTERVAL - Duration::from_secs(1)).await;

        assert_eq!(store.current(), first);
    }

    #[tokio::test(start_paused = true)]
    async fn positive_accept_token_from_previous_interval() {
        let mut store = TokenStore::new(INTERVAL);

        let token = store.current();
        time::advance(INTERVAL + Duration::from_secs(1)).await;

        assert_ne!(store.current(), token);
        assert!(store.is_valid(token.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn positive_rotation_boundaries_do_not_drift() {
        let mut store = TokenStore::new(INTERVAL);

        // Issued just before the first boundary...
        time::advance(INTERVAL - Duration::from_secs(1)).await;
        let token = store.current();

        // ...rotated out at the first boundary, expired at the second one.
        time::advance(Duration::from_secs(2)).await;
        assert!(store.is_valid(token.as_ref()));

        time::advance(INTERVAL).await;
        assert!(!store.is_valid(token.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_reject_expired_token() {
        let mut store = TokenStore::new(INTERVAL);

        let token = store.current();
        time::advance(INTERVAL * 2).await;

        assert!(!store.is_valid(token.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_reject_token_three_rotations_old() {
        let mut store = TokenStore::new(INTERVAL);

        let token = store.current();
        for _ in 0..3 {
            time::advance(INTERVAL).await;
            store.current();
        }

        assert!(!store.is_valid(token.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_reject_unknown_token() {
        let mut store = TokenStore::new(INTERVAL);

        assert!(!store.is_valid(b"aoeusnth"));
        assert!(!store.is_valid(b""));
    }
}
