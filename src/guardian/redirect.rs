//! Per-surface redirect tracking.

use url::Url;

/// Tracks consecutive server redirects for one surface.
///
/// The counter counts redirects since the last accepted non-redirect
/// navigation trip of the ceiling; it is reset only when the ceiling trips
/// (or a too-many-redirects load failure reports the same condition), never
/// per navigation. The last known good URL is updated by every accepted
/// non-redirect navigation.
#[derive(Debug, Default)]
pub struct RedirectState {
    consecutive: u32,
    last_good: Option<Url>,
}

impl RedirectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one server-redirect hop and returns the new count.
    pub fn record_redirect(&mut self) -> u32 {
        self.consecutive += 1;
        self.consecutive
    }

    /// Resets the consecutive-redirect counter to zero.
    pub fn reset_counter(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Marks `url` as the last known good URL. The counter is untouched.
    pub fn accept(&mut self, url: Url) {
        self.last_good = Some(url);
    }

    pub fn last_good(&self) -> Option<&Url> {
        self.last_good.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments_and_resets() {
        let mut state = RedirectState::new();
        assert_eq!(state.record_redirect(), 1);
        assert_eq!(state.record_redirect(), 2);

        state.reset_counter();
        assert_eq!(state.consecutive(), 0);
    }

    #[test]
    fn accept_updates_last_good_but_not_counter() {
        let mut state = RedirectState::new();
        state.record_redirect();
        state.record_redirect();

        let url = Url::parse("https://play.example.com/lobby").unwrap();
        state.accept(url.clone());

        assert_eq!(state.last_good(), Some(&url));
        assert_eq!(state.consecutive(), 2);
    }
}
