use std::time::Duration;

/// Deterministic exponential backoff for reconnect attempts.
///
/// Each call to [`next`](Backoff::next) scales the previous delay by `1.5`,
/// rounded to the nearest millisecond, capped at `max` if one is configured.
/// No jitter is added: the schedule stays exactly reproducible, which is the
/// point of testing it with concrete `Duration` values below.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial_ms: u64,
    max_ms: Option<u64>,
    current_ms: Option<u64>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Option<Duration>) -> Self {
        Self {
            initial_ms: initial.as_millis() as u64,
            max_ms: max.map(|d| d.as_millis() as u64),
            current_ms: None,
        }
    }

    /// The delay to wait before the next connect attempt.
    pub fn next(&mut self) -> Duration {
        let next_ms = match self.current_ms {
            None => self.initial_ms,
            Some(current) => {
                let scaled = (current as f64 * 1.5).round() as u64;
                match self.max_ms {
                    Some(max) => scaled.min(max),
                    None => scaled,
                }
            }
        };
        self.current_ms = Some(next_ms);
        Duration::from_millis(next_ms)
    }

    /// Resets the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.current_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn schedule_scales_by_one_and_a_half_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Some(Duration::from_millis(1000)));
        let expected_ms = [100, 150, 225, 338, 507, 761, 1000, 1000];
        for expected in expected_ms {
            assert_eq!(backoff.next(), Duration::from_millis(expected));
        }
    }

    #[test]
    fn reset_restarts_from_initial() {
        let mut backoff = Backoff::new(Duration::from_millis(50), None);
        backoff.next();
        backoff.next();
        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_millis(50));
    }

    #[test]
    fn uncapped_backoff_keeps_growing() {
        let mut backoff = Backoff::new(Duration::from_millis(100), None);
        assert_eq!(backoff.next(), Duration::from_millis(100));
        assert_eq!(backoff.next(), Duration::from_millis(150));
        assert_eq!(backoff.next(), Duration::from_millis(225));
    }
}
