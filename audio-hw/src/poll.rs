//! Bounded spin-waits on hardware status flags.

/// The poll budget ran out before the flag was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

/// Poll `condition` until it returns `true`, at most `limit` times.
///
/// Callers map [`Expired`] onto the timeout error for the flag they were
/// waiting on.
#[inline]
pub fn spin_until<F>(limit: u32, mut condition: F) -> Result<(), Expired>
where
    F: FnMut() -> bool,
{
    for _ in 0..limit {
        if condition() {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(Expired)
}
