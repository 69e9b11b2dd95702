//! Signal type contract.
//!
//! A signal is an immutable typed event value. Identity is structural: the
//! Rust type itself selects the channel, so two values of the same declared
//! type always reach the same subscriber list regardless of field contents.
//! The engine never stores a signal beyond the publish call that carries it.

/// Marker trait every publishable signal type must implement.
///
/// Identity only, no behavior. The `'static` bound is what lets the hub key
/// channels by [`TypeId`](core::any::TypeId).
///
/// ```
/// use sigmux::Signal;
///
/// struct EnemySpawned {
///     pub id: u64,
/// }
/// impl Signal for EnemySpawned {}
/// ```
pub trait Signal: 'static {}

/// Human-readable name of a signal type, for log messages.
#[must_use]
pub fn signal_name<S: Signal>() -> &'static str {
    core::any::type_name::<S>()
}
