use crate::config::Config;

pub enum DaemonEvent {
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// The enabled-listeners registry was written; access may have been granted or revoked.
    AccessChanged,
    /// The capture source reached end of input.
    CaptureClosed,
    /// Ctrl+C received; the daemon should stop listening and exit.
    Shutdown,
}
