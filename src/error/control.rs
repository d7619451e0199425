use thiserror::Error;

/// Rejections of lifecycle operations on a `TestController`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    #[error("No traffic test is currently running")]
    NotRunning,
    #[error("No traffic test has been started")]
    NeverStarted,
}
