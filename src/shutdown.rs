use tokio::sync::broadcast;

/// Process-wide stop signal: Ctrl+C, SIGTERM, or a fatal runner error.
pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;
