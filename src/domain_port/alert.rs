/// User-visible notification seam (the toast). One message per terminal
/// failure; repeated failures repeat the message.
pub trait AlertSink: Send + Sync {
    fn error(&self, message: &str);
}
