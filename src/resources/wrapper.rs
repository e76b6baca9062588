//! Run one remote call and announce its outcome on the notification bus.
//!
//! Every settled call publishes at most one notification: a success when a
//! success message was given, an error otherwise. The call's own result is
//! returned untouched, so callers still see the original rejection.

use super::error::{RemoteError, ResourceError};
use crate::events::{NotificationEmitter, NotificationKind, NotificationPayload};
use crate::NotificationSettings;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extracts the user-facing text from a rejection
pub trait ErrorMessage {
    /// Message carried by the error itself, if any
    fn user_message(&self) -> Option<String>;

    fn is_unauthorized(&self) -> bool {
        false
    }
}

impl ErrorMessage for RemoteError {
    fn user_message(&self) -> Option<String> {
        self.detail().map(str::to_string)
    }

    fn is_unauthorized(&self) -> bool {
        RemoteError::is_unauthorized(self)
    }
}

impl ErrorMessage for ResourceError {
    fn user_message(&self) -> Option<String> {
        self.remote().and_then(ErrorMessage::user_message)
    }

    fn is_unauthorized(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_unauthorized)
    }
}

/// How a wrapped call announces itself
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// Published on success; `None` publishes nothing
    pub success_message: Option<String>,
    /// Used when the rejection carries no message of its own
    pub error_message: String,
    pub success_title: Option<String>,
    pub error_title: Option<String>,
    /// When false a rejection is returned without an error notification
    pub notify_errors: bool,
}

impl WrapOptions {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            success_message: None,
            error_message: error_message.into(),
            success_title: None,
            error_title: None,
            notify_errors: true,
        }
    }

    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn with_titles(mut self, success: impl Into<String>, error: impl Into<String>) -> Self {
        self.success_title = Some(success.into());
        self.error_title = Some(error.into());
        self
    }

    pub fn quiet_errors(mut self) -> Self {
        self.notify_errors = false;
        self
    }
}

/// Wraps remote calls with success/error notifications.
#[derive(Clone)]
pub struct CallWrapper {
    emitter: Arc<dyn NotificationEmitter>,
    settings: NotificationSettings,
}

impl CallWrapper {
    pub fn new(emitter: Arc<dyn NotificationEmitter>, settings: NotificationSettings) -> Self {
        Self { emitter, settings }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Run `call`; publish `success_message` if it resolves, or the
    /// rejection's own message (falling back to `error_message`) if not.
    pub async fn wrap<T, E, F, Fut>(
        &self,
        call: F,
        success_message: Option<&str>,
        error_message: &str,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorMessage,
    {
        let mut options = WrapOptions::new(error_message);
        if let Some(message) = success_message {
            options = options.with_success(message);
        }
        self.wrap_with(call, options).await
    }

    pub async fn wrap_with<T, E, F, Fut>(&self, call: F, options: WrapOptions) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorMessage,
    {
        match call().await {
            Ok(value) => {
                if let Some(message) = options.success_message {
                    let mut payload = NotificationPayload::success(message)
                        .with_duration_ms(self.settings.duration_for(NotificationKind::Success));
                    if let Some(title) = options.success_title {
                        payload = payload.with_title(title);
                    }
                    self.emitter.emit(payload);
                }
                Ok(value)
            }
            Err(err) => {
                let message = err
                    .user_message()
                    .unwrap_or_else(|| options.error_message.clone());

                if err.is_unauthorized() {
                    warn!(status = 401, error = %message, "Remote call rejected as unauthorized");
                } else {
                    warn!(error = %message, "Remote call failed");
                }

                if options.notify_errors {
                    let mut payload = NotificationPayload::error(message)
                        .with_duration_ms(self.settings.duration_for(NotificationKind::Error));
                    if let Some(title) = options.error_title {
                        payload = payload.with_title(title);
                    }
                    self.emitter.emit(payload);
                } else {
                    debug!("Error notification suppressed for this call");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Emitter that records every payload it is given
    #[derive(Default)]
    struct CapturingEmitter {
        seen: Mutex<Vec<NotificationPayload>>,
    }

    impl NotificationEmitter for CapturingEmitter {
        fn emit(&self, payload: NotificationPayload) {
            self.seen.lock().push(payload);
        }
    }

    fn wrapper() -> (CallWrapper, Arc<CapturingEmitter>) {
        let emitter = Arc::new(CapturingEmitter::default());
        (
            CallWrapper::new(emitter.clone(), NotificationSettings::default()),
            emitter,
        )
    }

    #[tokio::test]
    async fn test_success_publishes_once_and_returns_value() {
        let (wrapper, emitter) = wrapper();
        let result: Result<u32, RemoteError> = wrapper
            .wrap(|| async { Ok(42) }, Some("Saved"), "Failed")
            .await;

        assert_eq!(result.unwrap(), 42);
        let seen = emitter.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Success);
        assert_eq!(seen[0].message, "Saved");
        assert_eq!(seen[0].duration_ms, Some(3000));
    }

    #[tokio::test]
    async fn test_success_without_message_is_silent() {
        let (wrapper, emitter) = wrapper();
        let result: Result<Vec<u32>, RemoteError> = wrapper
            .wrap(|| async { Ok(vec![1, 2]) }, None, "Failed")
            .await;

        assert_eq!(result.unwrap(), vec![1, 2]);
        assert!(emitter.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_message_wins_over_fallback() {
        let (wrapper, emitter) = wrapper();
        let original = RemoteError::error("Duplicate name").with_status(409);
        let rejected = original.clone();
        let result: Result<(), RemoteError> = wrapper
            .wrap(move || async move { Err(rejected) }, Some("Saved"), "Failed")
            .await;

        assert_eq!(result.unwrap_err(), original);
        let seen = emitter.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Error);
        assert_eq!(seen[0].message, "Duplicate name");
        assert_eq!(seen[0].duration_ms, Some(5000));
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let (wrapper, emitter) = wrapper();
        let result: Result<(), RemoteError> = wrapper
            .wrap(
                || async { Err(RemoteError::default().with_status(500)) },
                None,
                "Failed",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(emitter.seen.lock()[0].message, "Failed");
    }

    #[tokio::test]
    async fn test_unauthorized_still_notifies() {
        let (wrapper, emitter) = wrapper();
        let result: Result<(), ResourceError> = wrapper
            .wrap(
                || async { Err(RemoteError::message("Session expired").with_status(401).into()) },
                Some("Saved"),
                "Failed",
            )
            .await;

        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(emitter.seen.lock()[0].message, "Session expired");
    }

    #[tokio::test]
    async fn test_quiet_errors_publish_nothing() {
        let (wrapper, emitter) = wrapper();
        let result: Result<(), RemoteError> = wrapper
            .wrap_with(
                || async { Err(RemoteError::message("Network down")) },
                WrapOptions::new("Could not load").quiet_errors(),
            )
            .await;

        assert!(result.is_err());
        assert!(emitter.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_titles_are_attached() {
        let (wrapper, emitter) = wrapper();
        let options = WrapOptions::new("Failed")
            .with_success("Saved")
            .with_titles("Products", "Products");
        let _: Result<(), RemoteError> = wrapper.wrap_with(|| async { Ok(()) }, options).await;

        assert_eq!(emitter.seen.lock()[0].title.as_deref(), Some("Products"));
    }

    #[tokio::test]
    async fn test_custom_durations_from_settings() {
        let emitter = Arc::new(CapturingEmitter::default());
        let settings = NotificationSettings {
            success_duration_ms: 1500,
            ..NotificationSettings::default()
        };
        let wrapper = CallWrapper::new(emitter.clone(), settings);
        let _: Result<(), RemoteError> =
            wrapper.wrap(|| async { Ok(()) }, Some("Saved"), "Failed").await;

        assert_eq!(emitter.seen.lock()[0].duration_ms, Some(1500));
    }
}
