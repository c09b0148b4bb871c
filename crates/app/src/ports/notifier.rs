//! Notification port: user-facing messages.

use std::fmt;
use std::future::Future;

use irrigo_domain::error::IrrigoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    General,
    Error,
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => f.write_str("general"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Delivers notifications to the operator.
pub trait Notifier {
    fn notify(
        &self,
        message: &str,
        title: &str,
        category: NotificationCategory,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn notify(
        &self,
        message: &str,
        title: &str,
        category: NotificationCategory,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        (**self).notify(message, title, category)
    }
}

/// Writes notifications to the log instead of delivering them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        message: &str,
        title: &str,
        category: NotificationCategory,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        match category {
            NotificationCategory::General => tracing::info!(%title, %message, "notification"),
            NotificationCategory::Error => tracing::warn!(%title, %message, "notification"),
        }
        async { Ok(()) }
    }
}
