//! Native dialog handling (alert, confirm, prompt, beforeunload).
//!
//! The only supported policy is "accept the next dialog if one shows up
//! within a short window". [`DialogWaiter::accept_within`] never fails: a
//! dialog that does not appear, or a session that goes away while waiting,
//! both count as "no dialog".

use crate::result::HarnessResult;
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl fmt::Display for DialogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// A dialog that was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    dialog_type: DialogType,
    message: String,
}

impl Dialog {
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn confirm(message: impl Into<String>) -> Self {
        Self::new(DialogType::Confirm, message)
    }

    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Pending acceptance of the next dialog, produced by
/// [`BrowserDriver::arm_dialog`](crate::driver::BrowserDriver::arm_dialog).
///
/// Dropping the waiter disarms it.
pub struct DialogWaiter {
    accept: BoxFuture<'static, HarnessResult<Dialog>>,
}

impl DialogWaiter {
    /// Wrap a future that resolves once a dialog has been accepted
    pub fn new(accept: BoxFuture<'static, HarnessResult<Dialog>>) -> Self {
        Self { accept }
    }

    /// Wait for the dialog without a bound
    pub async fn accept(self) -> HarnessResult<Dialog> {
        self.accept.await
    }

    /// Race the acceptance against `window`. `None` when no dialog was
    /// accepted in time.
    pub async fn accept_within(self, window: Duration) -> Option<Dialog> {
        match tokio::time::timeout(window, self.accept).await {
            Ok(Ok(dialog)) => {
                debug!("Accepted {} dialog: {}", dialog.dialog_type(), dialog.message());
                Some(dialog)
            }
            Ok(Err(e)) => {
                warn!("Dialog wait ended without a dialog: {}", e);
                None
            }
            Err(_) => {
                debug!("No dialog within {:?}", window);
                None
            }
        }
    }
}

impl fmt::Debug for DialogWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogWaiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::HarnessError;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_accept_within_returns_dialog() {
        let waiter = DialogWaiter::new(async { Ok(Dialog::confirm("¿Cerrar sesión?")) }.boxed());
        let dialog = waiter.accept_within(Duration::from_millis(100)).await.unwrap();
        assert_eq!(dialog.dialog_type(), DialogType::Confirm);
        assert_eq!(dialog.message(), "¿Cerrar sesión?");
    }

    #[tokio::test]
    async fn test_accept_within_times_out() {
        let waiter = DialogWaiter::new(futures::future::pending().boxed());
        assert!(waiter.accept_within(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_accept_within_swallows_errors() {
        let waiter = DialogWaiter::new(
            async {
                Err(HarnessError::Page {
                    message: "target closed".to_string(),
                })
            }
            .boxed(),
        );
        assert!(waiter.accept_within(Duration::from_millis(100)).await.is_none());
    }

    #[test]
    fn test_dialog_type_display() {
        assert_eq!(DialogType::BeforeUnload.to_string(), "beforeunload");
    }
}
