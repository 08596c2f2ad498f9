//! Notification Hook
//!
//! Activation notifications (e.g. emails) sent by the parent account system.

use std::sync::Mutex;

use crate::types::User;

/// Notification hook interface.
pub trait NotificationHook: Send + Sync {
    /// A new user must activate their account.
    fn on_activation_required(&self, user: &User);

    /// A user has been activated.
    fn on_activation_succeeded(&self, user: &User);
}

/// Hook that sends nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotificationHook;

impl NotificationHook for NoOpNotificationHook {
    fn on_activation_required(&self, _user: &User) {}
    fn on_activation_succeeded(&self, _user: &User) {}
}

/// Kind of notification delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    ActivationRequired,
    ActivationSucceeded,
}

/// Hook recording every delivery, for tests.
#[derive(Default)]
pub struct RecordingNotificationHook {
    deliveries: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotificationHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, user id)` of every delivery, in order.
    pub fn deliveries(&self) -> Vec<(NotificationKind, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn record(&self, kind: NotificationKind, user: &User) {
        self.deliveries.lock().unwrap().push((kind, user.id.clone()));
    }
}

impl NotificationHook for RecordingNotificationHook {
    fn on_activation_required(&self, user: &User) {
        self.record(NotificationKind::ActivationRequired, user);
    }

    fn on_activation_succeeded(&self, user: &User) {
        self.record(NotificationKind::ActivationSucceeded, user);
    }
}
