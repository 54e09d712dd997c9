//! Change listeners keyed by field path

use super::field_error::FieldError;
use super::path::FieldPath;
use serde_json::Value;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What changed at a path
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    Value(Value),
    Error(Option<FieldError>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub path: FieldPath,
    pub kind: ChangeKind,
}

type Listener = Box<dyn FnMut(&FieldChange) + Send>;

struct Subscription {
    id: SubscriptionId,
    /// `None` watches the whole form
    path: Option<FieldPath>,
    listener: Listener,
}

#[derive(Default)]
pub struct Subscriptions {
    next_id: u64,
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub fn subscribe(
        &mut self,
        path: Option<FieldPath>,
        listener: impl FnMut(&FieldChange) + Send + 'static,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Subscription {
            id,
            path,
            listener: Box::new(listener),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        self.entries.len() != before
    }

    /// Invoke every listener whose path overlaps the changed path
    pub fn notify(&mut self, change: &FieldChange) {
        for subscription in &mut self.entries {
            let relevant = subscription
                .path
                .as_ref()
                .map_or(true, |path| path.overlaps(&change.path));
            if relevant {
                (subscription.listener)(change);
            }
        }
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("len", &self.entries.len())
            .finish()
    }
}
