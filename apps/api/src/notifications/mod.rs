// Client-side notification core: toast store, overflow queue, auto-dismiss
// timers, and the live-update push channel that feeds them.
// Everything here is driven from a mounted NotificationContext.

pub mod activity;
pub mod channel;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod metadata;
pub mod model;
pub mod store;
pub mod timers;

pub use activity::{ActivityEntry, ActivityReporter, ActivitySink, HttpActivitySink, NoopActivitySink};
pub use channel::{ChannelHandle, ChannelState, LiveUpdateChannel};
pub use context::NotificationContext;
pub use dispatcher::Dispatcher;
pub use envelope::PushEnvelope;
pub use metadata::{MetaValue, Metadata};
pub use model::{
    Notification, NotificationAction, NotificationKind, NotificationSnapshot, NotificationSpec,
    ToastPosition,
};
pub use store::{NotificationStore, StoreOptions};
