// Activity log: the sink that clients report shown notifications to, and the
// read side behind the dashboard activity feed.

pub mod handlers;
pub mod repository;

pub use repository::{ActivityRepository, InMemoryActivityRepository, PgActivityRepository};
