//! Wire types shared by the board server and its clients.
//!
//! Everything here is plain serde data: the server converts its database
//! models into these shapes before answering a request or broadcasting an
//! event, and the client caches them verbatim.

pub mod events;
pub mod task;
pub mod user;

pub use events::{
    EVENT_TASK_CREATED, EVENT_TASK_DELETED, EVENT_TASK_MOVED, EVENT_TASK_UPDATED, EventActor,
    TaskBroadcast, TaskDeletedBroadcast, TaskEvent,
};
pub use task::{
    Hosting, PaymentStatus, PublicTaskView, Stage, Subtask, Task, UnknownStage, UptimeStatus,
};
pub use user::{ActivityAction, ActivityEntry, User};
