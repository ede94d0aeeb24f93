//! `cadence-schedules`: CRUD and synchronization logic for Schedule entities.
//!
//! # Overview
//!
//! [`ScheduleService`] is registered on the broker under the `schedules`
//! nature. Each inbound command is validated against the [`model`] field
//! table of its [`Operation`], acknowledged if it came from a work queue,
//! persisted through a `dbinterface` command and, for writes, broadcast to
//! peer instances on the synchronization topic.
//!
//! # Operations
//!
//! | Quality              | Key            | Synchronized as |
//! |----------------------|----------------|-----------------|
//! | `create`             | generated `id` | `create`        |
//! | `update`             | `id`           | `update`        |
//! | `updatebyobjidtype`  | `objId`+`type` | `update`        |
//! | `upsertbyobjidtype`  | `objId`+`type` | `update`        |
//! | `delete`             | `id`           | `delete`        |
//! | `deletebyobjidtype`  | `objId`+`type` | `delete`        |
//! | `findbyid`           | `id`           | no              |
//! | `findbyobjidtype`    | `objId`+`type` | no              |
//! | `find`               | filter         | no              |

pub mod acknowledge;
pub mod error;
pub mod model;
pub mod operation;
pub mod service;
pub mod synchronizer;

pub use error::{Result, ScheduleError, ValidationError};
pub use model::{FieldTable, Rest, Schedule, Trigger};
pub use operation::Operation;
pub use service::ScheduleService;
