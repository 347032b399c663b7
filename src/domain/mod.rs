//! Pure domain model: entries, documents, projects and clients.
//!
//! No I/O happens here; everything is computed from in-memory values.

pub mod client;
pub mod common;
pub mod document;
pub mod duration;
pub mod entry;
pub mod money;
pub mod project;
pub mod schedule;

pub use client::Client;
pub use common::{Displayable, Identifiable, NamedEntity};
pub use document::{Document, DocumentKind};
pub use duration::WorkDuration;
pub use entry::{
    check_connection, ConnectError, Entry, EntryHeader, FixedEntry, RateEntry, ReferenceEntry,
};
pub use money::{parse_decimal, round_money, round_whole, saturating_div, Edit};
pub use project::Project;
pub use schedule::{ScheduleError, WorkSchedule};
