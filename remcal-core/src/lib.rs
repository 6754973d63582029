//! Bridge between Remind scripts and iCalendar.
//!
//! Reading runs Remind over a script, groups the reported occurrences by the
//! line that produced them and encodes each group as a VEVENT. Writing goes
//! the other way: a VEVENT is turned into a `REM` line and appended to the
//! script. Results are cached until one of the files involved changes.

pub mod aggregate;
pub mod cache;
pub mod collection;
pub mod config;
pub mod deletion;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod ics;
pub mod identity;
pub mod occurrence;
pub mod recurrence;
pub mod script;
pub mod source;

pub use cache::{CalendarObject, SourceCache};
pub use collection::{Collection, RemindCollection};
pub use config::RemcalConfig;
pub use deletion::RemoveOutcome;
pub use error::{RemcalError, RemcalResult};
pub use evaluator::{Evaluator, RemindEvaluator};
pub use event::*;
pub use script::ScriptOptions;
