//! iCalendar encoding and decoding.

pub mod encode;
pub mod generate;
pub mod parse;

pub use encode::{ALARM_MINUTES, EncodeContext, encode_event, is_contiguous_run};
pub use generate::{NAME_PROPERTY, PRODID, generate_calendar, generate_ics};
pub use parse::{parse_event, parse_events};
