//! Ticket request document (`loginTicketRequest`).

use chrono::{DateTime, Duration, FixedOffset};
use quick_xml::escape::escape;

use crate::clock::Clock;

/// Default clock skew tolerance, in minutes.
pub const DEFAULT_SKEW_MINUTES: u32 = 10;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A time-windowed request for a ticket to access one service.
///
/// The window opens `skew` before now and closes `skew` after now, so a
/// remote clock that is off by less than `skew` still accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    pub unique_id: String,
    pub generation_time: DateTime<FixedOffset>,
    pub expiration_time: DateTime<FixedOffset>,
    pub service: String,
}

impl TicketRequest {
    pub fn build(service_name: &str, clock: &dyn Clock, skew_minutes: u32) -> Self {
        let skew = Duration::minutes(i64::from(skew_minutes));
        let generation_time = clock.now() - skew;
        let expiration_time = generation_time + skew * 2;

        Self {
            unique_id: generation_time.format("%y%m%d").to_string(),
            generation_time,
            expiration_time,
            service: service_name.to_string(),
        }
    }

    /// Render the request document. Times are written as local wall time
    /// with second precision and no offset suffix.
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                "\n",
                r#"<loginTicketRequest version="1.0">"#,
                "\n\t<header>",
                "\n\t\t<uniqueId>{unique_id}</uniqueId>",
                "\n\t\t<generationTime>{generation}</generationTime>",
                "\n\t\t<expirationTime>{expiration}</expirationTime>",
                "\n\t</header>",
                "\n\t<service>{service}</service>",
                "\n</loginTicketRequest>"
            ),
            unique_id = self.unique_id,
            generation = self.generation_time.format(LOCAL_TIME_FORMAT),
            expiration = self.expiration_time.format(LOCAL_TIME_FORMAT),
            service = escape(self.service.as_str()),
        )
    }
}
