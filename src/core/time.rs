use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Database timestamps are stored without an offset and always mean UTC.
pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    let utc = value.assume_utc();
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, Time};

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, Month::September, 1).unwrap();
        let time = Time::from_hms(8, 30, 0).unwrap();
        assert_eq!(format_primitive(PrimitiveDateTime::new(date, time)), "2025-09-01T08:30:00Z");
    }

    #[test]
    fn primitive_now_is_close_to_offset_now() {
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let now = primitive_now_utc().assume_utc().unix_timestamp();
        assert!((now - before).abs() <= 1);
    }
}
