//! Counters for permission decisions.

pub fn record_allowed() {
    metrics::counter!("permission_allowed", 1);
}

pub fn record_denied() {
    metrics::counter!("permission_denied", 1);
}

pub fn record_vacation_denied() {
    metrics::counter!("permission_vacation_denied", 1);
}

pub fn record_unmapped_connector() {
    metrics::counter!("unmapped_connector", 1);
}
