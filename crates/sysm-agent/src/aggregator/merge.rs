use sysm_types::{ServiceEntry, StatusRecord};

/// Folds the records of every backend behind one service into its payload
/// entry.
///
/// The service is online only if all of them are. Status comes from the
/// first offline record (or the first record when all are online), error and
/// extra from the first record that carries one.
pub fn merge_records(id: &str, records: &[&StatusRecord]) -> Option<ServiceEntry> {
    let first = *records.first()?;
    if records.len() == 1 {
        return Some(ServiceEntry::from_record(id, first));
    }

    let online = records.iter().all(|r| r.is_online());
    let status = records
        .iter()
        .find(|r| !r.is_online())
        .copied()
        .unwrap_or(first)
        .status_text()
        .to_string();

    Some(ServiceEntry {
        id: id.to_string(),
        online,
        status,
        error: records.iter().find_map(|r| r.error()).cloned(),
        extra: records.iter().find_map(|r| r.extra()).cloned(),
    })
}
