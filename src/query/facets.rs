use crate::types::FacetCounts;

/// Append a zero count for every vocabulary value the engine did not report.
///
/// Engine counts keep their order; the zero entries follow in vocabulary order.
/// Fields requested but absent from the engine reply get an entry as well.
pub fn add_zero_counts<F>(counts: &mut FacetCounts, fields: &[String], vocabulary: F)
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    for field in fields {
        let entry = counts.entry(field.clone()).or_default();
        let Some(values) = vocabulary(field) else {
            continue;
        };
        for value in values {
            entry.entry(value).or_insert(0);
        }
    }
}
