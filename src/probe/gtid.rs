use super::checker::{ProbeError, SqlProbe};
use super::demotion::quote_literal;
use super::runner::SqlRunner;

pub(crate) fn gtid_subset_query(subset: &str, superset: &str) -> String {
    format!(
        "SELECT GTID_SUBSET({}, {})",
        quote_literal(subset),
        quote_literal(superset)
    )
}

impl<R: SqlRunner> SqlProbe<R> {
    /// Whether every transaction in `subset` is also in `superset`
    pub fn gtid_subset(&self, subset: &str, superset: &str) -> Result<bool, ProbeError> {
        let query = gtid_subset_query(subset, superset);
        let value = self
            .query_value(&query)
            .map_err(|e| ProbeError::sql(query.as_str(), e))?;

        match value.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(ProbeError::UnexpectedValue {
                variable: "gtid_subset",
                value,
            }),
        }
    }
}
