use super::{checked_ident, WarehouseStore};
use crate::{
    error::{GenError, GenResult},
    sink::{ConflictSkipSink, TableRef},
};
use rusqlite::types::Value;

fn conflict_skip_sql(table: TableRef, columns: &[&str], primary_key: &[&str]) -> GenResult<String> {
    let schema = checked_ident(table.schema)?;
    let name = checked_ident(table.table)?;
    let cols = columns
        .iter()
        .map(|c| checked_ident(c))
        .collect::<GenResult<Vec<_>>>()?;
    let keys = primary_key
        .iter()
        .map(|k| checked_ident(k))
        .collect::<GenResult<Vec<_>>>()?;
    if keys.is_empty() {
        return Err(GenError::InvalidConfig(format!("{table}: empty primary key")));
    }
    let placeholders = (1..=cols.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {schema}.{name} ({}) VALUES ({placeholders})
         ON CONFLICT({}) DO NOTHING",
        cols.join(", "),
        keys.join(", ")
    ))
}

impl ConflictSkipSink for WarehouseStore {
    /// One transaction per call: the whole chunk commits or none of it.
    fn insert_ignoring_duplicates(
        &self,
        table: TableRef,
        columns: &[&str],
        primary_key: &[&str],
        rows: &[Vec<Value>],
    ) -> GenResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = conflict_skip_sql(table, columns, primary_key)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(GenError::InvalidConfig(format!(
                        "{table}: row has {} values for {} columns",
                        row.len(),
                        columns.len()
                    )));
                }
                inserted += stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn truncate(&self, tables: &[TableRef]) -> GenResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for t in tables {
            let sql = format!(
                "DELETE FROM {}.{}",
                checked_ident(t.schema)?,
                checked_ident(t.table)?
            );
            let removed = tx.execute(&sql, [])?;
            log::info!("{t}: truncated {removed} rows");
        }
        tx.commit()?;
        Ok(())
    }
}
