use super::table_definition;
use crate::backend::{batched_scan, take_rows, EngineTransaction, Rows, ScanVisitor};
use crate::error::{IsoDbError, IsoDbResult};
use crate::range::{Direction, NativeRange};
use log::debug;
use redb::{ReadTransaction, ReadableTable, TableError, WriteTransaction};
use std::ops::Bound;
use std::time::Instant;

/// A read-only or read-write redb transaction.
#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

fn fetch_from<T>(
    table: &T,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    direction: Direction,
    limit: usize,
) -> IsoDbResult<Rows>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let range = table.range::<&[u8]>((lower, upper))?;
    let rows = range.map(|row| {
        row.map(|(k, v)| (k.value().to_vec(), v.value().to_vec()))
            .map_err(IsoDbError::from)
    });
    match direction {
        Direction::Forward => take_rows(rows, limit),
        Direction::Reverse => take_rows(rows.rev(), limit),
    }
}

impl RedbTransaction {
    fn fetch(
        &self,
        namespace: &str,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        limit: usize,
    ) -> IsoDbResult<Rows> {
        let def = table_definition(namespace);
        match self {
            RedbTransaction::Read(tx) => match tx.open_table(def) {
                Ok(table) => fetch_from(&table, lower, upper, direction, limit),
                Err(TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            },
            RedbTransaction::Write(tx) => {
                let table = tx.open_table(def)?;
                fetch_from(&table, lower, upper, direction, limit)
            }
        }
    }
}

impl EngineTransaction for RedbTransaction {
    fn is_read_only(&self) -> bool {
        matches!(self, RedbTransaction::Read(_))
    }

    fn get(&self, namespace: &str, key: &[u8]) -> IsoDbResult<Option<Vec<u8>>> {
        let def = table_definition(namespace);
        match self {
            RedbTransaction::Read(tx) => match tx.open_table(def) {
                Ok(table) => Ok(table.get(key)?.map(|v| v.value().to_vec())),
                Err(TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(e.into()),
            },
            RedbTransaction::Write(tx) => {
                let table = tx.open_table(def)?;
                Ok(table.get(key)?.map(|v| v.value().to_vec()))
            }
        }
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> IsoDbResult<()> {
        let RedbTransaction::Write(tx) = self else {
            return Err(IsoDbError::ReadOnly);
        };
        let mut table = tx.open_table(table_definition(namespace))?;
        table.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> IsoDbResult<bool> {
        let RedbTransaction::Write(tx) = self else {
            return Err(IsoDbError::ReadOnly);
        };
        let mut table = tx.open_table(table_definition(namespace))?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }

    fn clear(&self, namespace: &str) -> IsoDbResult<()> {
        let RedbTransaction::Write(tx) = self else {
            return Err(IsoDbError::ReadOnly);
        };
        let def = table_definition(namespace);
        tx.delete_table(def)?;
        tx.open_table(def)?;
        Ok(())
    }

    fn scan(
        &self,
        namespace: &str,
        range: &NativeRange,
        visit: &mut ScanVisitor<'_>,
    ) -> IsoDbResult<()> {
        batched_scan(
            range,
            |lower, upper, direction, limit| self.fetch(namespace, lower, upper, direction, limit),
            visit,
        )
    }

    fn commit(self) -> IsoDbResult<()> {
        match self {
            RedbTransaction::Read(_) => Ok(()),
            RedbTransaction::Write(tx) => {
                let start = Instant::now();
                tx.commit()?;
                debug!("RedbTransaction: Committed in {:?}", start.elapsed());
                Ok(())
            }
        }
    }

    fn rollback(self) -> IsoDbResult<()> {
        match self {
            RedbTransaction::Read(_) => Ok(()),
            RedbTransaction::Write(tx) => {
                tx.abort()?;
                debug!("RedbTransaction: Rolled back");
                Ok(())
            }
        }
    }
}
