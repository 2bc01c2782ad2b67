use std::sync::Arc;

use arrow::array::builder::{BinaryBuilder, StringBuilder};
use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::data_store::record::Record;
use crate::errors::Result;
use crate::storage::{RecordStore, ScanRange};

/// Schema of a flattened record dump: one row per stored cell.
pub fn cell_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("row", DataType::Utf8, false),
        Field::new("family", DataType::Utf8, false),
        Field::new("qualifier", DataType::Utf8, false),
        Field::new("value", DataType::Binary, false),
    ]))
}

/// Flattens records into a [`RecordBatch`] with one row per cell, in record
/// order and then column order.
pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch> {
    let cells: usize = records.iter().map(Record::len).sum();
    let mut rows = StringBuilder::with_capacity(cells, cells * 16);
    let mut families = StringBuilder::with_capacity(cells, cells * 8);
    let mut qualifiers = StringBuilder::with_capacity(cells, cells * 8);
    let mut values = BinaryBuilder::with_capacity(cells, cells * 16);

    for record in records {
        for (column, value) in record.columns() {
            rows.append_value(record.row());
            families.append_value(&column.family);
            qualifiers.append_value(&column.qualifier);
            values.append_value(value);
        }
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(rows.finish()),
        Arc::new(families.finish()),
        Arc::new(qualifiers.finish()),
        Arc::new(values.finish()),
    ];
    Ok(RecordBatch::try_new(cell_schema(), arrays)?)
}

/// Dumps every cell of `store` within `range`, e.g. to inspect FATE or tablet
/// records in tests and tools.
pub fn dump_store(store: &dyn RecordStore, range: &ScanRange) -> Result<RecordBatch> {
    let records = store.scan(range)?.collect::<Result<Vec<_>>>()?;
    records_to_batch(&records)
}
