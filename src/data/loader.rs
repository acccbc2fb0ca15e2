use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::Value as JsonValue;

use super::entry::Entry;
use super::model::{RawRecord, RecordTemplate};
use super::schema::adapt;
use crate::config::Config;
use crate::error::{Error, Result};

/// Arrow field metadata key holding a column's current unit.
pub const UNIT_KEY: &str = "unit";
/// Arrow field metadata key holding a column's original unit.
pub const ORIGINAL_UNIT_KEY: &str = "original_unit";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Build a record from a datapackage descriptor and the CSV data of its
/// resource. Locating both is up to the caller.
pub fn load_record<R: Read>(
    descriptor: &JsonValue,
    csv_data: R,
    config: &Config,
) -> Result<RawRecord> {
    read_csv(adapt(descriptor, config)?, csv_data)
}

/// Same as [`load_record`] with the descriptor given as JSON text.
pub fn load_record_from_str<R: Read>(
    descriptor: &str,
    csv_data: R,
    config: &Config,
) -> Result<RawRecord> {
    let descriptor: JsonValue = serde_json::from_str(descriptor)?;
    load_record(&descriptor, csv_data, config)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row naming every schema field (in any order), one
/// numeric cell per field and row:
///
/// ```text
/// t,E,j
/// 0.0,-0.103,-0.998
/// 0.02,-0.102,-0.981
/// ```
pub fn read_csv<R: Read>(template: RecordTemplate, csv_data: R) -> Result<RawRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_data);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let positions = template
        .fields
        .iter()
        .map(|field| {
            headers.iter().position(|h| *h == field.name).ok_or_else(|| {
                Error::schema(format!(
                    "{}: CSV missing '{}' column",
                    template.identifier, field.name
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(extra) = headers
        .iter()
        .find(|h| !template.fields.iter().any(|f| f.name == **h))
    {
        return Err(Error::schema(format!(
            "{}: CSV column '{extra}' has no field description",
            template.identifier
        )));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); positions.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        for (column, (&idx, field)) in columns
            .iter_mut()
            .zip(positions.iter().zip(&template.fields))
        {
            let cell = record.get(idx).unwrap_or("");
            column.push(parse_float(cell, row_no, &field.name)?);
        }
    }

    Ok(template.bind(columns))
}

fn parse_float(s: &str, row: usize, col: &str) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|_| Error::schema(format!("Row {row}, {col}: '{s}' is not a number")))
}

// ---------------------------------------------------------------------------
// Arrow
// ---------------------------------------------------------------------------

/// Bind the columns of an Arrow record batch to a template. Every field of
/// the template must be a numeric column of the batch; nulls become NaN.
pub fn from_record_batch(template: RecordTemplate, batch: &RecordBatch) -> Result<RawRecord> {
    let schema = batch.schema();
    let columns = template
        .fields
        .iter()
        .map(|field| {
            let idx = schema.index_of(&field.name).map_err(|_| {
                Error::schema(format!(
                    "{}: record batch missing '{}' column",
                    template.identifier, field.name
                ))
            })?;
            extract_f64_column(batch.column(idx))
                .map_err(|e| Error::schema(format!("{}: '{}': {e}", template.identifier, field.name)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(template.bind(columns))
}

/// Export an entry's table as Float64 columns. Each Arrow field carries the
/// column's units under [`UNIT_KEY`] and [`ORIGINAL_UNIT_KEY`].
pub fn to_record_batch(entry: &Entry) -> Result<RecordBatch> {
    let fields: Vec<Field> = entry
        .fields()
        .iter()
        .map(|field| {
            Field::new(field.name(), DataType::Float64, false).with_metadata(HashMap::from([
                (UNIT_KEY.to_string(), field.unit().to_string()),
                (ORIGINAL_UNIT_KEY.to_string(), field.original_unit().to_string()),
            ]))
        })
        .collect();

    let columns = entry
        .fields()
        .iter()
        .map(|field| {
            let values = entry.column(field.name())?;
            Ok(Arc::new(Float64Array::from(values.to_vec())) as ArrayRef)
        })
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(entry.table().n_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

/// Extract a `Vec<f64>` from a numeric Arrow column.
fn extract_f64_column(col: &ArrayRef) -> Result<Vec<f64>> {
    let mismatch = || Error::schema(format!("unexpected array for {:?}", col.data_type()));
    match col.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(mismatch)?;
            Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(mismatch)?;
            Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(mismatch)?;
            Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(mismatch)?;
            Ok(arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect())
        }
        other => Err(Error::schema(format!(
            "expected a numeric column, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{MetadataValue, RawField};
    use serde_json::json;

    const DESCRIPTOR: &str = r#"{
        "name": "alves_2011_electrochemistry_6010_f1a_solid",
        "resources": [{
            "name": "echemdb",
            "schema": {"fields": [
                {"name": "t", "type": "number", "unit": "s"},
                {"name": "E", "type": "number", "unit": "V", "reference": "RHE"},
                {"name": "j", "type": "number", "unit": "A / m2"}
            ]},
            "metadata": {"echemdb": {
                "system": {"electrodes": [{"name": "WE", "material": "Ru"}]},
                "source": {"citation key": "alves_2011_electrochemistry_6010"},
                "figure description": {"fields": [
                    {"name": "t", "unit": "s"},
                    {"name": "E", "unit": "V"},
                    {"name": "j", "unit": "mA / cm2"}
                ]}
            }}
        }]
    }"#;

    fn template() -> RecordTemplate {
        RecordTemplate {
            identifier: "sample".to_string(),
            metadata: MetadataValue::from(&json!({
                "system": {"electrodes": []},
                "source": {"citation key": "sample"},
            })),
            fields: vec![
                RawField::new("E", "V").original_unit("mV"),
                RawField::new("j", "A / m2"),
            ],
        }
    }

    #[test]
    fn test_load_record_from_csv() {
        let csv_data = "t, E, j\n0.0, -0.103, -0.998\n0.02, -0.102, -0.981\n";
        let record =
            load_record_from_str(DESCRIPTOR, csv_data.as_bytes(), &Config::default()).unwrap();
        assert_eq!(record.identifier, "alves_2011_electrochemistry_6010_f1a_solid");
        assert_eq!(record.columns[1], vec![-0.103, -0.102]);
        assert_eq!(record.columns[2], vec![-0.998, -0.981]);

        let entry = Entry::from_record(record).unwrap();
        assert_eq!(entry.field("j").unwrap().original_unit(), "mA / cm2");
    }

    #[test]
    fn test_csv_column_order_follows_schema() {
        let record = read_csv(template(), "j,E\n1.5,0.25\n".as_bytes()).unwrap();
        assert_eq!(record.columns, vec![vec![0.25], vec![1.5]]);
    }

    #[test]
    fn test_csv_errors() {
        assert!(matches!(
            read_csv(template(), "E\n0.1\n".as_bytes()),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            read_csv(template(), "E,j,x\n0.1,0.2,0.3\n".as_bytes()),
            Err(Error::Schema(_))
        ));
        let err = read_csv(template(), "E,j\n0.1,abc\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Row 0, j: 'abc'"));
    }

    #[test]
    fn test_invalid_descriptor_json() {
        assert!(matches!(
            load_record_from_str("{", "".as_bytes(), &Config::default()),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_record_batch_round_trip() {
        let record = read_csv(template(), "E,j\n0.1,1.0\n0.2,2.0\n".as_bytes()).unwrap();
        let entry = Entry::from_record(record).unwrap();
        let batch = to_record_batch(&entry).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            batch.schema().field(0).metadata().get(ORIGINAL_UNIT_KEY),
            Some(&"mV".to_string())
        );

        let back = from_record_batch(template(), &batch).unwrap();
        assert_eq!(back.columns, vec![vec![0.1, 0.2], vec![1.0, 2.0]]);
    }

    #[test]
    fn test_record_batch_integer_and_null_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("E", DataType::Int32, false),
            Field::new("j", DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(Float32Array::from(vec![Some(0.5), None])) as ArrayRef,
            ],
        )
        .unwrap();
        let record = from_record_batch(template(), &batch).unwrap();
        assert_eq!(record.columns[0], vec![1.0, 2.0]);
        assert_eq!(record.columns[1][0], 0.5);
        assert!(record.columns[1][1].is_nan());
    }
}
