use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, RecordBatch, RecordBatchOptions};
use arrow::datatypes::{DataType, Field, Schema};

use crate::chain::Chain;
use crate::{InferenceError, Result};

impl Chain {
    /// Export the draws as an arrow record batch.
    ///
    /// There is one `Float64` column per parameter, named by `names`, and a
    /// final `logp` column with the log-density of every draw.
    pub fn to_record_batch(&self, names: &[String]) -> Result<RecordBatch> {
        InferenceError::check_len("trace column names", self.dim(), names.len())?;

        let mut builders: Vec<Float64Builder> = (0..self.dim())
            .map(|_| Float64Builder::with_capacity(self.len()))
            .collect();
        for draw in self.draws() {
            for (builder, &val) in builders.iter_mut().zip(draw) {
                builder.append_value(val);
            }
        }
        let mut logp = Float64Builder::with_capacity(self.len());
        logp.append_slice(self.logp());

        let mut fields: Vec<Field> = names
            .iter()
            .map(|name| Field::new(name, DataType::Float64, false))
            .collect();
        fields.push(Field::new("logp", DataType::Float64, false));

        let mut columns: Vec<ArrayRef> = builders
            .into_iter()
            .map(|mut builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        columns.push(Arc::new(logp.finish()));

        let options = RecordBatchOptions::new().with_row_count(Some(self.len()));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;
        Ok(batch)
    }
}
