use anyhow::{bail, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub trait BatchSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// Parquet writer that can be finished exactly once.
///
/// Dropping an unfinished sink closes the underlying handle without writing a
/// footer, so the file it leaves behind is not a valid parquet file.
pub struct ParquetSink<W: Write + Send> {
    writer: Option<ArrowWriter<W>>,
    rows: usize,
}

impl ParquetSink<File> {
    pub fn create(
        path: impl AsRef<Path>,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(file, schema, props)
    }
}

impl<W: Write + Send> ParquetSink<W> {
    pub fn from_writer(
        writer: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        let writer = ArrowWriter::try_new(writer, Arc::clone(&schema), props)?;
        Ok(Self {
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

impl<W: Write + Send> BatchSink for ParquetSink<W> {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            bail!("parquet sink is closed");
        };
        writer.write(&batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch(schema: &SchemaRef, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(Arc::clone(schema), vec![Arc::new(Int64Array::from(values))])
            .expect("batch")
    }

    #[test]
    fn counts_rows_and_rejects_writes_after_finish() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let mut sink = ParquetSink::from_writer(Vec::new(), Arc::clone(&schema), None)
            .expect("sink");

        sink.write_batch(batch(&schema, vec![1, 2, 3])).expect("write");
        sink.write_batch(batch(&schema, vec![4])).expect("write");
        assert_eq!(sink.rows_written(), 4);

        sink.finish().expect("finish");
        sink.finish().expect("second finish is a no-op");
        let err = sink.write_batch(batch(&schema, vec![5])).unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
