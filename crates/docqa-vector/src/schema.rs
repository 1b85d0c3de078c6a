use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Chunk rows. `metadata` holds the full metadata map as JSON; `source` and
/// `doc_type` are duplicated out of it for inspection with external tools.
pub fn build_chunks_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("position", DataType::Int64, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("doc_type", DataType::Utf8, true),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
