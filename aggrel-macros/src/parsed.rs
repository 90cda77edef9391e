mod field;
mod record;
mod serde_names;

pub(crate) use record::ParsedRecord;
