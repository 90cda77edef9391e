use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod parsed;

use parsed::ParsedRecord;

/// Derive `aggrel::types::Record` from `#[aggrel(...)]` attributes.
///
/// Container:
/// - `collection = "name"` - collection the records are stored in
///
/// Fields:
/// - `id` - primary key (`String` or `Option<String>`)
/// - `parent` - parent reference for hierarchy and path queries
/// - `local_key = "path"` - this record holds the related id(s) at `path`
/// - `foreign_key = "path"` - related records hold this record's id at `path`
///
/// Document field names follow `#[serde(rename)]` and `#[serde(rename_all)]`.
///
/// ```text
/// #[derive(Record, Serialize, Deserialize)]
/// #[aggrel(collection = "requests")]
/// struct RequestJoined {
///     #[aggrel(id)]
///     #[serde(rename = "_id")]
///     id: String,
///     #[aggrel(local_key = "user_id")]
///     user: Option<User>,
///     #[aggrel(foreign_key = "request_id")]
///     details: Vec<RequestDetail>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(aggrel))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedRecord::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}
