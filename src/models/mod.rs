pub mod loaders;
pub mod record;
pub mod tax_category;

pub use loaders::{RecordSource, TomlRecordStore};
pub use record::{normalize_tax_id, Record};
pub use tax_category::{DocumentSubtype, TaxCategory};
