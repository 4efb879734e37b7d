//! Column, name and table standardization across national schemas.

pub mod cleaner;
pub mod columns;
pub mod names;
pub mod scope;

pub use cleaner::{clean_abs_table, filter_by_names};
pub use columns::{auto_standardize, name_mapping, standardize_columns};
pub use names::{sanitize_legal_name, split_name, title_case};
pub use scope::{gccsa_codes, CapitalCity, CAPITALS};
