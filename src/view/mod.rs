//! Turning company records into HTML fragments.

mod table;
mod templates;

pub use table::{CompaniesTable, CompanyRow, SortColumn, SortDirection};
pub use templates::Templates;
