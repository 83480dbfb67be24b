//! Company records and the collection persisted by the record store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One company row. Field names match the persisted JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Company {
    #[serde(rename = "ID")]
    pub id: String,
    pub company: String,
    pub contact: String,
    pub country: String,
    pub employees: i64,
}

/// Editable fields of a company, as submitted by the row forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyFields {
    pub company: String,
    pub contact: String,
    pub country: String,
    pub employees: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companies {
    #[serde(default)]
    pub companies: Vec<Company>,
}

impl Companies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Company] {
        &self.companies
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    /// 1-based position in storage order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.companies.iter().position(|c| c.id == id).map(|i| i + 1)
    }

    /// Append a new company under a fresh id and return it
    pub fn add(&mut self, fields: CompanyFields) -> Company {
        let company = Company {
            id: Uuid::new_v4().to_string(),
            company: fields.company,
            contact: fields.contact,
            country: fields.country,
            employees: fields.employees,
        };
        self.companies.push(company.clone());
        company
    }

    /// Replace the editable fields of `id`. Returns the updated record.
    pub fn update(&mut self, id: &str, fields: CompanyFields) -> Option<Company> {
        let company = self.companies.iter_mut().find(|c| c.id == id)?;
        company.company = fields.company;
        company.contact = fields.contact;
        company.country = fields.country;
        company.employees = fields.employees;
        Some(company.clone())
    }

    /// Remove `id`. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.companies.len();
        self.companies.retain(|c| c.id != id);
        self.companies.len() != before
    }
}
