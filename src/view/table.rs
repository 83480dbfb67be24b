use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Companies, Company};

/// Column the table is ordered by. Unknown names fall back to `ID`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortColumn {
    #[default]
    Id,
    Company,
    Contact,
    Country,
    Employees,
}

impl SortColumn {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Company") => Self::Company,
            Some("Contact") => Self::Contact,
            Some("Country") => Self::Country,
            Some("Employees") => Self::Employees,
            _ => Self::Id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Company => "Company",
            Self::Contact => "Contact",
            Self::Country => "Country",
            Self::Employees => "Employees",
        }
    }

    fn compare(&self, a: &Company, b: &Company) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Company => a.company.cmp(&b.company),
            Self::Contact => a.contact.cmp(&b.contact),
            Self::Country => a.country.cmp(&b.country),
            Self::Employees => a.employees.cmp(&b.employees),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: Option<&str>) -> Self {
        // Anything but an explicit ascending request sorts descending
        match value {
            None | Some("") | Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A company together with its 1-based position in the rendered table
#[derive(Debug, Clone, Serialize)]
pub struct CompanyRow {
    pub company: Company,
    pub ordinal_id: usize,
}

/// Everything the table templates need
#[derive(Debug, Clone, Serialize)]
pub struct CompaniesTable {
    pub companies: Vec<CompanyRow>,
    pub sort_column: &'static str,
    pub sort_dir: &'static str,
}

impl CompaniesTable {
    /// Sort `companies` and number the rows in display order
    pub fn build(companies: &Companies, column: SortColumn, direction: SortDirection) -> Self {
        let mut sorted: Vec<Company> = companies.all().to_vec();
        sorted.sort_by(|a, b| {
            let ordering = column.compare(a, b);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let rows = sorted
            .into_iter()
            .enumerate()
            .map(|(i, company)| CompanyRow {
                company,
                ordinal_id: i + 1,
            })
            .collect();

        Self {
            companies: rows,
            sort_column: column.as_str(),
            sort_dir: direction.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompanyFields;

    fn sample() -> Companies {
        let mut companies = Companies::new();
        for (name, employees) in [("Initech", 40), ("Acme", 300), ("Globex", 12)] {
            companies.add(CompanyFields {
                company: name.to_string(),
                contact: String::new(),
                country: String::new(),
                employees,
            });
        }
        companies
    }

    #[test]
    fn test_sort_by_name_ascending() {
        let table = CompaniesTable::build(&sample(), SortColumn::Company, SortDirection::Asc);
        let names: Vec<_> = table.companies.iter().map(|r| r.company.company.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Globex", "Initech"]);
        let ordinals: Vec<_> = table.companies.iter().map(|r| r.ordinal_id).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_by_employees_descending() {
        let table = CompaniesTable::build(&sample(), SortColumn::Employees, SortDirection::Desc);
        let counts: Vec<_> = table.companies.iter().map(|r| r.company.employees).collect();
        assert_eq!(counts, vec![300, 40, 12]);
        assert_eq!(table.sort_column, "Employees");
        assert_eq!(table.sort_dir, "desc");
    }

    #[test]
    fn test_unknown_parameters_fall_back() {
        assert_eq!(SortColumn::parse(Some("Revenue")), SortColumn::Id);
        assert_eq!(SortColumn::parse(None), SortColumn::Id);
    }

    #[test]
    fn test_only_asc_sorts_ascending() {
        assert_eq!(SortDirection::parse(None), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("asc")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("desc")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("DESC")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("sideways")), SortDirection::Desc);
    }
}
