use minijinja::{context, Environment};

use super::{CompaniesTable, CompanyRow};

/// HTML templates compiled into the binary.
///
/// Names ending in `.html` are auto-escaped.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();

        env.add_template("index.html", include_str!("../../web/templates/index.html"))?;
        env.add_template(
            "companies.html",
            include_str!("../../web/templates/companies.html"),
        )?;
        env.add_template("row.html", include_str!("../../web/templates/row.html"))?;
        env.add_template("row-add.html", include_str!("../../web/templates/row-add.html"))?;
        env.add_template("row-edit.html", include_str!("../../web/templates/row-edit.html"))?;

        Ok(Self { env })
    }

    /// Full page with the sorted table
    pub fn index(&self, table: &CompaniesTable) -> Result<String, minijinja::Error> {
        self.env.get_template("index.html")?.render(table)
    }

    /// Table fragment only
    pub fn table(&self, table: &CompaniesTable) -> Result<String, minijinja::Error> {
        self.env.get_template("companies.html")?.render(table)
    }

    pub fn row(&self, row: &CompanyRow) -> Result<String, minijinja::Error> {
        self.env.get_template("row.html")?.render(context! { row })
    }

    pub fn row_edit(&self, row: &CompanyRow) -> Result<String, minijinja::Error> {
        self.env.get_template("row-edit.html")?.render(context! { row })
    }

    pub fn row_add(&self) -> Result<String, minijinja::Error> {
        self.env.get_template("row-add.html")?.render(context! {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Companies, Company};
    use crate::view::{SortColumn, SortDirection};

    fn row(name: &str) -> CompanyRow {
        CompanyRow {
            company: Company {
                id: "c-1".to_string(),
                company: name.to_string(),
                contact: "Ann".to_string(),
                country: "Chile".to_string(),
                employees: 7,
            },
            ordinal_id: 3,
        }
    }

    #[test]
    fn test_row_renders_fields() {
        let templates = Templates::new().unwrap();
        let html = templates.row(&row("Acme")).unwrap();
        assert!(html.contains("company-c-1"));
        assert!(html.contains("<td>3</td>"));
        assert!(html.contains("Acme"));
        assert!(html.contains("hx-delete=\"/company/c-1\""));
    }

    #[test]
    fn test_values_are_escaped() {
        let templates = Templates::new().unwrap();
        let html = templates.row_edit(&row("<script>x</script>")).unwrap();
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_index_includes_table() {
        let templates = Templates::new().unwrap();
        let mut companies = Companies::new();
        companies.companies.push(row("Globex").company);
        let table = CompaniesTable::build(&companies, SortColumn::Company, SortDirection::Asc);

        let html = templates.index(&table).unwrap();
        assert!(html.contains("id=\"companies-table\""));
        assert!(html.contains("Globex"));
        assert!(html.contains("/ws"));
    }
}
