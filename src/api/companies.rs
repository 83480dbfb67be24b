//! HTMX endpoints for listing and editing companies.
//!
//! Every successful write publishes a change notification to WebSocket
//! subscribers after the record store has been updated.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::metrics::StorageMetrics;
use crate::models::{Companies, CompanyFields};
use crate::notification::NotificationEvent;
use crate::server::AppState;
use crate::storage::StorageResult;
use crate::view::{CompaniesTable, CompanyRow, SortColumn, SortDirection};

const HX_TRIGGER_AFTER_SWAP: &str = "HX-Trigger-After-Swap";
const ENTER_EDIT_MODE: &str = r#"{"enterEditMode":""}"#;
const EXIT_EDIT_MODE: &str = r#"{"exitEditMode":""}"#;

#[derive(Debug, Default, Deserialize)]
pub struct SortQuery {
    pub sort: Option<String>,
    pub dir: Option<String>,
}

impl SortQuery {
    fn table(&self, companies: &Companies) -> CompaniesTable {
        CompaniesTable::build(
            companies,
            SortColumn::parse(self.sort.as_deref()),
            SortDirection::parse(self.dir.as_deref()),
        )
    }
}

/// Fields posted by the add and edit rows
#[derive(Debug, Default, Deserialize)]
pub struct CompanyForm {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub employees: String,
}

impl CompanyForm {
    fn into_fields(self) -> Result<CompanyFields> {
        let employees = self.employees.trim().parse::<i64>().map_err(|_| {
            AppError::Validation(format!("employees must be a whole number, got {:?}", self.employees))
        })?;

        Ok(CompanyFields {
            company: self.company,
            contact: self.contact,
            country: self.country,
            employees,
        })
    }
}

/// HTML fragment, optionally asking HTMX to fire an edit-mode event after the swap
fn fragment(html: String, trigger: Option<&'static str>) -> Response {
    let mut response = Html(html).into_response();
    if let Some(trigger) = trigger {
        response
            .headers_mut()
            .insert(HX_TRIGGER_AFTER_SWAP, HeaderValue::from_static(trigger));
    }
    response
}

fn empty(trigger: Option<&'static str>) -> Response {
    fragment(String::new(), trigger)
}

fn record_write<T>(operation: &str, result: StorageResult<T>) -> Result<T> {
    StorageMetrics::record_write(operation, result.is_ok());
    Ok(result?)
}

/// Like [`record_write`] for conditional updates; `Ok(None)` wrote nothing
fn record_write_if<T>(operation: &str, result: StorageResult<Option<T>>) -> Result<Option<T>> {
    match result {
        Ok(None) => Ok(None),
        result => record_write(operation, result),
    }
}

fn notify(state: &AppState, event: NotificationEvent) {
    match event.to_json() {
        Ok(json) => state.broadcaster.publish(json),
        Err(e) => tracing::error!(error = %e, "Failed to serialize change notification"),
    }
}

/// GET /companies - full page
pub async fn index(State(state): State<AppState>, Query(query): Query<SortQuery>) -> Result<Response> {
    let companies = state.storage.read().await?;
    let html = state.templates.index(&query.table(&companies))?;
    Ok(fragment(html, None))
}

/// GET /companies/table - table fragment, used for sorting and live refresh
pub async fn table(State(state): State<AppState>, Query(query): Query<SortQuery>) -> Result<Response> {
    let companies = state.storage.read().await?;
    let html = state.templates.table(&query.table(&companies))?;
    Ok(fragment(html, None))
}

/// GET /company/add - empty row for a new company
pub async fn add_company(State(state): State<AppState>) -> Result<Response> {
    let html = state.templates.row_add()?;
    Ok(fragment(html, Some(ENTER_EDIT_MODE)))
}

/// POST /company
pub async fn save_new_company(
    State(state): State<AppState>,
    Form(form): Form<CompanyForm>,
) -> Result<Response> {
    let fields = form.into_fields()?;

    let (company, companies) = record_write(
        "create",
        state.storage.update(|companies| companies.add(fields)).await,
    )?;

    tracing::info!(company_id = %company.id, "Company created");
    notify(&state, NotificationEvent::created(&company));

    // New companies are appended at the end
    let row = CompanyRow {
        company,
        ordinal_id: companies.len(),
    };
    let html = state.templates.row(&row)?;
    Ok(fragment(html, Some(EXIT_EDIT_MODE)))
}

/// GET /company - discard the add row
pub async fn cancel_new_company() -> Response {
    empty(Some(EXIT_EDIT_MODE))
}

/// GET /company/edit/{id}
pub async fn edit_company(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let row = load_row(&state, &id).await?;
    let html = state.templates.row_edit(&row)?;
    Ok(fragment(html, Some(ENTER_EDIT_MODE)))
}

/// PUT /company/{id}
pub async fn save_existing_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<CompanyForm>,
) -> Result<Response> {
    let fields = form.into_fields()?;

    let (company, companies) = record_write_if(
        "update",
        state
            .storage
            .update_if(|companies| companies.update(&id, fields))
            .await,
    )?
    .ok_or_else(|| AppError::NotFound(format!("company {id}")))?;

    tracing::info!(company_id = %company.id, "Company updated");
    notify(&state, NotificationEvent::updated(&company));

    let row = CompanyRow {
        ordinal_id: companies.position(&company.id).unwrap_or_default(),
        company,
    };
    let html = state.templates.row(&row)?;
    Ok(fragment(html, Some(EXIT_EDIT_MODE)))
}

/// GET /company/{id} - discard edits and show the stored row
pub async fn cancel_existing_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let row = load_row(&state, &id).await?;
    let html = state.templates.row(&row)?;
    Ok(fragment(html, Some(EXIT_EDIT_MODE)))
}

/// DELETE /company/{id}
///
/// Deleting a company that is already gone still succeeds so the stale row
/// disappears from the page; only real deletions are stored and published.
pub async fn delete_company(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let deleted = record_write_if(
        "delete",
        state
            .storage
            .update_if(|companies| companies.delete(&id).then_some(()))
            .await,
    )?;

    if deleted.is_some() {
        tracing::info!(company_id = %id, "Company deleted");
        notify(&state, NotificationEvent::deleted(&id));
    }

    Ok(StatusCode::OK.into_response())
}

async fn load_row(state: &AppState, id: &str) -> Result<CompanyRow> {
    let companies = state.storage.read().await?;
    let company = companies
        .get_by_id(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("company {id}")))?;

    Ok(CompanyRow {
        ordinal_id: companies.position(id).unwrap_or_default(),
        company,
    })
}
