// Roster - REST API with Axum
//
// Thin transport over the relationship services. Absent entities map to
// 404, AlreadyEmployed to 409, storage failures to 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::entities::{
    Address, AddressDraft, Company, CompanyDraft, CompanyId, EntityKind, Person, PersonDraft,
    PersonId,
};
use crate::error::{ServiceError, ServiceResult};
use crate::services::{CompanyService, PersonService, UnresolvedCompany};
use crate::store::{AuditEvent, Repository};

const API_CALL_MESSAGE: &str = "New API call: ";

type DynRepository = dyn Repository + Send;

/// Shared application state
///
/// The repository sits behind one mutex: a single writer at a time.
#[derive(Clone)]
pub struct AppState {
    repo: Arc<Mutex<DynRepository>>,
    unresolved_company: UnresolvedCompany,
}

impl AppState {
    pub fn new<R: Repository + Send + 'static>(repo: R, unresolved_company: UnresolvedCompany) -> Self {
        Self {
            repo: Arc::new(Mutex::new(repo)),
            unresolved_company,
        }
    }

    fn with_repo<T>(&self, f: impl FnOnce(&DynRepository) -> ServiceResult<T>) -> Result<T, ApiError> {
        let guard = self
            .repo
            .lock()
            .map_err(|_| ApiError::Internal("storage lock poisoned".to_string()))?;
        f(&*guard).map_err(ApiError::from)
    }

    fn with_people<T>(
        &self,
        f: impl FnOnce(&PersonService<'_, DynRepository>) -> ServiceResult<T>,
    ) -> Result<T, ApiError> {
        let policy = self.unresolved_company;
        self.with_repo(|repo| f(&PersonService::new(repo, policy)))
    }

    fn with_companies<T>(
        &self,
        f: impl FnOnce(&CompanyService<'_, DynRepository>) -> ServiceResult<T>,
    ) -> Result<T, ApiError> {
        let policy = self.unresolved_company;
        self.with_repo(|repo| f(&CompanyService::new(PersonService::new(repo, policy))))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::AlreadyEmployed { .. } => ApiError::Conflict(err.to_string()),
            ServiceError::Store(store) => {
                error!("Storage failure: {}", store);
                ApiError::Internal("internal storage error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        error!("Failure: {}", message);
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersonRequest {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub company: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub street_number: i32,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonResponse {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub addresses: Vec<AddressDto>,
    pub company: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CompanyRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: i64,
    pub name: String,
    pub employees: Vec<PersonResponse>,
}

impl From<PersonRequest> for PersonDraft {
    fn from(request: PersonRequest) -> Self {
        PersonDraft {
            first_name: request.firstname,
            last_name: request.lastname,
            company: request.company.map(CompanyId),
        }
    }
}

impl From<AddressDto> for AddressDraft {
    fn from(dto: AddressDto) -> Self {
        AddressDraft {
            street: dto.street,
            street_number: dto.street_number,
            zip_code: dto.zip_code,
            city: dto.city,
            country: dto.country,
        }
    }
}

impl From<&Address> for AddressDto {
    fn from(address: &Address) -> Self {
        Self {
            street: address.street.clone(),
            street_number: address.street_number,
            zip_code: address.zip_code.clone(),
            city: address.city.clone(),
            country: address.country.clone(),
        }
    }
}

impl From<&Person> for PersonResponse {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id().get(),
            firstname: person.first_name.clone(),
            lastname: person.last_name.clone(),
            addresses: person.addresses().iter().map(AddressDto::from).collect(),
            company: person.company().map(CompanyId::get),
        }
    }
}

impl From<&Company> for CompanyResponse {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id().get(),
            name: company.name.clone(),
            employees: company.employees().iter().map(PersonResponse::from).collect(),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/person
async fn create_person(
    State(state): State<AppState>,
    Json(request): Json<PersonRequest>,
) -> ApiResult<PersonResponse> {
    info!("{}Create a person", API_CALL_MESSAGE);

    let draft = PersonDraft::from(request);
    match state.with_people(|people| people.create(&draft))? {
        Some(person) => Ok(Json(ApiResponse::ok(PersonResponse::from(&person)))),
        None => Err(ApiError::NotFound(format!(
            "No company found with id {}",
            draft.company.map(|c| c.to_string()).unwrap_or_default()
        ))),
    }
}

/// GET /api/person/:id
async fn get_person(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<PersonResponse> {
    info!("{}Get a person", API_CALL_MESSAGE);

    state
        .with_people(|people| people.get_by_id(PersonId(id)))?
        .map(|person| Json(ApiResponse::ok(PersonResponse::from(&person))))
        .ok_or_else(|| ApiError::NotFound(format!("No person found with id {}", id)))
}

/// PUT /api/person/:id - Add an address
async fn add_address(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(address): Json<AddressDto>,
) -> ApiResult<PersonResponse> {
    info!("{}Add a new address", API_CALL_MESSAGE);

    let draft = AddressDraft::from(address);
    state
        .with_people(|people| people.add_address(PersonId(id), &draft))?
        .map(|person| Json(ApiResponse::ok(PersonResponse::from(&person))))
        .ok_or_else(|| ApiError::NotFound(format!("No person found with id {}", id)))
}

/// DELETE /api/person/:id
async fn delete_person(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    info!("{}Delete a person", API_CALL_MESSAGE);

    state.with_people(|people| people.delete(PersonId(id)))?;
    Ok(Json(ApiResponse::done()))
}

/// DELETE /api/person/:id/company - Leave the current employer
async fn leave_company(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<PersonResponse> {
    info!("{}Remove a person from their company", API_CALL_MESSAGE);

    state
        .with_people(|people| people.leave_company(PersonId(id)))?
        .map(|person| Json(ApiResponse::ok(PersonResponse::from(&person))))
        .ok_or_else(|| ApiError::NotFound(format!("No person found with id {}", id)))
}

/// POST /api/company
async fn create_company(
    State(state): State<AppState>,
    Json(request): Json<CompanyRequest>,
) -> ApiResult<CompanyResponse> {
    info!("{}Create a company", API_CALL_MESSAGE);

    let draft = CompanyDraft { name: request.name };
    let company = state.with_companies(|companies| companies.create(&draft))?;
    Ok(Json(ApiResponse::ok(CompanyResponse::from(&company))))
}

/// GET /api/company/:id
async fn get_company(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<CompanyResponse> {
    info!("{}Get a company", API_CALL_MESSAGE);

    state
        .with_companies(|companies| companies.get_by_id(CompanyId(id)))?
        .map(|company| Json(ApiResponse::ok(CompanyResponse::from(&company))))
        .ok_or_else(|| ApiError::NotFound(format!("No company was found with id {}", id)))
}

/// GET /api/company/:id/people
async fn get_employees(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<PersonResponse>> {
    info!("{}Get company employees", API_CALL_MESSAGE);

    state
        .with_companies(|companies| companies.employees(CompanyId(id)))?
        .map(|employees| Json(ApiResponse::ok(employees.iter().map(PersonResponse::from).collect())))
        .ok_or_else(|| ApiError::NotFound(format!("No company was found with id {}", id)))
}

/// PUT /api/company/:id/people/:person_id
async fn add_employee(
    State(state): State<AppState>,
    Path((company_id, person_id)): Path<(i64, i64)>,
) -> ApiResult<CompanyResponse> {
    info!("{}Add an employee in a company", API_CALL_MESSAGE);

    state
        .with_companies(|companies| companies.add_employee(CompanyId(company_id), PersonId(person_id)))?
        .map(|company| Json(ApiResponse::ok(CompanyResponse::from(&company))))
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No company was found with id {} or the person does not exist",
                company_id
            ))
        })
}

/// DELETE /api/company/:id
async fn delete_company(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    info!("{}Delete a company", API_CALL_MESSAGE);

    state.with_companies(|companies| companies.delete(CompanyId(id)))?;
    Ok(Json(ApiResponse::done()))
}

/// GET /api/person/:id/events
async fn person_events(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<AuditEvent>> {
    let events = state.with_repo(|repo| Ok(repo.events_for(EntityKind::Person, id)?))?;
    Ok(Json(ApiResponse::ok(events)))
}

/// GET /api/company/:id/events
async fn company_events(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<AuditEvent>> {
    let events = state.with_repo(|repo| Ok(repo.events_for(EntityKind::Company, id)?))?;
    Ok(Json(ApiResponse::ok(events)))
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/person", post(create_person))
        .route(
            "/person/:id",
            get(get_person).put(add_address).delete(delete_person),
        )
        .route("/person/:id/company", axum::routing::delete(leave_company))
        .route("/person/:id/events", get(person_events))
        .route("/company", post(create_company))
        .route("/company/:id", get(get_company).delete(delete_company))
        .route("/company/:id/people", get(get_employees))
        .route("/company/:id/people/:person_id", put(add_employee))
        .route("/company/:id/events", get(company_events))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
