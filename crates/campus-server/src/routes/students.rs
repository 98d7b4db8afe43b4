use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use campus_common::form::{FormField, validate_responses};
use campus_common::validation::{
    normalize_email, require_non_blank, validate_email, validate_password, validate_sapid,
    validate_year,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use super::accounts::{self, LoginRequest, LoginResponse, ResendOtpRequest, VerifyOtpRequest};
use super::ip::ClientIp;
use crate::auth::password::hash_password_blocking;
use crate::auth::token::{Role, StudentAuth};
use crate::error::AppError;
use crate::models::{EVENT_SELECT, Event, Student, StudentRegistration};
use crate::otp::OtpSubject;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createstudent", post(create_student))
        .route("/login", post(student_login))
        .route("/verifyotp", post(verify_otp))
        .route("/resendotp", post(resend_otp))
        .route("/getstudent", get(get_student))
        .route("/events/{event_id}", get(get_event))
        .route("/events/{event_id}/register", post(register_for_event))
        .route("/registrations", get(my_registrations))
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub sapid: Option<Value>,
    pub department: Option<String>,
    pub division: Option<String>,
    pub rollno: Option<Value>,
    pub year: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentResponse {
    pub success: bool,
    pub auth_token: String,
    pub student: Student,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NewStudent {
    name: String,
    email: String,
    password: String,
    sapid: i64,
    department: String,
    division: String,
    rollno: String,
    year: i16,
}

fn text(field: &str, value: Option<&String>) -> Result<String, AppError> {
    require_non_blank(field, value.map_or("", String::as_str)).map_err(AppError::BadRequest)
}

/// Numbers arrive either as JSON numbers or as the strings HTML forms send.
fn integer(field: &str, value: Option<&Value>) -> Result<i64, AppError> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::bad_request(format!("{field} must be a whole number")))
}

/// Roll numbers are kept as text; numeric JSON input is accepted too.
fn rollno(value: Option<&Value>) -> Result<String, AppError> {
    match value {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) => require_non_blank("rollno", s).map_err(AppError::BadRequest),
        _ => Err(AppError::bad_request("rollno is required")),
    }
}

impl NewStudent {
    fn from_request(req: &CreateStudentRequest) -> Result<Self, AppError> {
        let email = normalize_email(&text("email", req.email.as_ref())?);
        validate_email(&email).map_err(AppError::BadRequest)?;
        let password = req.password.clone().unwrap_or_default();
        validate_password(&password).map_err(AppError::BadRequest)?;
        let sapid = integer("sapid", req.sapid.as_ref())?;
        validate_sapid(sapid).map_err(AppError::BadRequest)?;
        let year = i16::try_from(integer("year", req.year.as_ref())?)
            .map_err(|_| AppError::bad_request("year must be between 1 and 4"))?;
        validate_year(year).map_err(AppError::BadRequest)?;
        Ok(Self {
            name: text("name", req.name.as_ref())?,
            email,
            password,
            sapid,
            department: text("department", req.department.as_ref())?,
            division: text("division", req.division.as_ref())?,
            rollno: rollno(req.rollno.as_ref())?,
            year,
        })
    }
}

async fn student_conflict(state: &AppState, new: &NewStudent) -> Result<Option<&'static str>, AppError> {
    let row = sqlx::query_as::<_, (bool, bool)>(
        "SELECT email = $1, sapid = $2 FROM students
         WHERE email = $1 OR sapid = $2 OR rollno = $3 LIMIT 1",
    )
    .bind(&new.email)
    .bind(new.sapid)
    .bind(&new.rollno)
    .fetch_optional(&state.db)
    .await?;
    Ok(row.map(|(same_email, same_sapid)| {
        if same_email {
            "Student with this email already exists"
        } else if same_sapid {
            "Student with this sapid already exists"
        } else {
            "Student with this rollno already exists"
        }
    }))
}

/// `POST /api/student/createstudent`
///
/// # Errors
///
/// - `400` on missing or invalid fields
/// - `409` if the email, SAP ID or roll number is taken
pub async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<CreateStudentRequest>,
) -> Result<Json<CreateStudentResponse>, AppError> {
    let new = NewStudent::from_request(&req)?;
    if let Some(msg) = student_conflict(&state, &new).await? {
        return Err(AppError::Conflict(msg.to_string()));
    }
    let password_hash = hash_password_blocking(new.password.clone()).await?;

    let sql = format!(
        "INSERT INTO students (id, name, email, sapid, department, division, rollno, year, password_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT DO NOTHING
         RETURNING {}",
        Student::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.sapid)
        .bind(&new.department)
        .bind(&new.division)
        .bind(&new.rollno)
        .bind(new.year)
        .bind(&password_hash)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Student with these details already exists".to_string())
        })?;
    let student = Student::from_row(&row)?;
    tracing::info!(student_id = %student.id, "student registered");

    accounts::send_signup_otp(
        &state,
        OtpSubject::student(student.id),
        &student.name,
        &student.email,
    )
    .await?;

    Ok(Json(CreateStudentResponse {
        success: true,
        auth_token: state.signer.issue(Role::Student, student.id),
        student,
    }))
}

/// `POST /api/student/login`
pub async fn student_login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    accounts::login(&state, Role::Student, &ip, req).await
}

/// `POST /api/student/verifyotp`
pub async fn verify_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    accounts::verify_otp(&state, Role::Student, &ip, req).await
}

/// `POST /api/student/resendotp`
pub async fn resend_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    accounts::resend_otp(&state, Role::Student, &ip, req).await
}

/// `GET /api/student/getstudent`
pub async fn get_student(
    State(state): State<AppState>,
    auth: StudentAuth,
) -> Result<Json<Student>, AppError> {
    let sql = format!("SELECT {} FROM students WHERE id = $1", Student::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(auth.student_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    Ok(Json(Student::from_row(&row)?))
}

async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event, AppError> {
    let row = sqlx::query(&format!("{EVENT_SELECT} WHERE e.id = $1"))
        .bind(event_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(Event::from_row(&row)?)
}

/// `GET /api/student/events/{event_id}`: one event with its organizer and
/// registration form.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(load_event(&state, event_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub responses: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCreated {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Uuid,
    pub registrant: Uuid,
    pub responses: Value,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub registration: RegistrationCreated,
}

/// `POST /api/student/events/{event_id}/register`
///
/// # Errors
///
/// - `403` if the student has not verified their email
/// - `404` if the event does not exist
/// - `400` if the answers do not fit the event's form
/// - `409` if the student is already registered
pub async fn register_for_event(
    State(state): State<AppState>,
    auth: StudentAuth,
    Path(event_id): Path<Uuid>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if !auth.is_verified {
        return Err(AppError::Forbidden(
            "Verify your email before registering for events".to_string(),
        ));
    }

    let SqlJson(form) = sqlx::query_scalar::<_, SqlJson<Vec<FormField>>>(
        "SELECT registration_form FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    validate_responses(&form, &req.responses).map_err(AppError::BadRequest)?;

    let responses = Value::Object(req.responses);
    let row = sqlx::query_as::<_, (Uuid, chrono::DateTime<chrono::Utc>)>(
        "INSERT INTO event_registrations (id, event_id, registrant_id, responses)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (event_id, registrant_id) DO NOTHING
         RETURNING id, registered_at",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(auth.student_id)
    .bind(&responses)
    .fetch_optional(&state.db)
    .await?;
    let Some((id, registered_at)) = row else {
        return Err(AppError::Conflict(
            "Already registered for this event".to_string(),
        ));
    };
    tracing::info!(%event_id, student_id = %auth.student_id, "event registration");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registered successfully",
            registration: RegistrationCreated {
                id,
                event: event_id,
                registrant: auth.student_id,
                responses,
                registered_at,
            },
        }),
    ))
}

/// `GET /api/student/registrations`: newest first.
pub async fn my_registrations(
    State(state): State<AppState>,
    auth: StudentAuth,
) -> Result<Json<Vec<StudentRegistration>>, AppError> {
    let rows = sqlx::query(
        "SELECT r.id, r.event_id, r.responses, r.registered_at,
                e.title, e.date, e.location, e.poster
         FROM event_registrations r
         JOIN events e ON e.id = r.event_id
         WHERE r.registrant_id = $1
         ORDER BY r.registered_at DESC",
    )
    .bind(auth.student_id)
    .fetch_all(&state.db)
    .await?;
    let registrations = rows
        .iter()
        .map(StudentRegistration::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(registrations))
}
