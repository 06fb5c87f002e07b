//! Fixture HTTP server used as a live peer by the client integration tests.
//!
//! Endpoints cover each wire shape the client produces or consumes:
//! camelCase JSON todos with JSON error bodies and a `204` delete, query
//! filtering with repeated keys, header and cookie echoing, a form login
//! answering in plain text, and a multipart upload summary.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{Form, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
    /// Part body when it is not a file.
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadSummary {
    pub parts: Vec<UploadedPart>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
}

pub const PASSWORD: &str = "hunter2";

pub type Db = Arc<RwLock<HashMap<Uuid, Todo>>>;

type ApiError = (StatusCode, Json<ErrorBody>);

fn not_found(id: Uuid) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: format!("todo {id} not found"),
        }),
    )
}

fn bad_request(message: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", get(get_todo).put(update_todo).delete(delete_todo))
        .route("/echo", get(echo).post(echo))
        .route("/login", post(login))
        .route("/upload", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Filters by every `tag` given (all must match) and by `completed`.
async fn list_todos(State(db): State<Db>, Query(params): Query<Vec<(String, String)>>) -> Json<Vec<Todo>> {
    let tags: Vec<&str> = params
        .iter()
        .filter(|(key, _)| key == "tag")
        .map(|(_, value)| value.as_str())
        .collect();
    let completed = params
        .iter()
        .find(|(key, _)| key == "completed")
        .and_then(|(_, value)| value.parse::<bool>().ok());
    debug!(?tags, ?completed, "listing todos");

    let todos = db.read().await;
    let mut matching: Vec<Todo> = todos
        .values()
        .filter(|todo| tags.iter().all(|tag| todo.tags.iter().any(|t| t == tag)))
        .filter(|todo| completed.map_or(true, |c| todo.completed == c))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.title.cmp(&b.title));
    Json(matching)
}

async fn create_todo(State(db): State<Db>, Json(input): Json<CreateTodo>) -> impl IntoResponse {
    let todo = Todo {
        id: Uuid::new_v4(),
        title: input.title,
        completed: input.completed,
        tags: input.tags,
        owner_name: input.owner_name,
    };
    debug!(id = %todo.id, "created todo");
    db.write().await.insert(todo.id, todo.clone());
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/todos/{}", todo.id))],
        Json(todo),
    )
}

async fn get_todo(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Todo>, ApiError> {
    let todos = db.read().await;
    todos.get(&id).cloned().map(Json).ok_or_else(|| not_found(id))
}

async fn update_todo(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, ApiError> {
    let mut todos = db.write().await;
    let todo = todos.get_mut(&id).ok_or_else(|| not_found(id))?;
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    Ok(Json(todo.clone()))
}

async fn delete_todo(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let mut todos = db.write().await;
    todos.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or_else(|| not_found(id))
}

/// Reflects the request back and sets a few response headers and cookies.
async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    let mut reflected = BTreeMap::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            reflected.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let cookie = reflected.get("cookie").cloned().unwrap_or_default();
    (
        AppendHeaders([
            (header::HeaderName::from_static("x-request-id"), "42".to_string()),
            (header::HeaderName::from_static("x-echo-cookie"), cookie),
            (header::SET_COOKIE, "session=abc123; Path=/; HttpOnly".to_string()),
            (header::SET_COOKIE, "theme=dark; Secure; SameSite=Strict".to_string()),
        ]),
        Json(Echo {
            method: method.to_string(),
            query: uri.query().map(str::to_string),
            headers: reflected,
        }),
    )
}

async fn login(Form(login): Form<Login>) -> impl IntoResponse {
    if login.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            AppendHeaders(Vec::<(header::HeaderName, String)>::new()),
            "invalid credentials".to_string(),
        );
    }
    (
        StatusCode::OK,
        AppendHeaders(vec![(header::SET_COOKIE, format!("user={}; Path=/", login.username))]),
        format!("welcome {}", login.username),
    )
}

async fn upload(mut multipart: Multipart) -> Result<Json<UploadSummary>, ApiError> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_request)?;
        let text = match file_name {
            Some(_) => None,
            None => Some(String::from_utf8_lossy(&data).into_owned()),
        };
        parts.push(UploadedPart {
            name,
            file_name,
            content_type,
            size: data.len(),
            text,
        });
    }
    debug!(parts = parts.len(), "received upload");
    Ok(Json(UploadSummary { parts }))
}
