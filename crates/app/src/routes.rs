use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use dataset_forge_core::{
    list_local_models, ArtifactStore, ChatMessage, ExtractedUnit, ExtractionPipeline, LlmError,
    MetadataStore, ModelServer, StoreError, UploadStore,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadStore>,
    pub metadata: Arc<MetadataStore>,
    pub extraction: Arc<ArtifactStore>,
    pub datasets: Arc<ArtifactStore>,
    pub pipeline: Arc<ExtractionPipeline>,
    pub llm: Arc<dyn ModelServer>,
    pub models_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/upload/", post(upload_files))
        .route("/files/", get(list_files))
        .route("/files/{filename}", delete(delete_file))
        .route("/bulk-delete/", post(bulk_delete))
        .route("/bulk-download/", post(bulk_download))
        .route("/create_folder/", post(create_folder))
        .route("/rename_folder/", post(rename_folder))
        .route("/rename_file/", post(rename_file))
        .route("/delete_folder/{*path}", delete(delete_folder))
        .route("/move-file/", post(move_file))
        .route("/extract/", post(extract))
        .route("/review/{name}", get(get_review).post(update_review))
        .route("/training-datasets/", get(training_datasets))
        .route("/training-datasets/{name}", delete(delete_dataset))
        .route("/csv-preview/{filename}", get(csv_preview))
        .route("/generate-dataset/", post(generate_dataset))
        .route("/rename-dataset/", post(rename_dataset))
        .route("/initialize-model/{model}", post(initialize_model))
        .route("/chat-with-model/{model}", post(chat_with_model))
        .route("/generate-text/{model}", post(generate_text))
        .route("/available-models/", get(available_models));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error body: `{"error": {"code", "message"}}`.
#[derive(serde::Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(serde::Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match &error {
            StoreError::NotFound(_) => not_found(error.to_string()),
            StoreError::AlreadyExists(_) | StoreError::InvalidPath(_) => {
                bad_request(error.to_string())
            }
            _ => internal(error.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(error: LlmError) -> Self {
        match &error {
            LlmError::ModelfileMissing(_) => not_found(error.to_string()),
            _ => internal(error.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        internal(error.to_string())
    }
}

// ============ Upload and file management ============

#[derive(Deserialize)]
struct FolderQuery {
    #[serde(default)]
    folder: String,
    #[serde(default)]
    classification: Option<String>,
}

async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| bad_request(error.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|error| bad_request(error.to_string()))?;

        let relative = if query.folder.is_empty() {
            filename.clone()
        } else {
            format!("{}/{}", query.folder.trim_matches('/'), filename)
        };
        state.uploads.save(&relative, &bytes)?;

        if let Some(classification) = &query.classification {
            state.metadata.set_classification(&relative, classification)?;
        }

        info!(file = %relative, bytes = bytes.len(), "file uploaded");
        uploaded.push(filename);
    }

    if uploaded.is_empty() {
        return Err(bad_request("no file field in upload"));
    }
    Ok(Json(
        json!({ "filenames": uploaded, "status": "File uploaded successfully" }),
    ))
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entries = state.uploads.list(&query.folder)?;
    Ok(Json(json!(entries)))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.uploads.delete_file(&filename)?;
    Ok(Json(
        json!({ "status": format!("File {filename} deleted successfully") }),
    ))
}

#[derive(Deserialize)]
struct BulkRequest {
    filenames: Vec<String>,
}

async fn bulk_delete(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut deleted = Vec::new();
    for (filename, outcome) in state.uploads.bulk_delete(&request.filenames) {
        match outcome {
            Ok(()) => deleted.push(filename),
            Err(error) => warn!(file = %filename, %error, "bulk delete skipped file"),
        }
    }
    Ok(Json(json!({ "deleted_files": deleted })))
}

async fn bulk_download(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<Response, AppError> {
    let bytes = state.uploads.bulk_download(&request.filenames)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"downloaded_files.zip\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
struct FolderCreate {
    name: String,
    #[serde(default)]
    parent_folder: Option<String>,
}

async fn create_folder(
    State(state): State<AppState>,
    Json(request): Json<FolderCreate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let relative = join_folder(request.parent_folder.as_deref(), &request.name);
    state.uploads.create_folder(&relative)?;
    Ok(Json(
        json!({ "message": format!("Folder '{}' created successfully", request.name) }),
    ))
}

#[derive(Deserialize)]
struct FolderRename {
    old_name: String,
    new_name: String,
    #[serde(default)]
    parent_folder: Option<String>,
}

async fn rename_folder(
    State(state): State<AppState>,
    Json(request): Json<FolderRename>,
) -> Result<Json<serde_json::Value>, AppError> {
    let old = join_folder(request.parent_folder.as_deref(), &request.old_name);
    let new = join_folder(request.parent_folder.as_deref(), &request.new_name);
    state.uploads.rename_folder(&old, &new)?;
    Ok(Json(json!({
        "message": format!(
            "Folder renamed from '{}' to '{}' successfully",
            request.old_name, request.new_name
        )
    })))
}

#[derive(Deserialize)]
struct FileRename {
    old_name: String,
    new_name: String,
    #[serde(default)]
    folder: String,
}

async fn rename_file(
    State(state): State<AppState>,
    Json(request): Json<FileRename>,
) -> Result<Json<serde_json::Value>, AppError> {
    let folder = if request.folder.is_empty() {
        None
    } else {
        Some(request.folder.as_str())
    };
    let old = join_folder(folder, &request.old_name);
    let new = join_folder(folder, &request.new_name);
    state.uploads.rename_file(&old, &new)?;
    Ok(Json(json!({
        "message": format!(
            "File renamed from '{}' to '{}' successfully",
            request.old_name, request.new_name
        )
    })))
}

async fn delete_folder(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.uploads.delete_folder(&path)?;
    Ok(Json(
        json!({ "message": format!("Folder '{path}' deleted successfully") }),
    ))
}

#[derive(Deserialize)]
struct FileMoveRequest {
    file_path: String,
    target_folder: String,
}

async fn move_file(
    State(state): State<AppState>,
    Json(request): Json<FileMoveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .uploads
        .move_file(&request.file_path, &request.target_folder)?;
    Ok(Json(
        json!({ "message": format!("File moved successfully to {}", request.target_folder) }),
    ))
}

fn join_folder(folder: Option<&str>, name: &str) -> String {
    match folder {
        Some(folder) if !folder.is_empty() => format!("{}/{}", folder.trim_matches('/'), name),
        _ => name.to_string(),
    }
}

// ============ Extraction and review ============

#[derive(Deserialize)]
struct ExtractRequest {
    filenames: Vec<String>,
    destination: String,
}

/// Runs the pipeline over the named uploads, materializes the CSV artifact,
/// and snapshots the unit list as the editable review document.
async fn extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.filenames.is_empty() {
        return Err(bad_request("no filenames given"));
    }

    let report = state.pipeline.run(&request.filenames);
    let artifact = state
        .extraction
        .write(&report.units, &request.destination)?;
    let artifact_name = artifact
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| internal("artifact path has no file name"))?;

    let stem = artifact_name.trim_end_matches(".csv");
    let review_path = state
        .extraction
        .root()
        .join(format!("{stem}_dataset.json"));
    let body = serde_json::to_vec_pretty(&report.units)
        .map_err(|error| internal(error.to_string()))?;
    fs::write(review_path, body)?;

    info!(
        artifact = %artifact_name,
        files = request.filenames.len(),
        units = report.units.len(),
        "extraction completed"
    );
    Ok(Json(json!({
        "artifact": artifact_name,
        "outcomes": report.outcomes,
        "unit_count": report.units.len(),
    })))
}

async fn get_review(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ExtractedUnit>>, AppError> {
    let stem = name.trim_end_matches(".csv");
    let path = state
        .extraction
        .root()
        .join(format!("{stem}_dataset.json"));
    if !path.exists() {
        return Err(not_found(format!("no review content for '{name}'")));
    }

    let bytes = fs::read(path)?;
    let units =
        serde_json::from_slice(&bytes).map_err(|error| internal(error.to_string()))?;
    Ok(Json(units))
}

async fn update_review(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(units): Json<Vec<ExtractedUnit>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stem = name.trim_end_matches(".csv");
    let path = state
        .extraction
        .root()
        .join(format!("{stem}_dataset.json"));
    let body =
        serde_json::to_vec_pretty(&units).map_err(|error| internal(error.to_string()))?;
    fs::write(path, body)?;
    Ok(Json(json!({ "status": "Content updated successfully" })))
}

// ============ Datasets ============

async fn training_datasets(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entries = state.datasets.list()?;
    Ok(Json(json!(entries)))
}

#[derive(Deserialize)]
struct RowsQuery {
    #[serde(default = "default_rows")]
    rows: usize,
}

fn default_rows() -> usize {
    100
}

async fn csv_preview(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let rows = state.datasets.preview(&filename, query.rows)?;
    Ok(Json(json!(rows)))
}

#[derive(Deserialize)]
struct GenerateDatasetRequest {
    #[serde(rename = "sourceFile")]
    source_file: String,
    #[serde(rename = "datasetName")]
    dataset_name: String,
}

async fn generate_dataset(
    State(state): State<AppState>,
    Json(request): Json<GenerateDatasetRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .datasets
        .promote(&state.extraction, &request.source_file, &request.dataset_name)?;
    Ok(Json(
        json!({ "message": format!("Dataset '{}' created successfully", request.dataset_name) }),
    ))
}

#[derive(Deserialize)]
struct DatasetRename {
    old_name: String,
    new_name: String,
}

async fn rename_dataset(
    State(state): State<AppState>,
    Json(request): Json<DatasetRename>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.datasets.rename(&request.old_name, &request.new_name)?;
    Ok(Json(json!({
        "message": format!(
            "Dataset renamed from '{}' to '{}' successfully",
            request.old_name, request.new_name
        )
    })))
}

async fn delete_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.datasets.delete(&name)?;
    Ok(Json(
        json!({ "message": format!("Dataset '{name}' deleted successfully") }),
    ))
}

// ============ Model serving ============

#[derive(Deserialize)]
struct StreamQuery {
    #[serde(default)]
    stream: bool,
}

async fn initialize_model(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.llm.initialize_model(&model).await?;
    Ok(Json(
        json!({ "message": format!("Model {model} initialized successfully") }),
    ))
}

async fn chat_with_model(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<StreamQuery>,
    Json(messages): Json<Vec<ChatMessage>>,
) -> Result<Response, AppError> {
    if query.stream {
        let tokens = state.llm.chat_stream(&model, &messages).await?;
        let events = tokens.map(|token| token.map(|content| Event::default().data(content)));
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let reply = state.llm.chat(&model, &messages).await?;
    Ok(Json(reply).into_response())
}

async fn generate_text(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<StreamQuery>,
    Json(prompt): Json<String>,
) -> Result<Response, AppError> {
    if query.stream {
        let tokens = state.llm.generate_stream(&model, &prompt).await?;
        let events = tokens.map(|token| token.map(|content| Event::default().data(content)));
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    let reply = state.llm.generate(&model, &prompt).await?;
    Ok(Json(reply).into_response())
}

async fn available_models(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let models = list_local_models(&state.models_dir)?;
    Ok(Json(models))
}

// ============ Health ============

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
