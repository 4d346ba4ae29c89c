//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use nodule_core::Result;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::admin;
use crate::auth::login_handler;
use crate::handlers;
use crate::reports;
use crate::state::AppState;
use crate::static_files::uploads_router;
use crate::upload::{seed_dicoms, upload_dicom};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: build_router(state),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// 组装完整的路由：API、上传目录和全局中间件
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;
    let uploads = uploads_router(state.store.root());

    Router::new()
        .nest("/api", api_routes())
        .with_state(state)
        .merge(uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::RANGE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
}

/// `/api` 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        // 患者
        .route("/patients", post(handlers::create_patient).get(handlers::list_patients))
        .route("/patients/:patient_id", get(handlers::get_patient).delete(handlers::delete_patient))
        // 检查
        .route("/studies", post(handlers::create_study).get(handlers::list_studies))
        .route("/studies/:study_id", get(handlers::get_study).delete(handlers::delete_study))
        .route("/studies/:study_id/status", put(handlers::update_study_status))
        .route("/studies/:study_id/reviewed", put(handlers::mark_study_reviewed))
        .route("/studies/:study_id/dicom-files", get(handlers::list_study_dicom_files))
        .route("/studies/:study_id/nodules", get(handlers::list_study_nodules))
        // DICOM
        .route("/upload-dicom", post(upload_dicom))
        .route("/seed-dicoms", post(seed_dicoms))
        .route("/dicom-files/:id/metadata", get(handlers::dicom_file_metadata))
        .route("/viewer/presets", get(handlers::viewer_presets))
        // 结节
        .route("/nodules", post(handlers::create_nodule))
        .route(
            "/nodules/:id",
            get(handlers::get_nodule)
                .put(handlers::update_nodule)
                .delete(handlers::delete_nodule),
        )
        // 用户
        .route("/auth/login", post(login_handler))
        .route("/users", post(admin::create_user).get(admin::list_users))
        .route("/users/:id", get(admin::get_user).delete(admin::delete_user))
        .route("/users/:id/status", put(admin::update_user_status))
        .route("/users/:id/profile", put(admin::update_user_profile))
        // 统计与活动日志
        .route("/stats/dashboard", get(admin::dashboard_stats))
        .route("/stats/users", get(admin::user_stats))
        .route(
            "/activity-logs",
            post(admin::create_activity_log).get(admin::list_activity_logs),
        )
        .route("/activity-logs/recent", get(admin::recent_activity_logs))
        // 报告
        .route("/reports", post(reports::create_report).get(reports::list_reports))
        .route("/reports/:report_id", get(reports::get_report).delete(reports::delete_report))
        // 工作列表
        .route("/worklist", get(handlers::worklist))
        .route("/past-studies", get(handlers::past_studies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WebSettings;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use nodule_database::{create_tables, seed_default_users, DatabasePool};
    use nodule_storage::UploadStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "nodule-test-boundary";

    async fn test_app() -> (Router, TempDir) {
        test_app_with(WebSettings::default()).await
    }

    async fn test_app_with(settings: WebSettings) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = DatabasePool::in_memory().await.unwrap();
        create_tables(&db).await.unwrap();
        seed_default_users(&db).await.unwrap();

        let store = UploadStore::new(dir.path());
        store.init().await.unwrap();

        let state = AppState::new(db, store, settings);
        (build_router(state), dir)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn fake_dicom(marker: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"DICM");
        bytes.push(marker);
        bytes
    }

    fn multipart_body(study_id: &str, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"study_id\"\r\n\r\n{study_id}\r\n"
            )
            .as_bytes(),
        );
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"dicomFiles\"; filename=\"{name}\"\r\nContent-Type: application/dicom\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(app: &Router, study_id: &str, files: &[(&str, Vec<u8>)]) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload-dicom")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(study_id, files)))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn create_patient_and_study(app: &Router, study_id: &str) {
        let response = send(
            app,
            Method::POST,
            "/api/patients",
            Some(json!({ "patient_id": "P-1", "name": "Ayse Kaya", "age": 61, "gender": "Female" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            app,
            Method::POST,
            "/api/studies",
            Some(json!({
                "study_id": study_id,
                "patient_id": "P-1",
                "study_date": "2024-05-01",
                "description": "CT Chest"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app().await;
        let response = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok", "message": "Server is running" }));
    }

    #[tokio::test]
    async fn test_not_found_error_format() {
        let (app, _dir) = test_app().await;
        let response = send(&app, Method::GET, "/api/studies/STD-404", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Study not found");
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_patient_study_nodule_flow() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = send(
            &app,
            Method::POST,
            "/api/nodules",
            Some(json!({
                "study_id": "STD-1",
                "nodule_number": 1,
                "location": "Right upper lobe",
                "size_mm": 6.5,
                "risk_level": "Medium",
                "probability": 0.4
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let nodule_id = json_body(response).await["id"].as_i64().unwrap();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/nodules/{}", nodule_id),
            Some(json!({ "doctor_assessment": "Benign", "include_in_report": false })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["nodule"]["doctor_assessment"], "Benign");
        assert_eq!(body["nodule"]["include_in_report"], false);
        assert_eq!(body["nodule"]["location"], "Right upper lobe");

        let body = json_body(send(&app, Method::GET, "/api/studies/STD-1", None).await).await;
        assert_eq!(body["study_id"], "STD-1");
        assert_eq!(body["patient_name"], "Ayse Kaya");
        assert_eq!(body["nodules"].as_array().unwrap().len(), 1);
        assert_eq!(body["dicomFiles"], json!([]));

        let response = send(&app, Method::DELETE, "/api/patients/P-1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&app, Method::GET, &format!("/api/nodules/{}", nodule_id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_study_requires_existing_patient() {
        let (app, _dir) = test_app().await;
        let response = send(
            &app,
            Method::POST,
            "/api/studies",
            Some(json!({ "study_id": "STD-2", "patient_id": "P-missing" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/status",
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/status",
            Some(json!({ "status": "completed", "noduleCount": 3 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(send(&app, Method::GET, "/api/studies/STD-1", None).await).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["nodule_count"], 3);
    }

    #[tokio::test]
    async fn test_login() {
        let (app, _dir) = test_app().await;

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({ "username": "doctor", "password": "doctor123" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["name"], "Demo Doctor");
        assert_eq!(body["user"]["role"], "Doctor");
        assert_eq!(body["user"]["licenseNumber"], "MD-123456");
        assert!(body["user"].get("password").is_none());

        let logs = json_body(send(&app, Method::GET, "/api/activity-logs", None).await).await;
        assert_eq!(logs[0]["action_type"], "login");

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({ "username": "doctor", "password": "wrong" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Invalid password");

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({ "username": "nobody", "password": "x" })),
        )
        .await;
        assert_eq!(json_body(response).await["error"], "User not found");
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let (app, _dir) = test_app().await;
        let users = json_body(send(&app, Method::GET, "/api/users", None).await).await;
        let doctor = users
            .as_array()
            .unwrap()
            .iter()
            .find(|user| user["username"] == "doctor")
            .unwrap();
        let id = doctor["id"].as_i64().unwrap();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/users/{}/status", id),
            Some(json!({ "status": "Inactive" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({ "username": "doctor", "password": "doctor123" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Account is inactive");
    }

    #[tokio::test]
    async fn test_upload_dicom() {
        let (app, dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = upload(
            &app,
            "STD-1",
            &[("b.dcm", fake_dicom(1)), ("a.dcm", fake_dicom(2))],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "2 DICOM files uploaded successfully");
        assert!(dir.path().join("STD-1/a.dcm").exists());

        let files = json_body(send(&app, Method::GET, "/api/studies/STD-1/dicom-files", None).await).await;
        let files = files.as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["file_name"], "b.dcm");
        assert_eq!(files[0]["instance_number"], 1);
        assert_eq!(files[1]["file_path"], "/uploads/STD-1/a.dcm");

        // 重复上传同名文件不会产生重复记录
        let response = upload(&app, "STD-1", &[("a.dcm", fake_dicom(3))]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let files = json_body(send(&app, Method::GET, "/api/studies/STD-1/dicom-files", None).await).await;
        assert_eq!(files.as_array().unwrap().len(), 2);

        let response = send(&app, Method::GET, "/uploads/STD-1/a.dcm", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/dicom");
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_requests() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = upload(&app, "STD-1", &[("notes.txt", b"hello".to_vec())]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "notes.txt is not a DICOM file");

        let response = upload(&app, "STD-1", &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = upload(&app, "STD-404", &[("a.dcm", fake_dicom(1))]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_seed_dicoms() {
        let (app, dir) = test_app().await;
        let folder = dir.path().join("STD-100");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("001.dcm"), fake_dicom(1)).unwrap();
        std::fs::write(folder.join("002.DCM"), fake_dicom(2)).unwrap();
        std::fs::create_dir_all(dir.path().join("other")).unwrap();

        let response = send(&app, Method::POST, "/api/seed-dicoms", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Processed 1 study folders");
        assert_eq!(body["results"][0]["studyId"], "STD-100");
        assert_eq!(body["results"][0]["newFilesAdded"], 2);

        let study = json_body(send(&app, Method::GET, "/api/studies/STD-100", None).await).await;
        assert_eq!(study["patient_name"], "John Smith");
        assert_eq!(study["description"], "CT Chest Study");
        assert_eq!(study["dicomFiles"].as_array().unwrap().len(), 2);

        let body = json_body(send(&app, Method::POST, "/api/seed-dicoms", None).await).await;
        assert_eq!(body["results"][0]["newFilesAdded"], 0);
        assert_eq!(body["results"][0]["existingFiles"], 2);
    }

    #[tokio::test]
    async fn test_worklist_excludes_reported_studies() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;
        let response = send(
            &app,
            Method::POST,
            "/api/studies",
            Some(json!({ "study_id": "STD-2", "patient_id": "P-1" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let worklist = json_body(send(&app, Method::GET, "/api/worklist", None).await).await;
        assert_eq!(worklist["items"].as_array().unwrap().len(), 2);

        let response = send(
            &app,
            Method::POST,
            "/api/reports",
            Some(json!({ "study_id": "STD-1", "generated_by": "Demo Doctor" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let report_id = json_body(response).await["report"]["report_id"].as_str().unwrap().to_string();

        let worklist = json_body(send(&app, Method::GET, "/api/worklist", None).await).await;
        let items = worklist["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["study_id"], "STD-2");

        let past = json_body(send(&app, Method::GET, "/api/past-studies", None).await).await;
        assert_eq!(past[0]["study_id"], "STD-1");
        assert_eq!(past[0]["report_ids"], json!([report_id.clone()]));

        let response = send(&app, Method::DELETE, &format!("/api/reports/{}", report_id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&app, Method::GET, &format!("/api/reports/{}", report_id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_for_missing_study() {
        let (app, _dir) = test_app().await;
        let response = send(
            &app,
            Method::POST,
            "/api/reports",
            Some(json!({ "study_id": "STD-404" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_and_users() {
        let (app, _dir) = test_app().await;

        let response = send(
            &app,
            Method::POST,
            "/api/users",
            Some(json!({
                "username": "rad2",
                "password": "secret",
                "first_name": "Elif",
                "last_name": "Demir",
                "email": "elif@hospital.com",
                "role": "Doctor"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stats = json_body(send(&app, Method::GET, "/api/stats/users", None).await).await;
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["doctors"], 2);
        assert_eq!(stats["admins"], 1);

        let dashboard = json_body(send(&app, Method::GET, "/api/stats/dashboard", None).await).await;
        assert_eq!(dashboard["totalUsers"], 3);
        assert_eq!(dashboard["totalStudies"], 0);

        let response = send(&app, Method::DELETE, "/api/users/9999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_viewer_presets() {
        let (app, _dir) = test_app().await;
        let presets = json_body(send(&app, Method::GET, "/api/viewer/presets", None).await).await;
        assert_eq!(presets.as_array().unwrap().len(), 4);
        assert_eq!(presets[0]["name"], "Lung");
        assert_eq!(presets[0]["min"], -1350.0);
        assert_eq!(presets[0]["max"], 150.0);

        let bone = json_body(send(&app, Method::GET, "/api/viewer/presets?name=bone", None).await).await;
        assert_eq!(bone["name"], "Bone");
        assert_eq!(bone["center"], 300.0);

        let response = send(&app, Method::GET, "/api/viewer/presets?name=brain", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn dicom_rows(app: &Router, study_id: &str) -> Vec<Value> {
        let uri = format!("/api/studies/{}/dicom-files", study_id);
        let files = json_body(send(app, Method::GET, &uri, None).await).await;
        files.as_array().unwrap().clone()
    }

    /// 写出一个带头部信息的真实DICOM文件并返回其字节
    fn sample_dicom(dir: &std::path::Path) -> Vec<u8> {
        use dicom::core::{DataElement, PrimitiveValue, VR};
        use dicom::dictionary_std::tags;
        use dicom::object::{FileMetaTableBuilder, InMemDicomObject};

        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^Jane")),
            DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("PID-0001")),
            DataElement::new(tags::PATIENT_AGE, VR::AS, PrimitiveValue::from("045Y")),
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
            DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("7")),
            DataElement::new(tags::WINDOW_CENTER, VR::DS, PrimitiveValue::from("-550")),
            DataElement::new(tags::WINDOW_WIDTH, VR::DS, PrimitiveValue::from("1600")),
        ]);
        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.2")
                    .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.7"),
            )
            .unwrap();

        let path = dir.join("sample.dcm");
        file.write_to_file(&path).unwrap();
        std::fs::read(&path).unwrap()
    }

    #[tokio::test]
    async fn test_same_name_twice_in_one_upload() {
        let (app, dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = upload(
            &app,
            "STD-1",
            &[("a.dcm", fake_dicom(1)), ("a.dcm", fake_dicom(2))],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "1 DICOM files uploaded successfully");

        let rows = dicom_rows(&app, "STD-1").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["file_path"], "/uploads/STD-1/a.dcm");

        // 磁盘上保留最后一个同名文件
        let stored = std::fs::read(dir.path().join("STD-1/a.dcm")).unwrap();
        assert_eq!(stored.last(), Some(&2));
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_nothing_behind() {
        let (app, dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = upload(&app, "STD-1", &[("a.dcm", fake_dicom(1)), ("..", fake_dicom(2))]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dicom_rows(&app, "STD-1").await.is_empty());
        assert!(!dir.path().join("STD-1/a.dcm").exists());

        let response = upload(
            &app,
            "STD-1",
            &[("a.dcm", fake_dicom(1)), ("b.dcm", b"plain text".to_vec())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dicom_rows(&app, "STD-1").await.is_empty());
        assert!(!dir.path().join("STD-1/a.dcm").exists());
    }

    #[tokio::test]
    async fn test_upload_over_body_limit() {
        let settings = WebSettings {
            max_upload_bytes: 1024,
            ..WebSettings::default()
        };
        let (app, _dir) = test_app_with(settings).await;
        create_patient_and_study(&app, "STD-1").await;

        let mut large = fake_dicom(1);
        large.resize(8 * 1024, 0);
        let response = upload(&app, "STD-1", &[("a.dcm", large)]).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["status"], 413);
    }

    #[tokio::test]
    async fn test_dicom_file_metadata() {
        let (app, dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let scratch = tempfile::tempdir().unwrap();
        let bytes = sample_dicom(scratch.path());
        let response = upload(&app, "STD-1", &[("slice.dcm", bytes)]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("STD-1/slice.dcm").exists());

        let rows = dicom_rows(&app, "STD-1").await;
        assert_eq!(rows[0]["instance_number"], 7);
        let id = rows[0]["id"].as_i64().unwrap();

        let response = send(&app, Method::GET, &format!("/api/dicom-files/{}/metadata", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["header"]["patient_id"], "PID-0001");
        assert_eq!(body["header"]["modality"], "CT");
        assert_eq!(body["patientAgeYears"], 45);
        assert_eq!(body["defaultWindow"]["center"], -550.0);
        assert_eq!(body["defaultWindow"]["width"], 1600.0);
        assert_eq!(body["file"]["file_name"], "slice.dcm");

        let response = send(&app, Method::GET, "/api/dicom-files/9999/metadata", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reviewed_study_cannot_be_reopened() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/status",
            Some(json!({ "status": "completed", "noduleCount": 1 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/reviewed",
            Some(json!({ "user_id": 2 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let study = json_body(send(&app, Method::GET, "/api/studies/STD-1", None).await).await;
        assert_eq!(study["reviewed"], true);
        assert_eq!(study["reviewed_by"], 2);

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/status",
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-404/reviewed",
            Some(json!({ "user_id": 2 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_study_removes_folder() {
        let (app, dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;
        let response = upload(&app, "STD-1", &[("a.dcm", fake_dicom(1))]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("STD-1").is_dir());

        let response = send(&app, Method::DELETE, "/api/studies/STD-1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!dir.path().join("STD-1").exists());
        assert!(dicom_rows(&app, "STD-1").await.is_empty());

        let response = send(&app, Method::DELETE, "/api/studies/STD-1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_activity_logs() {
        let (app, _dir) = test_app().await;

        let response = send(
            &app,
            Method::POST,
            "/api/activity-logs",
            Some(json!({
                "user_id": null,
                "username": "doctor",
                "action": "Opened study STD-1",
                "action_type": "view"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let recent = json_body(send(&app, Method::GET, "/api/activity-logs/recent?hours=1", None).await).await;
        let recent = recent.as_array().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["action_type"], "view");
        assert_eq!(recent[0]["details"], "");

        let recent = json_body(send(&app, Method::GET, "/api/activity-logs/recent", None).await).await;
        assert_eq!(recent.as_array().unwrap().len(), 1);

        let response = send(&app, Method::GET, "/api/activity-logs/recent?hours=0", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            "/api/activity-logs",
            Some(json!({ "action": " ", "action_type": "view" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (app, _dir) = test_app().await;
        let users = json_body(send(&app, Method::GET, "/api/users", None).await).await;
        let id = users
            .as_array()
            .unwrap()
            .iter()
            .find(|user| user["username"] == "doctor")
            .unwrap()["id"]
            .as_i64()
            .unwrap();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/users/{}/profile", id),
            Some(json!({
                "first_name": "Selin",
                "last_name": "Yildiz",
                "email": "selin@hospital.com",
                "specialization": "Thoracic Radiology",
                "department": "Radiology Department",
                "hospital": null,
                "license_number": "MD-654321"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user"]["first_name"], "Selin");
        assert_eq!(body["user"]["license_number"], "MD-654321");
        assert_eq!(body["user"]["hospital"], Value::Null);

        let user = json_body(send(&app, Method::GET, &format!("/api/users/{}", id), None).await).await;
        assert_eq!(user["email"], "selin@hospital.com");

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/users/{}/profile", id),
            Some(json!({ "first_name": "Selin", "last_name": "Yildiz", "email": "not-an-email" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::PUT,
            "/api/users/9999/profile",
            Some(json!({ "first_name": "A", "last_name": "B", "email": "a@b.com" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_worklist_query_filters() {
        let (app, _dir) = test_app().await;
        create_patient_and_study(&app, "STD-1").await;
        let today = chrono::Utc::now().date_naive().to_string();
        for (study_id, date) in [("STD-2", None), ("STD-3", Some(today.as_str()))] {
            let response = send(
                &app,
                Method::POST,
                "/api/studies",
                Some(json!({ "study_id": study_id, "patient_id": "P-1", "study_date": date })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = send(
            &app,
            Method::PUT,
            "/api/studies/STD-1/status",
            Some(json!({ "status": "completed", "noduleCount": 3 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let study_ids = |worklist: &Value| -> Vec<String> {
            let mut ids: Vec<String> = worklist["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item["study_id"].as_str().unwrap().to_string())
                .collect();
            ids.sort();
            ids
        };

        let worklist = json_body(send(&app, Method::GET, "/api/worklist?priority=high", None).await).await;
        assert_eq!(study_ids(&worklist), vec!["STD-1"]);
        assert_eq!(worklist["items"][0]["priority"], "high");
        assert_eq!(worklist["stats"]["total"], 3);

        let worklist = json_body(send(&app, Method::GET, "/api/worklist?only_ready=true", None).await).await;
        assert_eq!(study_ids(&worklist), vec!["STD-1"]);
        assert_eq!(worklist["items"][0]["display_status"], "AI Results Ready");

        let worklist = json_body(send(&app, Method::GET, "/api/worklist?date_range=today", None).await).await;
        assert_eq!(study_ids(&worklist), vec!["STD-3"]);

        let worklist = json_body(send(&app, Method::GET, "/api/worklist?search=AYSE", None).await).await;
        assert_eq!(study_ids(&worklist), vec!["STD-1", "STD-2", "STD-3"]);

        let worklist = json_body(send(&app, Method::GET, "/api/worklist?search=nobody", None).await).await;
        assert!(study_ids(&worklist).is_empty());

        let response = send(&app, Method::GET, "/api/worklist?priority=urgent", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = send(&app, Method::GET, "/api/worklist?date_range=90d", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
