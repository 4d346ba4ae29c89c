//! 上传目录的静态文件服务

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

const DICOM_CONTENT_TYPE: &str = "application/dicom";

/// 在 `/uploads` 下提供上传目录，Range请求由ServeDir处理
pub fn uploads_router<S>(root: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .nest_service("/uploads", ServeDir::new(root))
        .layer(middleware::from_fn(dicom_content_type))
}

fn is_dicom_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".dcm") || lower.ends_with(".dicom")
}

/// DICOM文件统一使用 `application/dicom`
async fn dicom_content_type(request: Request, next: Next) -> Response {
    let dicom = is_dicom_path(request.uri().path());
    let mut response = next.run(request).await;

    let status = response.status();
    if dicom && (status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(DICOM_CONTENT_TYPE));
    }
    response
}
