//! # 上传文件存储模块
//!
//! 负责上传目录下按检查划分的DICOM文件存放、清理和种子目录扫描。

pub mod storage;

pub use storage::{upload_file_name, StoredFile, UploadStore, UPLOADS_URL_PREFIX};
