//! # DICOM处理模块
//!
//! 上传文件的DICOM格式识别、头部元数据提取以及CT窗宽窗位预设。
//! 像素解码和渲染由查看器前端负责，这里只读取到像素数据之前的标签。

pub mod parser;
pub mod presets;

pub use parser::{is_dicom, parse_patient_age, DicomHeader};
pub use presets::{WindowPreset, CT_PRESETS};
