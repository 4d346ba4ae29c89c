//! DICOM头部解析
//!
//! 只读取像素数据之前的数据集，提取工作列表和查看器需要的标签。

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, OpenFileOptions};
use nodule_core::{NoduleError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::presets::WindowPreset;

/// 文件前导区长度
const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC: &[u8; 4] = b"DICM";

/// 判断字节内容是否为带前导区的DICOM Part 10文件
pub fn is_dicom(bytes: &[u8]) -> bool {
    bytes.len() >= PREAMBLE_LEN + DICM_MAGIC.len()
        && &bytes[PREAMBLE_LEN..PREAMBLE_LEN + DICM_MAGIC.len()] == DICM_MAGIC
}

/// 解析DICOM年龄字符串（AS），仅支持以年为单位，例如 "045Y" -> 45
pub fn parse_patient_age(value: &str) -> Option<i32> {
    let digits = value.trim().strip_suffix(['Y', 'y'])?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// 从DICOM文件提取的头部信息
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DicomHeader {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_age: Option<String>,
    pub patient_sex: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub instance_number: Option<i32>,
    pub slice_location: Option<f64>,
    pub rows: Option<i32>,
    pub columns: Option<i32>,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

impl DicomHeader {
    /// 读取文件直到像素数据并提取头部
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading DICOM header from {:?}", path);

        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| {
                warn!("Failed to parse DICOM file {:?}: {}", path, e);
                NoduleError::Dicom(format!("Unable to parse DICOM file {}: {}", path.display(), e))
            })?;

        Ok(Self::from_object(&obj))
    }

    fn from_object(obj: &DefaultDicomObject) -> Self {
        Self {
            patient_name: string_element(obj, tags::PATIENT_NAME),
            patient_id: string_element(obj, tags::PATIENT_ID),
            patient_age: string_element(obj, tags::PATIENT_AGE),
            patient_sex: string_element(obj, tags::PATIENT_SEX),
            study_date: string_element(obj, tags::STUDY_DATE),
            study_description: string_element(obj, tags::STUDY_DESCRIPTION),
            series_description: string_element(obj, tags::SERIES_DESCRIPTION),
            modality: string_element(obj, tags::MODALITY),
            instance_number: int_element(obj, tags::INSTANCE_NUMBER),
            slice_location: float_element(obj, tags::SLICE_LOCATION),
            rows: int_element(obj, tags::ROWS),
            columns: int_element(obj, tags::COLUMNS),
            window_center: float_element(obj, tags::WINDOW_CENTER),
            window_width: float_element(obj, tags::WINDOW_WIDTH),
        }
    }

    /// 患者年龄（岁）
    pub fn age_years(&self) -> Option<i32> {
        self.patient_age.as_deref().and_then(parse_patient_age)
    }

    /// 可读的患者姓名，"Family^Given" 转为 "Given Family"
    pub fn display_name(&self) -> Option<String> {
        let raw = self.patient_name.as_deref()?;
        let mut parts = raw.split('^').map(str::trim);
        let family = parts.next().unwrap_or_default();
        let given = parts.next().unwrap_or_default();

        let name = match (given.is_empty(), family.is_empty()) {
            (false, false) => format!("{} {}", given, family),
            (true, false) => family.to_string(),
            (false, true) => given.to_string(),
            (true, true) => return None,
        };
        Some(name)
    }

    /// 文件自带窗宽窗位时使用文件值，否则使用肺窗
    pub fn default_window(&self) -> WindowPreset {
        match (self.window_center, self.window_width) {
            (Some(center), Some(width)) if width > 0.0 => WindowPreset { name: "Default", center, width },
            _ => WindowPreset::LUNG,
        }
    }
}

fn string_element(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    let value = obj.element(tag).ok()?.to_str().ok()?;
    let value = value.trim_end_matches(['\0', ' ']).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn int_element(obj: &DefaultDicomObject, tag: Tag) -> Option<i32> {
    obj.element(tag).ok()?.to_int::<i32>().ok()
}

fn float_element(obj: &DefaultDicomObject, tag: Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}
