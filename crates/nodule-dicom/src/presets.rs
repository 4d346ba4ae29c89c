//! CT窗宽窗位预设

use serde::Serialize;

/// 窗宽窗位
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowPreset {
    pub name: &'static str,
    pub center: f64,
    pub width: f64,
}

impl WindowPreset {
    pub const LUNG: WindowPreset = WindowPreset { name: "Lung", center: -600.0, width: 1500.0 };
    pub const MEDIASTINUM: WindowPreset = WindowPreset { name: "Mediastinum", center: 50.0, width: 350.0 };
    pub const BONE: WindowPreset = WindowPreset { name: "Bone", center: 300.0, width: 2000.0 };
    pub const SOFT_TISSUE: WindowPreset = WindowPreset { name: "Soft Tissue", center: 40.0, width: 400.0 };

    /// 按名称查找内置预设（忽略大小写）
    pub fn by_name(name: &str) -> Option<WindowPreset> {
        CT_PRESETS
            .iter()
            .copied()
            .find(|preset| preset.name.eq_ignore_ascii_case(name.trim()))
    }

    /// 窗口显示范围 (下限, 上限)
    pub fn range(&self) -> (f64, f64) {
        (self.center - self.width / 2.0, self.center + self.width / 2.0)
    }
}

/// 胸部CT常用预设，肺窗在前
pub const CT_PRESETS: [WindowPreset; 4] = [
    WindowPreset::LUNG,
    WindowPreset::MEDIASTINUM,
    WindowPreset::BONE,
    WindowPreset::SOFT_TISSUE,
];
