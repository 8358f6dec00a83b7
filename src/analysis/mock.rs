use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use super::{AnalysisError, SkinAnalyzer};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub enum SkinType {
  #[serde(rename = "干性皮肤")]
  Dry,
  #[serde(rename = "油性皮肤")]
  Oily,
  #[serde(rename = "中性皮肤")]
  Normal,
  #[serde(rename = "混合型皮肤")]
  Combination,
  #[serde(rename = "敏感性皮肤")]
  Sensitive,
}

impl SkinType {
  pub const ALL: [SkinType; 5] = [
    SkinType::Dry,
    SkinType::Oily,
    SkinType::Normal,
    SkinType::Combination,
    SkinType::Sensitive,
  ];

  pub fn recommendations(&self) -> &'static [&'static str] {
    match self {
      SkinType::Dry => &[
        "保持皮肤充分保湿，使用含有透明质酸、甘油等保湿成分的护肤品",
        "减少去角质频率，避免使用刺激性强的清洁产品",
        "注意环境湿度，可使用加湿器增加空气湿度",
        "选择温和的洁面产品，避免过度清洁",
      ],
      SkinType::Oily => &[
        "保持皮肤清洁，使用控油型洁面产品",
        "注意T区控油，可使用含有水杨酸的护肤品",
        "避免使用过于油腻的护肤品，选择清爽型产品",
        "饮食尽量清淡，减少高油高糖食物摄入",
      ],
      SkinType::Normal => &[
        "保持良好的生活习惯，均衡饮食，充足睡眠",
        "定期护理皮肤，保持皮肤健康状态",
        "注意防晒，预防皮肤老化",
        "使用适合自己肤质的基础护肤品",
      ],
      SkinType::Combination => &[
        "分区护理，T区注意控油，两颊注意保湿",
        "选择适合混合型皮肤的护肤品，避免过于油腻或过于干燥",
        "保持皮肤清洁，但不要过度清洁",
        "定期去角质，保持毛孔通畅",
      ],
      SkinType::Sensitive => &[
        "使用温和、无刺激的护肤品，避免含有酒精、香料等刺激性成分的产品",
        "注意防晒，选择物理防晒产品",
        "避免频繁更换护肤品，减少皮肤过敏风险",
        "保持皮肤屏障健康，可使用含有神经酰胺的护肤品",
      ],
    }
  }
}

pub const GENERAL_RECOMMENDATIONS: [&str; 3] = [
  "保持良好的生活习惯，饮食均衡，充足睡眠",
  "注意防晒，减少紫外线对皮肤的伤害",
  "定期清洁皮肤，保持毛孔通畅",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct SkinReport {
  pub skin_type: SkinType,
  pub moisture_level: u8,
  pub oil_level: u8,
  pub pigmentation_level: u8,
  pub sensitivity_level: u8,
  pub recommendations: Vec<String>,
}

/// Fabricates a plausible report. The image itself is never inspected.
pub fn analyze_skin<R: Rng>(rng: &mut R, image: &Path) -> SkinReport {
  info!("running mock analysis for {}", image.display());

  let skin_type = SkinType::ALL[rng.random_range(0..SkinType::ALL.len())];

  let moisture_level = rng.random_range(20..=90);
  let oil_level = rng.random_range(20..=90);
  let pigmentation_level = rng.random_range(5..=40);
  let sensitivity_level = rng.random_range(10..=70);

  let mut recommendations: Vec<String> = skin_type
    .recommendations()
    .iter()
    .map(|r| r.to_string())
    .collect();

  let extra = rng.random_range(1..=2);
  recommendations.extend(
    GENERAL_RECOMMENDATIONS
      .choose_multiple(rng, extra)
      .map(|r| r.to_string()),
  );

  SkinReport {
    skin_type,
    moisture_level,
    oil_level,
    pigmentation_level,
    sensitivity_level,
    recommendations,
  }
}

pub struct MockAnalyzer {
  rng: Mutex<StdRng>,
}

impl MockAnalyzer {
  /// A fixed seed makes the sequence of reports reproducible.
  pub fn new(seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };

    Self {
      rng: Mutex::new(rng),
    }
  }
}

#[async_trait]
impl SkinAnalyzer for MockAnalyzer {
  async fn analyze(&self, image: &Path) -> Result<Value, AnalysisError> {
    let report = {
      let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      analyze_skin(&mut *rng, image)
    };

    serde_json::to_value(report).map_err(|e| AnalysisError::Format(e.to_string()))
  }
}
