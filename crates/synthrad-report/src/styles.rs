//! 书写风格短语表
//!
//! 每种叙述风格持有自己的一组模板，在渲染时按病例的风格标签一次性解析。

use synthrad_core::NarrativeStyle;

/// 单一风格的短语表
#[derive(Debug)]
pub struct StylePhrases {
    pub normal_mediastinum: &'static [&'static str],
    pub normal_pleura: &'static [&'static str],
    pub normal_great_vessels: &'static [&'static str],
    pub normal_abdomen: &'static [&'static str],
    pub normal_bones: &'static [&'static str],
    pub artifact_phrases: &'static [&'static str],
    /// 占位符：{side} {size} {features}
    pub primary_lesion_phrases: &'static [&'static str],
    /// 占位符：{site} {size}
    pub metastasis_phrases: &'static [&'static str],
}

static CONCISE: StylePhrases = StylePhrases {
    normal_mediastinum: &["No pathologic mediastinal adenopathy."],
    normal_pleura: &["No pleural effusion."],
    normal_great_vessels: &["Great vessels normal."],
    normal_abdomen: &[
        "Liver homogeneous in attenuation without focal mass.",
        "Adrenal glands without nodules.",
    ],
    normal_bones: &["No destructive osseous lesion."],
    artifact_phrases: &["Motion artifact present.", "Beam-hardening artifact."],
    primary_lesion_phrases: &[
        "{side} mass {size} mm, {features}.",
        "{side} pulmonary mass {size} mm with {features}.",
    ],
    metastasis_phrases: &[
        "{site} lesion {size} mm, suspicious for metastasis.",
        "{site} nodule {size} mm, suspicious.",
    ],
};

static DETAILED: StylePhrases = StylePhrases {
    normal_mediastinum: &[
        "Mediastinum demonstrates normal contours without evidence of mass or pathologic lymphadenopathy.",
        "No mediastinal mass or pathologic adenopathy identified.",
    ],
    normal_pleura: &["Pleural spaces clear without effusion.", "No pleural effusion."],
    normal_great_vessels: &[
        "Thoracic aorta and great vessels normal in caliber and course without aneurysm or dissection.",
        "Aorta and great vessels without significant abnormality.",
    ],
    normal_abdomen: &[
        "Liver homogeneous in attenuation without focal mass.",
        "No focal hepatic lesion.",
        "Spleen normal in size.",
        "Adrenal glands without nodules.",
    ],
    normal_bones: &[
        "Osseous structures without fracture or destructive lesion.",
        "No aggressive osseous lesion.",
    ],
    artifact_phrases: &[
        "Respiratory motion limits fine detail evaluation in some areas.",
        "Beam hardening from intravascular contrast mildly limits evaluation.",
        "Mild respiratory motion artifact.",
        "Minor beam hardening from contrast.",
    ],
    primary_lesion_phrases: &[
        "There is a {size} mm mass in the {side} demonstrating {features}.",
        "A {size} mm pulmonary mass is identified in the {side} with {features}.",
        "There is a {size} mm {side} pulmonary mass with {features}.",
    ],
    metastasis_phrases: &[
        "A {size} mm lesion is present in the {site}, suspicious for metastasis.",
        "{site} metastasis {size} mm is present.",
        "{site} lesion {size} mm, compatible with metastasis.",
    ],
};

/// 取得风格对应的短语表
pub fn phrases_for(style: NarrativeStyle) -> &'static StylePhrases {
    match style {
        NarrativeStyle::Concise => &CONCISE,
        NarrativeStyle::Detailed => &DETAILED,
    }
}

/// 用 `{key}` 占位符填充模板
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    capitalize_first(&out)
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_style_has_phrases() {
        for style in NarrativeStyle::ALL {
            let p = phrases_for(style);
            assert!(!p.normal_mediastinum.is_empty());
            assert!(!p.normal_pleura.is_empty());
            assert!(!p.normal_great_vessels.is_empty());
            assert!(!p.normal_abdomen.is_empty());
            assert!(!p.normal_bones.is_empty());
            assert!(!p.artifact_phrases.is_empty());
            assert!(p.primary_lesion_phrases.iter().all(|t| t.contains("{size}")));
            assert!(p.metastasis_phrases.iter().all(|t| t.contains("{site}")));
        }
    }

    #[test]
    fn test_fill_template() {
        let text = fill(
            "{site} lesion {size} mm, suspicious for metastasis.",
            &[("site", "liver"), ("size", "14")],
        );
        assert_eq!(text, "Liver lesion 14 mm, suspicious for metastasis.");
    }
}
