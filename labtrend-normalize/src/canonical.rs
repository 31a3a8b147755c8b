//! Indicator-name canonicalization.

/// Report spellings that name the same indicator as a canonical entry.
const NAME_SYNONYMS: [(&str, &str); 9] = [
    ("中性粒细胞绝对值", "中性粒细胞计数"),
    ("淋巴细胞绝对值", "淋巴细胞计数"),
    ("单核细胞绝对值", "单核细胞计数"),
    ("嗜酸性粒细胞绝对值", "嗜酸性粒细胞计数"),
    ("嗜碱性粒细胞绝对值", "嗜碱性粒细胞计数"),
    ("有核红细胞绝对值", "有核红细胞计数"),
    ("红细胞计数", "红细胞"),
    ("红细胞数", "红细胞"),
    ("血红蛋白", "血红蛋白浓度"),
];

/// Canonical name for `raw`, or `raw` itself when it has no synonym entry.
pub fn canonicalize(raw: &str) -> String {
    NAME_SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| raw.to_string())
}
