//! 通用工具函数

use uuid::Uuid;

const CUSTOM_TEMPLATE_PREFIX: &str = "custom_";

/// 生成用户自定义模板的唯一标识
pub fn generate_template_id() -> String {
    format!("{}{}", CUSTOM_TEMPLATE_PREFIX, Uuid::new_v4().simple())
}

/// 是否为用户自定义模板的标识
pub fn is_custom_template_id(id: &str) -> bool {
    id.len() > CUSTOM_TEMPLATE_PREFIX.len() && id.starts_with(CUSTOM_TEMPLATE_PREFIX)
}

/// 不区分大小写的子串匹配，空关键字总是匹配
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_template_id() {
        let id = generate_template_id();
        assert!(is_custom_template_id(&id));
        assert_ne!(id, generate_template_id());
    }

    #[test]
    fn test_is_custom_template_id() {
        assert!(!is_custom_template_id("common_cold"));
        assert!(!is_custom_template_id("custom_"));
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Asha Rai", "RAI"));
        assert!(contains_ignore_case("anything", ""));
        assert!(!contains_ignore_case("Asha Rai", "bikash"));
    }
}
