//! 提交身份
//!
//! 一次运行只提供一次，运行期间不可变。

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, CrowdError};

/// 双花括号形式的令牌占位符（先于单花括号替换）
pub const TOKEN_PLACEHOLDER_DOUBLE: &str = "{{token}}";
/// 单花括号形式的令牌占位符
pub const TOKEN_PLACEHOLDER: &str = "{token}";

/// 主题行的最大字符数
const SUBJECT_MAX_CHARS: usize = 60;

/// 要注入表单的身份信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// 留言模板，可包含令牌占位符
    pub message: String,
    pub name: String,
    pub email: String,
    pub website: String,
    pub phone: String,
    pub company: String,
    /// 替换进留言的令牌
    pub token: String,
    /// 名字为空时使用
    #[serde(alias = "fallbackName")]
    pub fallback_name: String,
    /// 留言为空时使用的兜底文本
    #[serde(alias = "fallbackMessage")]
    pub fallback_message: String,
    /// 主题字段使用的文本
    pub subject: String,
}

impl Identity {
    /// 渲染留言：令牌占位符原样替换，其他内容保持不变
    pub fn render_message(&self) -> String {
        let template = if self.message.trim().is_empty() {
            &self.fallback_message
        } else {
            &self.message
        };
        template
            .replace(TOKEN_PLACEHOLDER_DOUBLE, &self.token)
            .replace(TOKEN_PLACEHOLDER, &self.token)
    }

    /// 展示用的名字
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.fallback_name
        } else {
            &self.name
        }
    }

    /// 主题字段的取值
    pub fn subject_line(&self) -> String {
        if !self.subject.trim().is_empty() {
            return self.subject.clone();
        }
        let rendered = self.render_message();
        let first_line = rendered.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        first_line.trim().chars().take(SUBJECT_MAX_CHARS).collect()
    }

    /// 校验是否具备提交所需的最少字段
    pub fn validate(&self) -> AppResult<()> {
        if self.display_name().trim().is_empty() {
            return Err(CrowdError::validation("身份信息缺少名字（name / fallback_name）"));
        }
        if self.render_message().trim().is_empty() {
            return Err(CrowdError::validation(
                "身份信息缺少留言（message / fallback_message）",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            message: "Great post! Ref: {token}".to_string(),
            name: "Anna".to_string(),
            email: "anna@example.org".to_string(),
            token: "T-42".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_message_substitutes_token_verbatim() {
        assert_eq!(identity().render_message(), "Great post! Ref: T-42");
    }

    #[test]
    fn test_render_message_double_brace_placeholder() {
        let mut id = identity();
        id.message = "see {{token}} and {token}".to_string();
        assert_eq!(id.render_message(), "see T-42 and T-42");
    }

    #[test]
    fn test_render_message_falls_back_when_empty() {
        let mut id = identity();
        id.message = "   ".to_string();
        id.fallback_message = "Thanks ({token})".to_string();
        assert_eq!(id.render_message(), "Thanks (T-42)");
    }

    #[test]
    fn test_display_name_fallback() {
        let mut id = identity();
        id.name.clear();
        id.fallback_name = "Guest".to_string();
        assert_eq!(id.display_name(), "Guest");
    }

    #[test]
    fn test_subject_line_uses_first_message_line() {
        let mut id = identity();
        id.message = "\nHello there\nsecond line".to_string();
        assert_eq!(id.subject_line(), "Hello there");
        id.subject = "Explicit".to_string();
        assert_eq!(id.subject_line(), "Explicit");
    }

    #[test]
    fn test_validate_requires_name_and_message() {
        assert!(identity().validate().is_ok());
        let mut id = identity();
        id.message.clear();
        assert!(matches!(id.validate(), Err(CrowdError::Validation(_))));
        let mut id = identity();
        id.name.clear();
        assert!(id.validate().is_err());
    }
}
