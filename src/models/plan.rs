//! 提交计划
//!
//! 每次尝试重新生成，不做持久化。

use serde::Serialize;

/// 表单提交方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// 解析 `method` 属性，缺失或无法识别时按 POST 处理
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "get" => Method::Get,
            _ => Method::Post,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// 表单编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Enctype {
    UrlEncoded,
    Multipart,
}

impl Enctype {
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("multipart/form-data") => Enctype::Multipart,
            _ => Enctype::UrlEncoded,
        }
    }
}

/// 字段的语义角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldRole {
    Name,
    Email,
    Website,
    Phone,
    Company,
    Subject,
    Message,
    /// 同意条款类复选框
    Consent,
    /// 验证码输入框（无法自动填写）
    Captcha,
}

impl FieldRole {
    /// 会被填入身份信息的角色
    pub fn is_identity(self) -> bool {
        !matches!(self, FieldRole::Consent | FieldRole::Captcha)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldRole::Name => "name",
            FieldRole::Email => "email",
            FieldRole::Website => "website",
            FieldRole::Phone => "phone",
            FieldRole::Company => "company",
            FieldRole::Subject => "subject",
            FieldRole::Message => "message",
            FieldRole::Consent => "consent",
            FieldRole::Captcha => "captcha",
        }
    }
}

/// 字段最终的处理方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldDisposition {
    /// 隐藏字段，原值保留
    Hidden,
    /// 蜜罐字段，提交空值
    Honeypot,
    /// 提交按钮，原值透传
    Submit,
    /// 按角色填写
    Role(FieldRole),
    /// 未识别，保留默认值
    Default,
}

/// 单个字段的分类报告（用于日志诊断）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedField {
    pub name: String,
    pub disposition: FieldDisposition,
    /// 命中的信号来源（name / label / placeholder / table / type / default）
    pub signal: &'static str,
    /// 值是否进入了提交数据（同名字段只有第一个生效）
    pub submitted: bool,
}

/// 一个表单的提交计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPlan {
    /// 绝对地址
    pub action: String,
    pub method: Method,
    pub enctype: Enctype,
    /// 字段名 → 值（同名字段只保留第一次出现）
    pub payload: Vec<(String, String)>,
    /// 蜜罐字段名（提交空值）
    pub skipped: Vec<String>,
    pub fields: Vec<ClassifiedField>,
    /// 表单含验证码
    pub captcha: bool,
    pub ok: bool,
    /// 不可用时的原因
    pub rejection: Option<String>,
}

impl SubmissionPlan {
    /// 按字段名取值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.payload
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 已分配给某个角色、且值真正会被提交的字段名
    pub fn field_for(&self, role: FieldRole) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.submitted && f.disposition == FieldDisposition::Role(role))
            .map(|f| f.name.as_str())
    }

    /// 简要描述，用于日志和探测记录
    pub fn summary(&self) -> String {
        let roles: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.submitted)
            .filter_map(|f| match f.disposition {
                FieldDisposition::Role(role) => Some(format!("{}={}", f.name, role.as_str())),
                _ => None,
            })
            .collect();
        format!(
            "{} {} [{}]{}{}",
            self.method.as_str(),
            self.action,
            roles.join(", "),
            if self.skipped.is_empty() {
                String::new()
            } else {
                format!(" 蜜罐: {}", self.skipped.join(","))
            },
            if self.captcha { " 含验证码" } else { "" }
        )
    }
}
