//! 表单定位与字段分类服务 - 业务能力层
//!
//! 纯函数：(页面 HTML, 页面地址, 身份) → 提交计划，或"没有可用表单"。
//! 不做任何 I/O，不持有状态。
//!
//! ## 流程
//! 1. 容错解析 HTML（缺少字符集声明时补一个 `<meta charset="utf-8">`）
//! 2. 按文档顺序逐个评估 `<form>`，第一个可用的胜出
//! 3. 解析 action / method / enctype
//! 4. 对每个控件按信号优先级判定角色：
//!    hidden → submit → 蜜罐 → 勾选/单选/下拉 → 验证码 → 输入类型 → name/id → label → placeholder → 表格/前置文本
//!    （textarea 只认 name/id，否则就是留言）
//! 5. 按角色填值，生成提交计划

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::identity::Identity;
use crate::models::plan::{
    ClassifiedField, Enctype, FieldDisposition, FieldRole, Method, SubmissionPlan,
};
use crate::services::field_dictionary as dict;

/// 前置文本超过这个长度就不再当作字段标签
const MAX_HINT_CHARS: usize = 60;

const CHARSET_META: &str = r#"<meta charset="utf-8">"#;

static HEAD_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>").ok());
static CHARSET_DECLARATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<meta[^>]+charset").ok());
static STYLE_RULE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").ok());
static OPACITY_ZERO: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(^|;)opacity:0(\.0+)?(;|!|$)").ok());
static NEGATIVE_OFFSET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(^|;)(left|top|right|bottom|margin-left|margin-top|text-indent):-\d{3,}").ok()
});

/// 缺少字符集声明时注入 `<meta charset="utf-8">`
pub fn ensure_charset(html: &str) -> Cow<'_, str> {
    let declared = CHARSET_DECLARATION
        .as_ref()
        .map(|re| re.is_match(html))
        .unwrap_or(true);
    if declared {
        return Cow::Borrowed(html);
    }

    match HEAD_TAG.as_ref().and_then(|re| re.find(html)) {
        Some(head) => {
            let mut patched = String::with_capacity(html.len() + CHARSET_META.len());
            patched.push_str(&html[..head.end()]);
            patched.push_str(CHARSET_META);
            patched.push_str(&html[head.end()..]);
            Cow::Owned(patched)
        }
        None => Cow::Owned(format!("{}{}", CHARSET_META, html)),
    }
}

/// 内联样式或样式表规则是否让元素不可见
fn style_hides(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    compact.contains("display:none")
        || compact.contains("visibility:hidden")
        || OPACITY_ZERO
            .as_ref()
            .is_some_and(|re| re.is_match(&compact))
        || NEGATIVE_OFFSET
            .as_ref()
            .is_some_and(|re| re.is_match(&compact))
}

fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_control(el: &ElementRef<'_>) -> bool {
    matches!(
        el.value().name(),
        "input" | "textarea" | "select" | "button"
    )
}

fn contains_control(el: ElementRef<'_>) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| is_control(&e))
}

fn inside_form(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "form")
}

/// 控件的种类：input 取 type（默认 text），button 归为 submit/reset/button，其余取标签名
fn control_kind(el: ElementRef<'_>) -> String {
    let declared = el
        .value()
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty());

    match el.value().name() {
        "input" => declared.unwrap_or_else(|| "text".to_string()),
        "button" => match declared.as_deref() {
            Some("reset") => "reset".to_string(),
            Some("button") => "button".to_string(),
            _ => "submit".to_string(),
        },
        other => other.to_string(),
    }
}

fn is_text_like(kind: &str) -> bool {
    matches!(
        kind,
        "text" | "email" | "url" | "tel" | "search" | "number" | "textarea"
    )
}

fn role_value(role: FieldRole, identity: &Identity) -> String {
    match role {
        FieldRole::Name => identity.display_name().to_string(),
        FieldRole::Email => identity.email.clone(),
        FieldRole::Website => identity.website.clone(),
        FieldRole::Phone => identity.phone.clone(),
        FieldRole::Company => identity.company.clone(),
        FieldRole::Subject => identity.subject_line(),
        FieldRole::Message => identity.render_message(),
        FieldRole::Consent | FieldRole::Captcha => String::new(),
    }
}

/// 解析期间用到的选择器
struct Selectors {
    form: Selector,
    control: Selector,
    base: Selector,
    label_for: Selector,
    style: Selector,
    option: Selector,
    captcha_widget: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            form: Selector::parse("form").ok()?,
            control: Selector::parse("input, textarea, select, button").ok()?,
            base: Selector::parse("base[href]").ok()?,
            label_for: Selector::parse("label[for]").ok()?,
            style: Selector::parse("style").ok()?,
            option: Selector::parse("option").ok()?,
            captcha_widget: Selector::parse(
                "[data-sitekey], .g-recaptcha, .h-captcha, .cf-turnstile",
            )
            .ok()?,
        })
    }
}

/// 单个控件的分类结果
struct Classified {
    disposition: FieldDisposition,
    signal: &'static str,
    value: String,
}

impl Classified {
    fn new(disposition: FieldDisposition, signal: &'static str, value: impl Into<String>) -> Self {
        Self {
            disposition,
            signal,
            value: value.into(),
        }
    }
}

/// 页面级上下文：地址、label 映射、样式表隐藏规则
struct PageContext<'s> {
    selectors: &'s Selectors,
    page: Url,
    base: Url,
    labels: HashMap<String, String>,
    hidden_classes: HashSet<String>,
    hidden_ids: HashSet<String>,
}

impl<'s> PageContext<'s> {
    fn new(selectors: &'s Selectors, doc: &Html, page: Url) -> Self {
        let base = doc
            .select(&selectors.base)
            .find_map(|el| el.value().attr("href"))
            .and_then(|href| page.join(href.trim()).ok())
            .unwrap_or_else(|| page.clone());

        let mut labels = HashMap::new();
        for label in doc.select(&selectors.label_for) {
            if let Some(target) = label.value().attr("for") {
                let text = normalize_text(label.text());
                if !text.is_empty() {
                    labels.entry(target.to_string()).or_insert(text);
                }
            }
        }

        let mut ctx = Self {
            selectors,
            page,
            base,
            labels,
            hidden_classes: HashSet::new(),
            hidden_ids: HashSet::new(),
        };
        ctx.collect_stylesheet_rules(doc);
        ctx
    }

    /// 收集 `<style>` 中隐藏简单 `.class` / `#id` 选择器的规则
    fn collect_stylesheet_rules(&mut self, doc: &Html) {
        let Some(rule_re) = STYLE_RULE.as_ref() else {
            return;
        };
        let css: String = doc
            .select(&self.selectors.style)
            .flat_map(|el| el.text())
            .collect();

        for caps in rule_re.captures_iter(&css) {
            if !style_hides(&caps[2]) {
                continue;
            }
            for selector in caps[1].split(',').map(str::trim) {
                let simple = |rest: &str| {
                    !rest.is_empty()
                        && rest
                            .chars()
                            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
                };
                if let Some(class) = selector.strip_prefix('.').filter(|r| simple(*r)) {
                    self.hidden_classes.insert(class.to_string());
                } else if let Some(id) = selector.strip_prefix('#').filter(|r| simple(*r)) {
                    self.hidden_ids.insert(id.to_string());
                }
            }
        }
    }

    /// 解析 action 为绝对地址；空 action 提交到页面本身，非 http(s) 视为无法解析
    fn resolve_action(&self, action: Option<&str>) -> Option<String> {
        let mut url = match action.map(str::trim).filter(|a| !a.is_empty()) {
            Some(action) => self.base.join(action).ok()?,
            None => self.page.clone(),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// 表单拥有的控件；`<table><form>` 错误嵌套导致表单为空时，回收所在表格中的控件
    fn form_controls<'a>(&self, form: ElementRef<'a>) -> (ElementRef<'a>, Vec<ElementRef<'a>>) {
        let owned: Vec<ElementRef<'a>> = form.select(&self.selectors.control).collect();
        if !owned.is_empty() {
            return (form, owned);
        }

        let Some(table) = form
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "table")
        else {
            return (form, owned);
        };

        let mut seen_form = false;
        let mut recovered = Vec::new();
        for el in table.descendants().filter_map(ElementRef::wrap) {
            match el.value().name() {
                "form" if el == form => seen_form = true,
                "form" if seen_form => break,
                _ if seen_form && is_control(&el) && !inside_form(el) => recovered.push(el),
                _ => {}
            }
        }
        if !recovered.is_empty() {
            debug!("表单嵌套错误，从表格中回收 {} 个控件", recovered.len());
        }
        (table, recovered)
    }

    fn is_invisible(&self, el: ElementRef<'_>) -> bool {
        let value = el.value();
        if value.attr("hidden").is_some() {
            return true;
        }
        if value.attr("style").is_some_and(style_hides) {
            return true;
        }
        if value.id().is_some_and(|id| self.hidden_ids.contains(id)) {
            return true;
        }
        value.classes().any(|c| self.hidden_classes.contains(c))
    }

    fn is_honeypot(
        &self,
        el: ElementRef<'_>,
        kind: &str,
        label: Option<&str>,
        placeholder: Option<&str>,
    ) -> bool {
        let value = el.value();
        let trap_marked = |e: ElementRef<'_>| {
            e.value().attr("name").is_some_and(dict::is_trap_marker)
                || e.value().id().is_some_and(dict::is_trap_marker)
                || e.value().classes().any(dict::is_trap_marker)
        };
        if trap_marked(el) || el.parent().and_then(ElementRef::wrap).is_some_and(trap_marked) {
            return true;
        }

        if label.is_some_and(dict::is_leave_empty_hint)
            || placeholder.is_some_and(dict::is_leave_empty_hint)
        {
            return true;
        }

        if is_text_like(kind)
            && value.attr("tabindex").map(str::trim) == Some("-1")
            && value
                .attr("autocomplete")
                .is_some_and(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "off" | "nope"))
        {
            return true;
        }

        std::iter::once(el)
            .chain(el.ancestors().filter_map(ElementRef::wrap))
            .any(|e| self.is_invisible(e))
    }

    fn label_text(&self, el: ElementRef<'_>) -> Option<String> {
        if let Some(text) = el.value().id().and_then(|id| self.labels.get(id)) {
            return Some(text.clone());
        }
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "label")
            .map(|label| normalize_text(label.text()))
            .filter(|t| !t.is_empty())
    }

    fn select_value(&self, el: ElementRef<'_>) -> String {
        let mut options = el.select(&self.selectors.option).peekable();
        let first = options.peek().copied();
        options
            .find(|o| o.value().attr("selected").is_some())
            .or(first)
            .map(|o| {
                o.value()
                    .attr("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| normalize_text(o.text()))
            })
            .unwrap_or_default()
    }

    fn has_captcha_widget(&self, scope: ElementRef<'_>) -> bool {
        scope.select(&self.selectors.captcha_widget).next().is_some()
    }

    fn infer_role(
        &self,
        el: ElementRef<'_>,
        kind: &str,
        name: &str,
        label: Option<&str>,
        placeholder: Option<&str>,
    ) -> Option<(FieldRole, &'static str)> {
        match kind {
            "email" => return Some((FieldRole::Email, "type")),
            "url" => return Some((FieldRole::Website, "type")),
            "tel" => return Some((FieldRole::Phone, "type")),
            _ => {}
        }

        if let Some(role) = dict::classify_text(name)
            .or_else(|| el.value().id().and_then(dict::classify_text))
        {
            return Some((role, "name"));
        }

        // 多行文本框只接受 name/id 给出的角色，否则就是留言
        if kind == "textarea" {
            return Some((FieldRole::Message, "textarea"));
        }

        if let Some(role) = label.and_then(dict::classify_text) {
            return Some((role, "label"));
        }
        if let Some(role) = placeholder.and_then(dict::classify_text) {
            return Some((role, "placeholder"));
        }
        preceding_text(el).and_then(|(text, signal)| {
            dict::classify_text(&text).map(|role| (role, signal))
        })
    }

    /// 按信号优先级给单个控件定性。返回 `None` 表示不提交（未勾选的复选框等）
    fn classify_control(
        &self,
        el: ElementRef<'_>,
        kind: &str,
        name: &str,
        identity: &Identity,
    ) -> Option<Classified> {
        let value = el.value();
        let default_value = if kind == "textarea" {
            el.text().collect::<String>()
        } else {
            value.attr("value").unwrap_or_default().to_string()
        };

        if kind == "hidden" {
            return Some(Classified::new(FieldDisposition::Hidden, "hidden", default_value));
        }
        if kind == "submit" {
            return Some(Classified::new(FieldDisposition::Submit, "submit", default_value));
        }

        let label = self.label_text(el);
        let placeholder = value
            .attr("placeholder")
            .map(|p| normalize_text(std::iter::once(p)))
            .filter(|p| !p.is_empty());

        if self.is_honeypot(el, kind, label.as_deref(), placeholder.as_deref()) {
            return Some(Classified::new(FieldDisposition::Honeypot, "honeypot", ""));
        }

        let checked_value = || {
            value
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| "on".to_string())
        };
        match kind {
            "checkbox" => {
                let hint = format!(
                    "{} {} {}",
                    name,
                    value.id().unwrap_or_default(),
                    label.as_deref().unwrap_or_default()
                );
                if dict::is_consent(&hint) {
                    return Some(Classified::new(
                        FieldDisposition::Role(FieldRole::Consent),
                        "consent",
                        checked_value(),
                    ));
                }
                return value
                    .attr("checked")
                    .map(|_| Classified::new(FieldDisposition::Default, "checked", checked_value()));
            }
            "radio" => {
                return value
                    .attr("checked")
                    .map(|_| Classified::new(FieldDisposition::Default, "checked", checked_value()));
            }
            "select" => {
                return Some(Classified::new(
                    FieldDisposition::Default,
                    "select",
                    self.select_value(el),
                ));
            }
            _ => {}
        }

        if dict::is_captcha(name) || value.id().is_some_and(dict::is_captcha) {
            return Some(Classified::new(
                FieldDisposition::Role(FieldRole::Captcha),
                "captcha",
                default_value,
            ));
        }

        match self.infer_role(el, kind, name, label.as_deref(), placeholder.as_deref()) {
            Some((role, signal)) => {
                let filled = role_value(role, identity);
                let value = if filled.is_empty() { default_value } else { filled };
                Some(Classified::new(FieldDisposition::Role(role), signal, value))
            }
            None => Some(Classified::new(FieldDisposition::Default, "default", default_value)),
        }
    }

    /// 评估单个表单
    fn evaluate_form(&self, form: ElementRef<'_>, identity: &Identity) -> SubmissionPlan {
        let action = self.resolve_action(form.value().attr("action"));
        let (scope, controls) = self.form_controls(form);

        let mut plan = SubmissionPlan {
            action: action.clone().unwrap_or_default(),
            method: Method::from_attr(form.value().attr("method")),
            enctype: Enctype::from_attr(form.value().attr("enctype")),
            payload: Vec::new(),
            skipped: Vec::new(),
            fields: Vec::new(),
            captcha: self.has_captcha_widget(scope),
            ok: false,
            rejection: None,
        };

        let mut seen_names: HashSet<String> = HashSet::new();
        let mut roles_by_name: HashMap<String, FieldRole> = HashMap::new();
        let mut conflict: Option<String> = None;
        let mut has_password = false;
        let mut submit_sent = false;

        for control in controls {
            let kind = control_kind(control);
            if kind == "password" {
                has_password = true;
                continue;
            }
            let Some(name) = control
                .value()
                .attr("name")
                .map(str::trim)
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            if control.value().attr("disabled").is_some()
                || matches!(kind.as_str(), "file" | "image" | "reset" | "button")
            {
                continue;
            }
            if kind == "submit" {
                if submit_sent {
                    continue;
                }
                submit_sent = true;
            }

            let Some(classified) = self.classify_control(control, &kind, name, identity) else {
                continue;
            };

            match classified.disposition {
                FieldDisposition::Role(FieldRole::Captcha) => plan.captcha = true,
                FieldDisposition::Role(role) if role.is_identity() => {
                    match roles_by_name.get(name) {
                        Some(previous) if *previous != role => {
                            conflict.get_or_insert_with(|| name.to_string());
                        }
                        Some(_) => {}
                        None => {
                            roles_by_name.insert(name.to_string(), role);
                        }
                    }
                }
                FieldDisposition::Honeypot => plan.skipped.push(name.to_string()),
                _ => {}
            }

            let submitted = seen_names.insert(name.to_string());
            if submitted {
                plan.payload.push((name.to_string(), classified.value));
            }
            plan.fields.push(ClassifiedField {
                name: name.to_string(),
                disposition: classified.disposition,
                signal: classified.signal,
                submitted,
            });
        }

        let has_message = plan.field_for(FieldRole::Message).is_some();
        let has_name_and_email = plan.field_for(FieldRole::Name).is_some()
            && plan.field_for(FieldRole::Email).is_some();

        plan.rejection = if action.is_none() {
            Some("提交地址无法解析".to_string())
        } else if has_password {
            Some("含密码字段（登录/注册表单）".to_string())
        } else if let Some(name) = conflict {
            Some(format!("字段 {} 的角色冲突", name))
        } else if !has_message && !has_name_and_email {
            Some("没有留言字段，也没有名字+邮箱字段".to_string())
        } else {
            None
        };
        plan.ok = plan.rejection.is_none();
        plan
    }
}

/// 表格单元格或相邻兄弟节点中、控件之前最近的文本
fn preceding_text(el: ElementRef<'_>) -> Option<(String, &'static str)> {
    let cell = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| !matches!(a.value().name(), "form" | "table"))
        .find(|a| matches!(a.value().name(), "td" | "th"));

    let found = match cell {
        Some(cell) => table_cell_text(cell, el).map(|t| (t, "table")),
        None => sibling_text(el).map(|t| (t, "text")),
    };
    found.filter(|(t, _)| t.chars().count() <= MAX_HINT_CHARS)
}

/// 文本节点的父元素不是选项、按钮或脚本之类
fn is_label_parent(parent: Option<ElementRef<'_>>) -> bool {
    parent.map_or(true, |p| {
        !matches!(
            p.value().name(),
            "option" | "textarea" | "select" | "button" | "script" | "style"
        )
    })
}

fn table_cell_text(cell: ElementRef<'_>, control: ElementRef<'_>) -> Option<String> {
    // 同一单元格内、控件之前的文本
    let mut nearest: Option<String> = None;
    for node in cell.descendants() {
        if node.id() == control.id() {
            break;
        }
        if let Some(el) = ElementRef::wrap(node) {
            if is_control(&el) {
                nearest = None;
            }
            continue;
        }
        if let Some(text) = node.value().as_text() {
            let text = text.trim();
            if !text.is_empty() && is_label_parent(node.parent().and_then(ElementRef::wrap)) {
                nearest = Some(normalize_text(std::iter::once(text)));
            }
        }
    }
    if nearest.is_some() {
        return nearest;
    }

    // 左侧的单元格
    for sibling in cell.prev_siblings().filter_map(ElementRef::wrap) {
        if !matches!(sibling.value().name(), "td" | "th") {
            continue;
        }
        if contains_control(sibling) {
            break;
        }
        let text = normalize_text(sibling.text());
        if !text.is_empty() {
            return Some(text);
        }
    }

    // 上一行的同列单元格
    let row = cell.parent().and_then(ElementRef::wrap)?;
    let column = cell
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|s| matches!(s.value().name(), "td" | "th"))
        .count();
    let previous_row = row
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|r| r.value().name() == "tr")?;
    if contains_control(previous_row) {
        return None;
    }
    let text = previous_row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .nth(column)
        .map(|c| normalize_text(c.text()))
        .unwrap_or_else(|| normalize_text(previous_row.text()));
    Some(text).filter(|t| !t.is_empty())
}

fn sibling_text(el: ElementRef<'_>) -> Option<String> {
    let mut current = el;
    for _ in 0..2 {
        for sibling in current.prev_siblings() {
            if let Some(text) = sibling.value().as_text() {
                let text = normalize_text(std::iter::once(&**text));
                if !text.is_empty() {
                    return Some(text);
                }
                continue;
            }
            if let Some(sibling) = ElementRef::wrap(sibling) {
                if is_control(&sibling) || contains_control(sibling) {
                    return None;
                }
                let text = normalize_text(sibling.text());
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }

        // 控件是父元素里唯一的控件时，再看父元素之前的兄弟
        let parent = current.parent().and_then(ElementRef::wrap)?;
        if matches!(parent.value().name(), "form" | "body")
            || parent
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(is_control)
                .count()
                > 1
        {
            return None;
        }
        current = parent;
    }
    None
}

/// 表单定位器
///
/// 职责：
/// - 在页面中找出第一个可提交的表单
/// - 给每个字段分配角色并填值
/// - 不发起网络请求
pub struct FormLocator<'i> {
    identity: &'i Identity,
}

impl<'i> FormLocator<'i> {
    pub fn new(identity: &'i Identity) -> Self {
        Self { identity }
    }

    /// 定位第一个可用表单；没有则返回 `None`（属于正常分类结果，不是错误）
    pub fn locate(&self, html: &str, page_url: &str) -> Option<SubmissionPlan> {
        self.evaluate(html, page_url, true)
            .pop()
            .filter(|plan| plan.ok)
    }

    /// 评估页面中的所有表单（用于诊断）
    pub fn candidates(&self, html: &str, page_url: &str) -> Vec<SubmissionPlan> {
        self.evaluate(html, page_url, false)
    }

    fn evaluate(&self, html: &str, page_url: &str, stop_at_first_ok: bool) -> Vec<SubmissionPlan> {
        let Ok(page) = Url::parse(page_url) else {
            debug!("页面地址无法解析: {}", page_url);
            return Vec::new();
        };
        let Some(selectors) = Selectors::new() else {
            return Vec::new();
        };

        let html = ensure_charset(html);
        let doc = Html::parse_document(&html);
        let ctx = PageContext::new(&selectors, &doc, page);

        let mut plans = Vec::new();
        for (index, form) in doc.select(&selectors.form).enumerate() {
            let plan = ctx.evaluate_form(form, self.identity);
            let ok = plan.ok;
            match &plan.rejection {
                Some(reason) => debug!("表单 #{} 不可用: {}", index + 1, reason),
                None => debug!("表单 #{} 可用: {}", index + 1, plan.summary()),
            }
            plans.push(plan);
            if ok && stop_at_first_ok {
                break;
            }
        }
        plans
    }
}

/// 便捷函数：`FormLocator::new(identity).locate(html, page_url)`
pub fn locate(html: &str, page_url: &str, identity: &Identity) -> Option<SubmissionPlan> {
    FormLocator::new(identity).locate(html, page_url)
}
