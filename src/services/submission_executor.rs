//! 表单提交服务 - 业务能力层
//!
//! 只负责"把一个提交计划发出去并判定结果"，不关心页面从哪来、结果存到哪。
//!
//! 提交成功后服务器通常会跳回完整的文章页或留言簿页，页面上随处可能出现
//! "blocked"、"Fehler" 之类的词，所以拒绝信号只在标题、错误提示区块，
//! 或去掉侧栏页脚后很短的正文里查找。

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder, Response};
use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::CrowdError;
use crate::models::plan::{Enctype, Method, SubmissionPlan};
use crate::models::result::{ResultStatus, SubmissionOutcome};
use crate::utils::logging::truncate_text;

/// 响应摘录的最大字符数
const EXCERPT_CHARS: usize = 200;

/// 正文不超过这个长度时整页都当作提示信息
const SHORT_PAGE_CHARS: usize = 300;

/// 明确被拒绝的页面文本，按词边界匹配（词干以 `\w*` 结尾）
const REJECTION_MARKERS: &[&str] = &[
    r"\berror:",
    r"\ban error occurred\b",
    r"\bduplicate comment\b",
    r"\bposting comments too quickly\b",
    r"\byou are not allowed\b",
    r"\baccess denied\b",
    r"\bforbidden\b",
    r"\bblocked\b",
    r"\bbanned\b",
    r"\bspam detected\b",
    r"\bmarked as spam\b",
    r"\binvalid captcha\b",
    r"\bincorrect captcha\b",
    r"\bwrong code\b",
    r"\binvalid security code\b",
    r"\bbłąd\b",
    r"\bnieprawidłow\w*",
    r"\bzablokowan\w*",
    r"\bfehler\b",
    r"\bungültig\w*",
    r"\bnicht erlaubt\b",
    r"\bgesperrt\b",
    r"\berror al\b",
    r"\bno permitido\b",
    r"\bhiba\b",
    r"\bérvénytelen\b",
    "错误",
    "失败",
    "禁止",
    r"\bошибка\b",
    r"\bзапрещ\w*",
    r"\berreur\b",
    r"\berrore\b",
    r"\berro ao\b",
];

/// 需要二次确认（邮件激活等）的页面文本
const CONFIRMATION_MARKERS: &[&str] = &[
    "confirm your",
    "confirmation email",
    "confirmation link",
    "verification email",
    "check your email",
    "check your inbox",
    "bestätigen sie",
    "bestätigungs",
    "potwierdź",
    "link aktywacyjny",
    "confirme su",
    "confirma tu",
    "erősítse meg",
    "请确认",
    "确认邮件",
    "подтвердите",
    "confirmez",
    "conferma",
];

/// 这些状态码本身就说明提交被拒绝
const REJECTING_STATUSES: &[u16] = &[401, 403, 404, 405, 410, 429];


static REJECTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!("(?i){}", REJECTION_MARKERS.join("|"))).ok());
static TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("title").ok());
/// 拒绝页面放提示信息的位置（包括 wp_die 的 `body#error-page`）
static NOTICE_ZONE: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse(
        "[id*=error], [class*=error], [id*=alert], [class*=alert], \
         [id=message], [class~=message], [class~=notice], [class~=wp-die-message]",
    )
    .ok()
});

/// 不可见的元素
const NON_VISIBLE: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// 判断"短页面"时不计入的元素：不可见元素加上侧栏、导航、页头页脚
const PAGE_CHROME: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "aside", "nav", "header",
    "footer",
];

fn collect_text(root: ElementRef<'_>, skip: &[&str]) -> String {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let skipped = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| skip.contains(&a.value().name()));
            (!skipped).then_some(&**text)
        })
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 提交后服务器返回的页面
#[derive(Debug, Clone, Default)]
pub struct ResponsePage {
    /// 全部可见文本
    pub text: String,
    /// 拒绝信号可能出现的文本：标题、错误提示区块、短页面的正文
    notices: String,
}

impl ResponsePage {
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        let mut notices = Vec::new();

        if let Some(title) = TITLE.as_ref().and_then(|s| doc.select(s).next()) {
            notices.push(title.text().collect::<String>());
        }
        if let Some(zone) = NOTICE_ZONE.as_ref() {
            notices.extend(doc.select(zone).map(|el| collect_text(el, NON_VISIBLE)));
        }
        let main = collect_text(root, PAGE_CHROME);
        if main.chars().count() <= SHORT_PAGE_CHARS {
            notices.push(main);
        }

        Self {
            text: collect_text(root, NON_VISIBLE),
            notices: notices.join("\n"),
        }
    }

    /// 命中的拒绝信号
    fn rejection(&self) -> Option<String> {
        REJECTION
            .as_ref()
            .and_then(|re| re.find(&self.notices))
            .map(|m| m.as_str().to_lowercase())
    }
}

/// 根据状态码和返回页面判定结果
///
/// 返回判定结果和（如有）命中的原因。
pub fn classify_response(
    http_status: u16,
    page: &ResponsePage,
    captcha: bool,
) -> (ResultStatus, Option<String>) {
    if let Some(marker) = page.rejection() {
        return (
            ResultStatus::Failed,
            Some(format!("HTTP {}，页面包含拒绝信号: {}", http_status, marker)),
        );
    }

    let lowered = page.text.to_lowercase();
    let confirmation = CONFIRMATION_MARKERS.iter().find(|m| lowered.contains(*m));

    if (200..400).contains(&http_status) {
        if let Some(marker) = confirmation {
            return (
                ResultStatus::Partial,
                Some(format!("需要二次确认: {}", marker)),
            );
        }
        if captcha {
            return (
                ResultStatus::Partial,
                Some("表单含验证码，提交结果未确认".to_string()),
            );
        }
        return (ResultStatus::Success, None);
    }

    if REJECTING_STATUSES.contains(&http_status) {
        return (
            ResultStatus::Failed,
            Some(format!("HTTP {} 拒绝了提交", http_status)),
        );
    }
    (
        ResultStatus::Partial,
        Some(format!("HTTP {}，结果不明确", http_status)),
    )
}

/// 表单提交执行器
///
/// 职责：
/// - 按计划的 method / enctype 发送请求
/// - 网络错误时最多重试一次
/// - 判定提交结果
pub struct SubmissionExecutor {
    client: Client,
    retry_backoff: Duration,
}

impl SubmissionExecutor {
    /// 使用共享的 HTTP 客户端创建（与页面抓取共用 cookie）
    pub fn new(client: Client, retry_backoff: Duration) -> Self {
        Self {
            client,
            retry_backoff,
        }
    }

    /// GET 表单和浏览器一样：表单数据替换 action 原有的查询串
    fn get_request(&self, plan: &SubmissionPlan) -> RequestBuilder {
        let request = match Url::parse(&plan.action) {
            Ok(mut url) => {
                url.set_query(None);
                self.client.get(url)
            }
            Err(_) => self.client.get(&plan.action),
        };
        request.query(&plan.payload)
    }

    async fn send_once(&self, plan: &SubmissionPlan, referer: &str) -> reqwest::Result<Response> {
        let request = match (plan.method, plan.enctype) {
            (Method::Get, _) => self.get_request(plan),
            (Method::Post, Enctype::UrlEncoded) => {
                self.client.post(&plan.action).form(&plan.payload)
            }
            (Method::Post, Enctype::Multipart) => {
                let form = plan
                    .payload
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                        form.text(k.clone(), v.clone())
                    });
                self.client.post(&plan.action).multipart(form)
            }
        };
        request.header(REFERER, referer).send().await
    }


    /// 提交表单并判定结果
    ///
    /// # 参数
    /// - `plan`: 提交计划
    /// - `referer`: 表单所在页面地址
    pub async fn submit(&self, plan: &SubmissionPlan, referer: &str) -> SubmissionOutcome {
        debug!(
            "提交计划: {} | 字段数: {}",
            plan.summary(),
            plan.payload.len()
        );

        let response = match self.send_once(plan, referer).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(
                    "提交失败，{} 毫秒后重试一次: {} ({})",
                    self.retry_backoff.as_millis(),
                    plan.action,
                    e
                );
                sleep(self.retry_backoff).await;
                self.send_once(plan, referer).await
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let error = CrowdError::submission_failed(&plan.action, e);
                warn!("❌ {}", error);
                return SubmissionOutcome {
                    status: ResultStatus::Failed,
                    http_status: None,
                    evidence_url: None,
                    excerpt: String::new(),
                    error: Some(error.to_string()),
                };
            }
        };

        let http_status = response.status().as_u16();
        let evidence_url = response.url().to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("读取响应内容失败: {} ({})", evidence_url, e);
                String::new()
            }
        };

        let page = ResponsePage::parse(&body);
        let excerpt = truncate_text(&page.text, EXCERPT_CHARS);
        let (status, reason) = classify_response(http_status, &page, plan.captcha);

        info!(
            "📤 {} {} → HTTP {} | {} | {}",
            plan.method.as_str(),
            plan.action,
            http_status,
            status,
            truncate_text(&excerpt, 80)
        );

        SubmissionOutcome {
            status,
            http_status: Some(http_status),
            evidence_url: Some(evidence_url),
            excerpt,
            error: reason.filter(|_| status != ResultStatus::Success),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use url::form_urlencoded;

    const THANKS: &str = "<html><head><title>Thanks</title></head><body><p>Thank you!</p></body></html>";

    fn classify(http_status: u16, html: &str) -> (ResultStatus, Option<String>) {
        classify_response(http_status, &ResponsePage::parse(html), false)
    }

    #[test]
    fn test_page_text_skips_scripts_and_styles() {
        let html = r#"<html><head><title>T</title><style>.a{}</style></head>
            <body><script>var error = 1;</script><p>Thank   you!</p><p>Bye</p></body></html>"#;
        assert_eq!(ResponsePage::parse(html).text, "Thank you! Bye");
    }

    #[test]
    fn test_plain_2xx_is_success() {
        let (status, reason) = classify(200, "Thank you for your comment");
        assert_eq!(status, ResultStatus::Success);
        assert!(reason.is_none());
        assert_eq!(classify(302, "").0, ResultStatus::Success);
    }

    #[test]
    fn test_rejection_markers_fail() {
        let (status, reason) = classify(200, "ERROR: Duplicate comment detected");
        assert_eq!(status, ResultStatus::Failed);
        assert!(reason.unwrap().contains("error:"));
        assert_eq!(classify(500, "Wystąpił błąd").0, ResultStatus::Failed);
    }

    #[test]
    fn test_success_page_mentioning_rejection_words_is_success() {
        let html = "<p>Thank you, your comment is awaiting moderation.</p>\
            <aside>Related: Why my account got blocked on Twitter</aside>";
        assert_eq!(classify(200, html).0, ResultStatus::Success);

        // 跳回完整的留言簿页面，别人的留言里有"Fehler"
        let entries: String = (0..20)
            .map(|i| format!("<div class=\"entry\"><p>Eintrag {}: Kein Fehler gefunden, tolle Seite, weiter so!</p></div>", i))
            .collect();
        let guestbook = format!(
            "<html><head><title>Gästebuch</title></head><body><h1>Gästebuch</h1>{}</body></html>",
            entries
        );
        assert_eq!(classify(200, &guestbook).0, ResultStatus::Success);
    }

    #[test]
    fn test_markers_match_whole_words_only() {
        assert_eq!(classify(200, "<p>Unblocked and terror: a review</p>").0, ResultStatus::Success);
        assert_eq!(classify(200, "<p>Hibakereső eszközök</p>").0, ResultStatus::Success);
    }

    #[test]
    fn test_rejection_in_notice_zone_of_long_page_fails() {
        let filler = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit.</p>".repeat(20);

        let wp_die = format!(
            r#"<html><head><title>Comment Submission Failure</title></head>
            <body id="error-page"><div class="wp-die-message"><p><strong>Error:</strong> Duplicate comment detected; it looks as though you've already said that!</p></div>{}</body></html>"#,
            filler
        );
        let (status, reason) = classify(200, &wp_die);
        assert_eq!(status, ResultStatus::Failed);
        assert!(reason.unwrap().contains("error:"));

        let alert = format!(
            r#"<html><body><div class="alert alert-danger">Twój wpis został zablokowany</div>{}</body></html>"#,
            filler
        );
        assert_eq!(classify(200, &alert).0, ResultStatus::Failed);

        let titled = format!("<html><head><title>403 Forbidden</title></head><body>{}</body></html>", filler);
        assert_eq!(classify(200, &titled).0, ResultStatus::Failed);
    }

    #[test]
    fn test_ambiguous_non_2xx_is_partial() {
        assert_eq!(classify(500, "").0, ResultStatus::Partial);
        assert_eq!(classify(503, "try later").0, ResultStatus::Partial);
    }

    #[test]
    fn test_rejecting_status_codes_fail() {
        assert_eq!(classify(403, "").0, ResultStatus::Failed);
        assert_eq!(classify(429, "").0, ResultStatus::Failed);
    }

    #[test]
    fn test_captcha_and_confirmation_downgrade_success() {
        assert_eq!(
            classify_response(200, &ResponsePage::parse("OK"), true).0,
            ResultStatus::Partial
        );
        assert_eq!(
            classify(200, "Please check your email to confirm").0,
            ResultStatus::Partial
        );
    }

    fn plan(action: &str, method: Method, enctype: Enctype) -> SubmissionPlan {
        SubmissionPlan {
            action: action.into(),
            method,
            enctype,
            payload: vec![
                ("author".into(), "Zażółć Gęślą".into()),
                ("comment".into(), "你好 & Привет = 100%".into()),
                ("comment_post_ID".into(), "6347".into()),
            ],
            skipped: vec![],
            fields: vec![],
            captcha: false,
            ok: true,
            rejection: None,
        }
    }

    fn executor() -> SubmissionExecutor {
        let client = Client::builder().no_proxy().build().unwrap();
        SubmissionExecutor::new(client, Duration::from_millis(1))
    }

    /// 本地服务器收到的请求
    struct Captured {
        head: String,
        body: String,
    }

    impl Captured {
        fn request_target(&self) -> &str {
            self.head
                .lines()
                .next()
                .and_then(|line| line.split(' ').nth(1))
                .unwrap_or_default()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().skip(1).find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
            })
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                assert!(n > 0, "请求头不完整");
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let length = head
                .lines()
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    key.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() - (end + 4) >= length || n == 0 {
                let body = String::from_utf8_lossy(&buf[end + 4..]).to_string();
                return Captured { head, body };
            }
        }
    }

    /// 在本地端口应答一次请求；`drop_first` 为真时先把第一个连接直接断开
    async fn serve_once(drop_first: bool) -> (String, tokio::task::JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            if drop_first {
                let (stream, _) = listener.accept().await.unwrap();
                drop(stream);
            }
            let (mut stream, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                THANKS.len(),
                THANKS
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            captured
        });
        (base, handle)
    }

    fn decoded(query: &str) -> Vec<(String, String)> {
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[tokio::test]
    async fn test_urlencoded_post_sends_payload_and_referer() {
        let (base, server) = serve_once(false).await;
        let plan = plan(&format!("{}/wp-comments-post.php", base), Method::Post, Enctype::UrlEncoded);
        let referer = format!("{}/2024/01/post/", base);

        let outcome = executor().submit(&plan, &referer).await;
        assert_eq!(outcome.status, ResultStatus::Success);
        assert_eq!(outcome.http_status, Some(200));

        let request = server.await.unwrap();
        assert!(request.head.starts_with("POST /wp-comments-post.php "));
        assert_eq!(request.header("referer"), Some(referer.as_str()));
        assert!(request
            .header("content-type")
            .unwrap()
            .starts_with("application/x-www-form-urlencoded"));
        assert_eq!(decoded(&request.body), plan.payload);
    }

    #[tokio::test]
    async fn test_get_replaces_action_query() {
        let (base, server) = serve_once(false).await;
        let plan = plan(&format!("{}/guest.php?page=2&sort=new", base), Method::Get, Enctype::UrlEncoded);

        let outcome = executor().submit(&plan, &base).await;
        assert_eq!(outcome.status, ResultStatus::Success);

        let request = server.await.unwrap();
        let target = request.request_target();
        let (path, query) = target.split_once('?').unwrap();
        assert_eq!(path, "/guest.php");
        assert_eq!(decoded(query), plan.payload);
    }

    #[tokio::test]
    async fn test_multipart_post_sends_each_field() {
        let (base, server) = serve_once(false).await;
        let plan = plan(&format!("{}/contact", base), Method::Post, Enctype::Multipart);

        let outcome = executor().submit(&plan, &base).await;
        assert_eq!(outcome.status, ResultStatus::Success);

        let request = server.await.unwrap();
        assert!(request
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
        for (name, value) in &plan.payload {
            let part = format!("name=\"{}\"\r\n\r\n{}\r\n", name, value);
            assert!(request.body.contains(&part), "缺少字段 {}", name);
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_second_attempt() {
        let (base, server) = serve_once(true).await;
        let plan = plan(&format!("{}/post", base), Method::Post, Enctype::UrlEncoded);

        let outcome = executor().submit(&plan, &base).await;
        assert_eq!(outcome.status, ResultStatus::Success);
        assert!(outcome.error.is_none());
        assert_eq!(decoded(&server.await.unwrap().body), plan.payload);
    }

    #[tokio::test]
    async fn test_network_error_fails_after_retry() {
        let plan = plan("http://127.0.0.1:9/submit", Method::Post, Enctype::UrlEncoded);
        let outcome = executor().submit(&plan, "http://127.0.0.1:9/").await;
        assert_eq!(outcome.status, ResultStatus::Failed);
        assert!(outcome.http_status.is_none());
        assert!(outcome.error.is_some());
    }
}
