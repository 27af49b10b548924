//! 多语言字段词典 - 业务能力层
//!
//! 把字段的 name / id / label / placeholder 文本映射为语义角色。
//!
//! ## 匹配规则
//! 1. 文本先切分为小写词元（驼峰、下划线、括号、空白都视为分隔）
//! 2. 词元精确命中优先于子串命中
//! 3. 同一层级同时命中多个角色时，按 [`ROLE_PRIORITY`] 取第一个
//!
//! 覆盖语言：英语、德语、波兰语、西班牙语、匈牙利语、中文、俄语、法语、意大利语、葡萄牙语。

use phf::{phf_map, phf_set};

use crate::models::plan::FieldRole;

/// 同层命中多个角色时的优先级
///
/// Name 排在 Message 之前（`comment_author` 是名字），
/// Company 排在 Name 之前（`company_name` 是公司）。
pub const ROLE_PRIORITY: [FieldRole; 7] = [
    FieldRole::Email,
    FieldRole::Website,
    FieldRole::Phone,
    FieldRole::Company,
    FieldRole::Subject,
    FieldRole::Name,
    FieldRole::Message,
];

/// 精确词元
static EXACT_TOKENS: phf::Map<&'static str, FieldRole> = phf_map! {
    // email
    "email" => FieldRole::Email,
    "mail" => FieldRole::Email,
    "correo" => FieldRole::Email,
    "courriel" => FieldRole::Email,
    "почта" => FieldRole::Email,
    // website
    "url" => FieldRole::Website,
    "uri" => FieldRole::Website,
    "www" => FieldRole::Website,
    "web" => FieldRole::Website,
    "website" => FieldRole::Website,
    "homepage" => FieldRole::Website,
    "site" => FieldRole::Website,
    "link" => FieldRole::Website,
    "strona" => FieldRole::Website,
    "honlap" => FieldRole::Website,
    "сайт" => FieldRole::Website,
    // phone
    "tel" => FieldRole::Phone,
    "phone" => FieldRole::Phone,
    "mobile" => FieldRole::Phone,
    "mobil" => FieldRole::Phone,
    "gsm" => FieldRole::Phone,
    "handy" => FieldRole::Phone,
    "cell" => FieldRole::Phone,
    "telefon" => FieldRole::Phone,
    "telefono" => FieldRole::Phone,
    "телефон" => FieldRole::Phone,
    // company
    "company" => FieldRole::Company,
    "firma" => FieldRole::Company,
    "cég" => FieldRole::Company,
    "ceg" => FieldRole::Company,
    "org" => FieldRole::Company,
    "organization" => FieldRole::Company,
    "empresa" => FieldRole::Company,
    "azienda" => FieldRole::Company,
    "société" => FieldRole::Company,
    "societe" => FieldRole::Company,
    "unternehmen" => FieldRole::Company,
    "компания" => FieldRole::Company,
    // subject
    "subject" => FieldRole::Subject,
    "topic" => FieldRole::Subject,
    "title" => FieldRole::Subject,
    "titel" => FieldRole::Subject,
    "betreff" => FieldRole::Subject,
    "temat" => FieldRole::Subject,
    "tytuł" => FieldRole::Subject,
    "tytul" => FieldRole::Subject,
    "asunto" => FieldRole::Subject,
    "título" => FieldRole::Subject,
    "titulo" => FieldRole::Subject,
    "tárgy" => FieldRole::Subject,
    "targy" => FieldRole::Subject,
    "тема" => FieldRole::Subject,
    "sujet" => FieldRole::Subject,
    "objet" => FieldRole::Subject,
    "oggetto" => FieldRole::Subject,
    "assunto" => FieldRole::Subject,
    // name
    "name" => FieldRole::Name,
    "author" => FieldRole::Name,
    "autor" => FieldRole::Name,
    "nick" => FieldRole::Name,
    "nickname" => FieldRole::Name,
    "fullname" => FieldRole::Name,
    "firstname" => FieldRole::Name,
    "lastname" => FieldRole::Name,
    "username" => FieldRole::Name,
    "imie" => FieldRole::Name,
    "imię" => FieldRole::Name,
    "nazwisko" => FieldRole::Name,
    "podpis" => FieldRole::Name,
    "vorname" => FieldRole::Name,
    "nachname" => FieldRole::Name,
    "nombre" => FieldRole::Name,
    "apellido" => FieldRole::Name,
    "név" => FieldRole::Name,
    "nev" => FieldRole::Name,
    "nom" => FieldRole::Name,
    "prénom" => FieldRole::Name,
    "prenom" => FieldRole::Name,
    "nome" => FieldRole::Name,
    "cognome" => FieldRole::Name,
    "имя" => FieldRole::Name,
    "фио" => FieldRole::Name,
    // message
    "message" => FieldRole::Message,
    "msg" => FieldRole::Message,
    "comment" => FieldRole::Message,
    "comments" => FieldRole::Message,
    "text" => FieldRole::Message,
    "body" => FieldRole::Message,
    "content" => FieldRole::Message,
    "entry" => FieldRole::Message,
    "review" => FieldRole::Message,
    "feedback" => FieldRole::Message,
    "note" => FieldRole::Message,
    "notes" => FieldRole::Message,
    "inquiry" => FieldRole::Message,
    "enquiry" => FieldRole::Message,
    "gbtext" => FieldRole::Message,
    "wpis" => FieldRole::Message,
    "tresc" => FieldRole::Message,
    "treść" => FieldRole::Message,
    "eintrag" => FieldRole::Message,
    "nachricht" => FieldRole::Message,
    "kommentar" => FieldRole::Message,
    "komentarz" => FieldRole::Message,
    "mensaje" => FieldRole::Message,
    "comentario" => FieldRole::Message,
    "texto" => FieldRole::Message,
    "testo" => FieldRole::Message,
    "messaggio" => FieldRole::Message,
    "mensagem" => FieldRole::Message,
    "commentaire" => FieldRole::Message,
    "üzenet" => FieldRole::Message,
    "uzenet" => FieldRole::Message,
    "текст" => FieldRole::Message,
    "отзыв" => FieldRole::Message,
};

/// 子串匹配表，按 [`ROLE_PRIORITY`] 排列
const SUBSTRINGS: &[(FieldRole, &[&str])] = &[
    (
        FieldRole::Email,
        &[
            "email", "mail", "correo", "courriel", "почт", "邮箱", "邮件", "郵件", "郵箱", "電郵",
            "电邮",
        ],
    ),
    (
        FieldRole::Website,
        &[
            "website", "homepage", "webseite", "internetseite", "url", "www", "web", "site",
            "sitio", "sito", "strona", "honlap", "weboldal", "сайт", "网址", "网站", "主页", "網址",
            "網站", "首页",
        ],
    ),
    (
        FieldRole::Phone,
        &[
            "phone", "telefon", "teléfono", "téléphone", "телефон", "电话", "手机", "電話", "手機",
        ],
    ),
    (
        FieldRole::Company,
        &[
            "company", "unternehmen", "organizat", "organisat", "entreprise", "azienda",
            "empresa", "société", "компани", "организац", "公司", "单位", "單位",
        ],
    ),
    (
        FieldRole::Subject,
        &["subject", "betreff", "主题", "标题", "主題", "標題"],
    ),
    (
        FieldRole::Name,
        &[
            "name", "author", "autor", "imię", "imie", "nazwisk", "vorname", "nachname", "nombre",
            "apellido", "prénom", "cognome", "имя", "фамили", "姓名", "名字", "昵称", "暱稱", "称呼",
            "稱呼",
        ],
    ),
    (
        FieldRole::Message,
        &[
            "messag", "mensag", "mensaj", "comment", "coment", "komentar", "kommentar",
            "nachricht", "mitteilung", "eintrag", "wiadomo", "treść", "tresc", "üzenet", "uzenet",
            "hozzászól", "hozzaszol", "megjegyz", "сообщени", "комментар", "отзыв", "留言", "评论",
            "評論", "内容", "內容", "正文", "反馈",
        ],
    ),
];

/// 同意条款类复选框
const CONSENT_HINTS: &[&str] = &[
    "consent", "agree", "accept", "privacy", "gdpr", "dsgvo", "rgpd", "rodo", "zgod", "zgadzam",
    "akceptuj", "polityk", "datenschutz", "einverstanden", "acepto", "privacidad", "acconsent",
    "elfogad", "adatvédel", "согла", "политик", "同意", "隐私", "隱私", "terms", "cookie",
];

/// 验证码标记（在压缩后的文本上匹配）
const CAPTCHA_HINTS: &[&str] = &[
    "captcha", "turnstile", "securitycode", "sicherheitscode", "kodzobrazka", "antispam",
    "验证码", "驗證碼", "капча",
];

/// 蜜罐词元
static TRAP_TOKENS: phf::Set<&'static str> = phf_set! {
    "hp",
    "hpot",
    "honey",
    "honeypot",
    "trap",
    "spamtrap",
    "nobots",
};

/// "请留空"类提示
const LEAVE_EMPTY_HINTS: &[&str] = &[
    "leave empty",
    "leave this empty",
    "leave blank",
    "leave this blank",
    "leave this field blank",
    "leave this field empty",
    "do not fill",
    "don't fill",
    "nicht ausfüllen",
    "leer lassen",
    "pozostaw puste",
    "nie wypełniaj",
    "dejar vacío",
    "dejar en blanco",
    "hagyja üresen",
    "не заполняйте",
    "оставьте пустым",
    "laisser vide",
    "lasciare vuoto",
    "请勿填写",
    "留空",
];

/// 切分为小写词元
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            // 驼峰边界：authorEmail → author / email
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase();
            current.extend(ch.to_lowercase());
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn exact_role(token: &str) -> Option<FieldRole> {
    EXACT_TOKENS.get(token).copied().or_else(|| {
        let stripped = token.trim_end_matches(|c: char| c.is_ascii_digit());
        if stripped.is_empty() || stripped == token {
            None
        } else {
            EXACT_TOKENS.get(stripped).copied()
        }
    })
}

/// 把一段文本分类为角色
pub fn classify_text(raw: &str) -> Option<FieldRole> {
    let tokens = tokenize(raw);
    if tokens.is_empty() {
        return None;
    }

    let exact: Vec<FieldRole> = tokens.iter().filter_map(|t| exact_role(t)).collect();
    if let Some(role) = ROLE_PRIORITY.iter().find(|r| exact.contains(r)) {
        return Some(*role);
    }

    let spaced = tokens.join(" ");
    let compact = tokens.concat();
    SUBSTRINGS
        .iter()
        .find(|(_, needles)| {
            needles
                .iter()
                .any(|n| spaced.contains(n) || compact.contains(n))
        })
        .map(|(role, _)| *role)
}

/// 是否为同意条款类文本
pub fn is_consent(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    CONSENT_HINTS.iter().any(|h| lowered.contains(h))
}

/// 是否带有验证码标记
pub fn is_captcha(raw: &str) -> bool {
    let compact = tokenize(raw).concat();
    !compact.is_empty() && CAPTCHA_HINTS.iter().any(|h| compact.contains(h))
}

/// name / id / class 中是否带有蜜罐标记
pub fn is_trap_marker(raw: &str) -> bool {
    tokenize(raw).iter().any(|t| {
        TRAP_TOKENS.contains(t.as_str()) || t.contains("honeypot") || t.contains("spamtrap")
    })
}

/// label / placeholder 中是否提示"请留空"
pub fn is_leave_empty_hint(text: &str) -> bool {
    let lowered = text.to_lowercase();
    LEAVE_EMPTY_HINTS.iter().any(|h| lowered.contains(h))
}
