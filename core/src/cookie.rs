//! Cookies sent with a request and received through `Set-Cookie`.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expiry: None,
            secure: false,
            same_site: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Parses one `Set-Cookie` header value. Returns `None` when the
    /// leading `name=value` pair is malformed.
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));

        let mut max_age = None;
        for attribute in parts {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (attribute.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !value.is_empty() => {
                    cookie.domain = Some(value.trim_start_matches('.').to_string())
                }
                "path" if !value.is_empty() => cookie.path = Some(value.to_string()),
                "expires" => cookie.expiry = parse_expires(value),
                "max-age" => max_age = value.parse::<i64>().ok(),
                "secure" => cookie.secure = true,
                "samesite" => cookie.same_site = SameSite::parse(value),
                _ => {}
            }
        }
        // Max-Age takes precedence over Expires.
        if let Some(seconds) = max_age {
            cookie.expiry = Duration::try_seconds(seconds).and_then(|age| Utc::now().checked_add_signed(age));
        }
        Some(cookie)
    }
}

/// Netscape-style `Expires` dates, with dashes and a two- or four-digit year.
const NETSCAPE_DATES: [&str; 2] = ["%a, %d-%b-%y %H:%M:%S GMT", "%a, %d-%b-%Y %H:%M:%S GMT"];

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    NETSCAPE_DATES
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(value, pattern).ok())
        .map(|naive| naive.and_utc())
}

/// Renders cookies as a request `Cookie` header value. `None` when empty.
pub fn header_value(cookies: &[Cookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn header_value_joins_pairs() {
        let cookies = vec![Cookie::new("session", "abc").secure(), Cookie::new("theme", "dark")];
        assert_eq!(header_value(&cookies).as_deref(), Some("session=abc; theme=dark"));
        assert_eq!(header_value(&[]), None);
    }

    #[test]
    fn parses_set_cookie_attributes() {
        let cookie = Cookie::parse_set_cookie(
            "id=a3fWa; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Domain=.example.com; Path=/docs; Secure; HttpOnly; SameSite=Lax",
        )
        .unwrap();
        assert_eq!(cookie.name, "id");
        assert_eq!(cookie.value, "a3fWa");
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/docs"));
        assert_eq!(cookie.expiry, Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()));
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn parses_netscape_expires() {
        let expected = Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());
        let cookie = Cookie::parse_set_cookie("id=a; Expires=Wed, 21-Oct-2015 07:28:00 GMT").unwrap();
        assert_eq!(cookie.expiry, expected);
        let cookie = Cookie::parse_set_cookie("id=a; Expires=Wed, 21-Oct-15 07:28:00 GMT").unwrap();
        assert_eq!(cookie.expiry, expected);
        let cookie = Cookie::parse_set_cookie("id=a; Expires=someday").unwrap();
        assert_eq!(cookie.expiry, None);
    }

    #[test]
    fn max_age_overrides_expires() {
        let cookie = Cookie::parse_set_cookie("a=b; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=60").unwrap();
        assert!(cookie.expiry.unwrap() > Utc::now());
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!(Cookie::parse_set_cookie("novalue").is_none());
        assert!(Cookie::parse_set_cookie("=x").is_none());
    }
}
