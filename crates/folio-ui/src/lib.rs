use askama::Template;
use chrono::{Datelike, NaiveDate};
use folio_core::models::{ContactMessage, OutgoingEmail, PortfolioEntry};

/// Display-ready view of a [`PortfolioEntry`]; empty strings mean "absent".
pub struct PortfolioCard {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub image: String,
    pub tags: String,
}

impl From<&PortfolioEntry> for PortfolioCard {
    fn from(entry: &PortfolioEntry) -> Self {
        Self {
            title: entry.title.clone(),
            summary: entry.summary.clone(),
            url: entry.url.clone().unwrap_or_default(),
            image: entry.image.clone().unwrap_or_default(),
            tags: entry.tags.join(", "),
        }
    }
}

#[derive(Template)]
#[template(path = "homepage.html")]
pub struct HomepageTemplate<'a> {
    pub owner_name: &'a str,
    pub age: u32,
    pub cards: Vec<PortfolioCard>,
    /// Same entries as `cards`, for the page script
    pub portfolio_json: String,
    pub token: &'a str,
    pub production: bool,
}

impl<'a> HomepageTemplate<'a> {
    pub fn new(
        owner_name: &'a str,
        age: u32,
        portfolio: &[PortfolioEntry],
        token: &'a str,
        production: bool,
    ) -> Self {
        Self {
            owner_name,
            age,
            cards: portfolio.iter().map(PortfolioCard::from).collect(),
            portfolio_json: script_json(portfolio),
            token,
            production,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub code: &'a str,
    pub production: bool,
}

#[derive(Template)]
#[template(path = "email.html")]
pub struct ContactEmailTemplate<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub message: &'a str,
}

/// Renders a contact submission into the email sent to the owner.
pub fn contact_email(message: &ContactMessage, subject: &str) -> askama::Result<OutgoingEmail> {
    let html_body = ContactEmailTemplate {
        name: &message.name,
        email: &message.email,
        message: &message.message,
    }
    .render()?;

    Ok(OutgoingEmail {
        subject: subject.to_string(),
        html_body,
        text_body: format!(
            "Name: {}\nEmail: {}\n\n{}",
            message.name, message.email, message.message
        ),
        reply_to: Some(message.email.clone()),
    })
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// JSON safe to inline in a `<script>` element.
fn script_json(entries: &[PortfolioEntry]) -> String {
    serde_json::to_string(entries)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(title: &str) -> PortfolioEntry {
        PortfolioEntry {
            id: Uuid::now_v7(),
            title: title.to_string(),
            summary: "A thing I built".to_string(),
            url: Some("https://example.com".to_string()),
            image: None,
            tags: vec!["rust".into(), "web".into()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn age_counts_completed_years() {
        let birth = NaiveDate::from_ymd_opt(1989, 8, 7).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()), 36);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()), 37);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()), 37);
    }

    #[test]
    fn homepage_escapes_entries_and_embeds_token() {
        let entries = vec![entry("<script>alert(1)</script>")];
        let html = HomepageTemplate::new("Owner", 36, &entries, "tok.en.value", true)
            .render()
            .unwrap();

        assert!(html.contains("tok.en.value"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("rust, web"));
    }

    #[test]
    fn empty_portfolio_renders_placeholder() {
        let html = HomepageTemplate::new("Owner", 36, &[], "t", false)
            .render()
            .unwrap();
        assert!(html.contains("Nothing to show right now."));
        assert!(html.contains("portfolio: []"));
    }

    #[test]
    fn error_page_shows_the_code() {
        let html = ErrorTemplate {
            code: "404",
            production: true,
        }
        .render()
        .unwrap();
        assert!(html.contains("<h1>404</h1>"));
        assert!(!html.contains("development"));
    }

    #[test]
    fn contact_email_replies_to_the_sender() {
        let email = contact_email(
            &ContactMessage {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                message: "Hello <b>there</b>".into(),
            },
            "Portfolio",
        )
        .unwrap();

        assert_eq!(email.subject, "Portfolio");
        assert_eq!(email.reply_to.as_deref(), Some("ada@example.com"));
        assert!(email.html_body.contains("Hello &lt;b&gt;there"));
        assert!(email.text_body.ends_with("Hello <b>there</b>"));
    }
}
