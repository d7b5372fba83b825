//! Email and social copy

use crate::config::SiteConfig;
use crate::models::Tool;
use crate::services::{EmailMessage, SocialPost};

/// Submissions waiting beyond this trigger a queue note
const QUEUE_NOTE_THRESHOLD: usize = 10;
/// Average number of tools published per day
const PUBLISHED_PER_DAY: usize = 3;

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Paragraphs plus an optional call to action, as HTML and plain text
struct Body {
    paragraphs: Vec<String>,
    button: Option<(String, String)>,
}

impl Body {
    fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
            button: None,
        }
    }

    fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.paragraphs.push(text.into());
        self
    }

    fn button(mut self, label: impl Into<String>, href: impl Into<String>) -> Self {
        self.button = Some((label.into(), href.into()));
        self
    }

    fn into_message(self, to: &str, subject: String, site: &SiteConfig) -> EmailMessage {
        let signature = format!("Thanks,\n{} team", site.name);

        let mut html = String::new();
        let mut text = String::new();
        for paragraph in &self.paragraphs {
            html.push_str(&format!("<p>{}</p>\n", escape(paragraph)));
            text.push_str(paragraph);
            text.push_str("\n\n");
        }
        if let Some((label, href)) = &self.button {
            html.push_str(&format!(
                "<p><a href=\"{}\" class=\"button\">{}</a></p>\n",
                escape(href),
                escape(label)
            ));
            text.push_str(&format!("{}: {}\n\n", label, href));
        }
        html.push_str(&format!("<p>{}</p>", escape(&signature).replace('\n', "<br>")));
        text.push_str(&signature);

        EmailMessage {
            to: to.to_string(),
            subject,
            html,
            text,
            reply_to: site.email.clone(),
        }
    }
}

fn greeting(tool: &Tool) -> String {
    match tool.submitter_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("Hey {}!", name),
        _ => "Hey there!".to_string(),
    }
}

/// Rough wait for a submission at `position` in the queue
pub fn queue_estimate(position: usize) -> String {
    let days = position.div_ceil(PUBLISHED_PER_DAY).max(1);
    match days {
        1 => "1 day".to_string(),
        d if d < 14 => format!("{} days", d),
        d if d < 60 => format!("{} weeks", d / 7),
        d => format!("{} months", d / 30),
    }
}

/// Sent right after a submission is received
pub fn submission_received(tool: &Tool, site: &SiteConfig, to: &str, queue_length: usize) -> EmailMessage {
    let mut body = Body::new()
        .paragraph(greeting(tool))
        .paragraph(format!("Thanks for submitting {}, it'll be reviewed shortly!", tool.name));

    if queue_length > QUEUE_NOTE_THRESHOLD {
        body = body.paragraph(format!(
            "Due to the high volume of submissions we're currently receiving, there's a bit of a \
             queue. {} is scheduled to be added in approximately {}.",
            tool.name,
            queue_estimate(queue_length)
        ));
    }

    body.into_message(to, format!("🙌 Thanks for submitting {}!", tool.name), site)
}

/// Sent by the onboarding workflow once the tool has a publication date
pub fn tool_scheduled(tool: &Tool, site: &SiteConfig, to: &str) -> EmailMessage {
    let date = tool
        .published_at
        .map(|at| at.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "soon".to_string());

    Body::new()
        .paragraph(greeting(tool))
        .paragraph(format!(
            "Great news! {} has been reviewed and is scheduled for publication on {} on {}.",
            tool.name, site.name, date
        ))
        .paragraph("We'll send you another email once it goes live.")
        .into_message(
            to,
            format!("Great news! {} is scheduled for publication on {} 🎉", tool.name, site.name),
            site,
        )
}

/// Sent by the publish sweep
pub fn tool_published(tool: &Tool, site: &SiteConfig, to: &str) -> EmailMessage {
    Body::new()
        .paragraph(greeting(tool))
        .paragraph(format!(
            "Great news! Your submitted tool, {}, is now live on {}. Thank you for sharing this \
             awesome resource with our community!",
            tool.name, site.name
        ))
        .paragraph(format!(
            "We'd love it if you could spread the word. A quick post on your favorite social \
             platform or dev community about {} would mean a lot to us. It helps other developers \
             discover cool tools like yours!",
            tool.name
        ))
        .button(
            format!("Check out {} on {}", tool.name, site.name),
            site.tool_url(&tool.slug),
        )
        .into_message(
            to,
            format!("{} has been published on {} 🎉", tool.name, site.name),
            site,
        )
}

/// Sent to the site admin when a featured listing is requested
pub fn featured_request(tool: &Tool, site: &SiteConfig, to: &str) -> EmailMessage {
    let submitter = match (&tool.submitter_name, &tool.submitter_email) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (None, Some(email)) => email.clone(),
        (Some(name), None) => name.clone(),
        (None, None) => "an unknown submitter".to_string(),
    };

    Body::new()
        .paragraph(format!(
            "{} ({}) has requested a featured listing, submitted by {}.",
            tool.name, tool.website_url, submitter
        ))
        .button("View listing", site.tool_url(&tool.slug))
        .into_message(to, "New Featured Listing Request".to_string(), site)
}

/// Launch announcement for social channels
pub fn launch_post(tool: &Tool, site: &SiteConfig) -> SocialPost {
    let url = site.tool_url(&tool.slug);
    let mut text = format!("🚀 {} is now live on {}", tool.name, site.name);
    if let Some(tagline) = tool.tagline.as_deref().filter(|t| !t.trim().is_empty()) {
        text.push_str(&format!(": {}", tagline.trim()));
    }
    text.push_str(&format!("\n\n{}", url));
    SocialPost { text, url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{site, tool};

    #[test]
    fn test_published_email_copy() {
        let mut foo = tool("foo", "Foo");
        foo.submitter_name = Some("Ada".into());

        let message = tool_published(&foo, &site(), "a@b.com");

        assert_eq!(message.to, "a@b.com");
        assert_eq!(message.subject, "Foo has been published on FOSS Alternative 🎉");
        assert!(message.text.starts_with("Hey Ada!"));
        assert!(message.text.contains("https://openalternative.test/foo"));
        assert!(message.html.contains("href=\"https://openalternative.test/foo\""));
    }

    #[test]
    fn test_html_is_escaped() {
        let foo = tool("foo", "<Foo & Bar>");
        let message = tool_scheduled(&foo, &site(), "a@b.com");
        assert!(message.html.contains("&lt;Foo &amp; Bar&gt;"));
        assert!(!message.html.contains("<Foo"));
    }

    #[test]
    fn test_submission_queue_note() {
        let foo = tool("foo", "Foo");

        let short = submission_received(&foo, &site(), "a@b.com", 3);
        let long = submission_received(&foo, &site(), "a@b.com", 45);

        assert!(!short.text.contains("queue"));
        assert!(long.text.contains("approximately 2 weeks"));
        assert!(long.text.starts_with("Hey there!"));
    }

    #[test]
    fn test_queue_estimate() {
        assert_eq!(queue_estimate(0), "1 day");
        assert_eq!(queue_estimate(7), "3 days");
        assert_eq!(queue_estimate(60), "2 weeks");
        assert_eq!(queue_estimate(300), "3 months");
    }

    #[test]
    fn test_launch_post() {
        let mut foo = tool("foo", "Foo");
        foo.tagline = Some("Open source Bar".into());

        let post = launch_post(&foo, &site());
        assert_eq!(post.url, "https://openalternative.test/foo");
        assert_eq!(
            post.text,
            "🚀 Foo is now live on FOSS Alternative: Open source Bar\n\nhttps://openalternative.test/foo"
        );
    }
}
