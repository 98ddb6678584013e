//! OTP email templates.
//!
//! Rendering is pure: the caller supplies every varying fact, including the
//! copyright year, so output is deterministic under a fixed clock.

use notifier_core::event::OtpKind;

/// Everything an OTP email shows.
#[derive(Debug, Clone, Copy)]
pub struct OtpEmail<'a> {
    /// Product name shown in subject, header and footer
    pub brand: &'a str,
    /// Address shown in the help text
    pub support_email: &'a str,
    /// Registration flavour
    pub kind: OtpKind,
    /// The one-time code
    pub code: &'a str,
    /// Whole minutes until expiry, at least 1
    pub expires_in_minutes: i64,
    /// Copyright year
    pub year: i32,
}

impl OtpEmail<'_> {
    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self.kind {
            OtpKind::User => format!("{} - Your Registration OTP", self.brand),
            OtpKind::Tenant => format!("{} - Organization Registration OTP", self.brand),
        }
    }

    /// Heading shown above the code.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self.kind {
            OtpKind::User => "User Registration",
            OtpKind::Tenant => "Organization Registration",
        }
    }

    const fn description(&self) -> &'static str {
        match self.kind {
            OtpKind::User => "Complete your user registration",
            OtpKind::Tenant => "Complete your organization registration",
        }
    }

    fn security_notice(&self) -> String {
        format!(
            "Never share this code with anyone. {} staff will never ask for your OTP code.",
            self.brand
        )
    }

    /// HTML body.
    #[must_use]
    pub fn html(&self) -> String {
        let brand = escape_html(self.brand);
        let support = escape_html(self.support_email);
        let code = escape_html(self.code);
        let title = self.title();
        let description = self.description();
        let notice = escape_html(&self.security_notice());
        let minutes = self.expires_in_minutes;
        let year = self.year;

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{brand} - {title}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; background-color: #f5f5f5; margin: 0; padding: 20px;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; padding: 40px;">
        <div style="text-align: center; margin-bottom: 30px;">
            <div style="font-size: 32px; font-weight: bold; color: #0066cc;">{brand}</div>
            <h1 style="font-size: 24px; font-weight: 600;">{title}</h1>
            <p style="font-size: 16px; color: #666;">{description}</p>
        </div>
        <div style="background-color: #f8f9fa; border: 2px dashed #0066cc; border-radius: 8px; padding: 30px; text-align: center; margin: 30px 0;">
            <div style="font-size: 14px; color: #666; text-transform: uppercase; letter-spacing: 1px;">Your OTP Code</div>
            <div style="font-size: 48px; font-weight: bold; color: #0066cc; letter-spacing: 8px; font-family: 'Courier New', monospace;">{code}</div>
            <div style="font-size: 14px; color: #999;">Valid for {minutes} minutes</div>
        </div>
        <div style="background-color: #fff3cd; border-left: 4px solid #ffc107; padding: 15px; border-radius: 4px;">
            <p style="font-size: 14px; color: #856404; margin: 0;"><strong>Security Notice:</strong> {notice}</p>
        </div>
        <div style="margin-top: 20px; font-size: 14px; color: #666;">
            <p>If you didn't request this code, please ignore this email. The code will expire automatically.</p>
            <p>Having trouble? Contact our support team at <a href="mailto:{support}">{support}</a></p>
        </div>
        <div style="text-align: center; margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; font-size: 12px; color: #999;">
            <p>&copy; {year} {brand}. All rights reserved.</p>
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }

    /// Plain-text body.
    #[must_use]
    pub fn text(&self) -> String {
        format!(
            "{brand} - {title}\n\n\
             Your OTP Code: {code}\n\n\
             This code is valid for {minutes} minutes.\n\n\
             Security Notice: {notice}\n\n\
             If you didn't request this code, please ignore this email.\n\
             Need help? Contact {support}\n\n\
             \u{a9} {year} {brand}. All rights reserved.",
            brand = self.brand,
            title = self.title(),
            code = self.code,
            minutes = self.expires_in_minutes,
            notice = self.security_notice(),
            support = self.support_email,
            year = self.year,
        )
    }
}

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(kind: OtpKind) -> OtpEmail<'static> {
        OtpEmail {
            brand: "FleetOS",
            support_email: "support@fleetos.com",
            kind,
            code: "123456",
            expires_in_minutes: 10,
            year: 2025,
        }
    }

    #[test]
    fn test_subject_by_kind() {
        assert_eq!(email(OtpKind::User).subject(), "FleetOS - Your Registration OTP");
        assert_eq!(
            email(OtpKind::Tenant).subject(),
            "FleetOS - Organization Registration OTP"
        );
    }

    #[test]
    fn test_html_carries_every_fact() {
        let html = email(OtpKind::Tenant).html();

        assert!(html.contains("Organization Registration"));
        assert!(html.contains("Complete your organization registration"));
        assert!(html.contains("123456"));
        assert!(html.contains("Valid for 10 minutes"));
        assert!(html.contains("FleetOS staff will never ask for your OTP code."));
        assert!(html.contains("mailto:support@fleetos.com"));
        assert!(html.contains("&copy; 2025 FleetOS"));
    }

    #[test]
    fn test_text_carries_every_fact() {
        let text = email(OtpKind::User).text();

        assert!(text.starts_with("FleetOS - User Registration"));
        assert!(text.contains("Your OTP Code: 123456"));
        assert!(text.contains("valid for 10 minutes"));
        assert!(text.contains("Never share this code with anyone."));
        assert!(text.contains("2025 FleetOS"));
    }

    #[test]
    fn test_code_is_escaped_in_html() {
        let mut otp = email(OtpKind::User);
        otp.code = "<b>1&2</b>";

        let html = otp.html();

        assert!(html.contains("&lt;b&gt;1&amp;2&lt;/b&gt;"));
        assert!(!html.contains("<b>1&2</b>"));
    }

    #[test]
    fn test_escape_html_leaves_plain_text() {
        assert_eq!(escape_html("FleetOS 123"), "FleetOS 123");
        assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#39;c");
    }
}
