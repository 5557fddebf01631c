//! Bodies for the verification and password-reset mails.

use super::OutgoingMail;

fn link(base_url: &str, path: &str, token: &str, email: &str) -> String {
    format!(
        "{}{}?token={}&email={}",
        base_url,
        path,
        token,
        urlencoding::encode(email)
    )
}

/// Verification link for a fresh registration or a changed address.
pub fn verification_mail(base_url: &str, raw_token: &str, email: &str, new_address: bool) -> OutgoingMail {
    let url = link(base_url, "/api/auth/verify-email", raw_token, email);
    let (subject, text) = if new_address {
        (
            "Verify your new email",
            format!("Please verify your new email: {url}"),
        )
    } else {
        ("Verify your email", format!("Please verify your email: {url}"))
    };

    OutgoingMail {
        to: email.to_string(),
        subject: subject.to_string(),
        text,
        html: format!(r#"<p>Please verify your email by clicking <a href="{url}">here</a></p>"#),
    }
}

/// Password reset link.
pub fn password_reset_mail(base_url: &str, raw_token: &str, email: &str) -> OutgoingMail {
    let url = link(base_url, "/api/auth/reset-password", raw_token, email);

    OutgoingMail {
        to: email.to_string(),
        subject: "Password reset".to_string(),
        text: format!("Reset link: {url}"),
        html: format!(r#"<p>Reset link: <a href="{url}">Reset password</a></p>"#),
    }
}

/// Pull the `token` query parameter back out of a mail produced here.
pub fn extract_token(mail: &OutgoingMail) -> Option<String> {
    let start = mail.text.find("token=")? + "token=".len();
    let rest = &mail.text[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_encodes_email() {
        let mail = verification_mail("http://localhost:4000", "abc123", "a+b@x.com", false);
        assert_eq!(mail.to, "a+b@x.com");
        assert_eq!(mail.subject, "Verify your email");
        assert!(mail.text.contains(
            "http://localhost:4000/api/auth/verify-email?token=abc123&email=a%2Bb%40x.com"
        ));
        assert!(mail.html.contains("href=\"http://localhost:4000/api/auth/verify-email"));
    }

    #[test]
    fn test_new_address_wording() {
        let mail = verification_mail("http://h", "t", "a@x.com", true);
        assert_eq!(mail.subject, "Verify your new email");
    }

    #[test]
    fn test_reset_link() {
        let mail = password_reset_mail("http://h", "t0k", "a@x.com");
        assert_eq!(mail.subject, "Password reset");
        assert!(mail.text.contains("http://h/api/auth/reset-password?token=t0k&email=a%40x.com"));
    }

    #[test]
    fn test_extract_token() {
        let mail = password_reset_mail("http://h", "deadbeef", "a@x.com");
        assert_eq!(extract_token(&mail).as_deref(), Some("deadbeef"));
    }
}
