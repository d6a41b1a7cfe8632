//! Website session login
//!
//! Establishes an authenticated session against the website's form login:
//! fetch the login page, pull the CSRF token out of the form, POST the
//! credentials, then verify by looking for the profile link on the home
//! page. The cookie jar of the shared HTTP client carries the session for
//! the rest of the run.

use crate::config::Credentials;
use crate::error::{Error, Result};
use regex::Regex;
use reqwest::Client;
use tracing::info;

/// Form-based session authenticator
#[derive(Debug, Clone)]
pub struct SessionAuth {
    credentials: Credentials,
}

impl SessionAuth {
    /// Create an authenticator for the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Log into the website, leaving the session cookies on `http`
    pub async fn login(&self, http: &Client, site_url: &str) -> Result<()> {
        let site = site_url.trim_end_matches('/');

        let login_page = http
            .get(format!("{site}/login"))
            .send()
            .await
            .map_err(|e| Error::auth(format!("failed to load login page: {e}")))?
            .text()
            .await
            .map_err(|e| Error::auth(format!("failed to read login page: {e}")))?;

        let token = extract_csrf_token(&login_page)
            .ok_or_else(|| Error::auth("no authenticity token on login page"))?;

        let form = [
            ("authenticity_token", token.as_str()),
            ("user[email]", self.credentials.username.as_str()),
            ("user[password]", self.credentials.password.as_str()),
            ("user[remember_me]", "0"),
        ];

        let response = http
            .post(format!("{site}/session"))
            .header("Origin", site)
            .header("Referer", format!("{site}/login"))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::auth(format!("login request failed: {e}")))?;

        if !response.status().is_success() && !response.status().is_redirection() {
            return Err(Error::auth(format!(
                "login rejected with HTTP {}",
                response.status().as_u16()
            )));
        }

        // A 200 from the login route is not proof of success; the profile
        // link on the home page is.
        let home = http
            .get(format!("{site}/home"))
            .send()
            .await
            .map_err(|e| Error::auth(format!("failed to load home page: {e}")))?
            .text()
            .await
            .map_err(|e| Error::auth(format!("failed to read home page: {e}")))?;

        let profile_path = format!("/people/{}", self.credentials.username.to_lowercase());
        if !home.contains(&profile_path) {
            return Err(Error::auth(format!(
                "login as {} could not be verified",
                self.credentials.username
            )));
        }

        info!(username = %self.credentials.username, "logged into the website");
        Ok(())
    }
}

/// Pull the CSRF token out of the login form
fn extract_csrf_token(html: &str) -> Option<String> {
    let re = Regex::new(r#"name="authenticity_token"\s+value="([^"]+)""#).ok()?;
    re.captures(html).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csrf_token() {
        let html = r#"<form action="/session" method="post">
            <input type="hidden" name="authenticity_token" value="abc123tok==" />
        </form>"#;
        assert_eq!(extract_csrf_token(html), Some("abc123tok==".to_string()));
    }

    #[test]
    fn test_extract_csrf_token_missing() {
        assert_eq!(extract_csrf_token("<html><body>no form</body></html>"), None);
    }
}
