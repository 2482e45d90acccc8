use std::fmt::Write as _;

use axum::response::Html;

use crate::config::RoutesConfig;
use crate::forms::ValidationErrors;
use crate::models::{AuthProvider, ProfileView, User};

/// What a re-rendered form shows: the values to keep and what went wrong.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormState<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub callback_url: Option<&'a str>,
    pub errors: Option<&'a ValidationErrors>,
    /// Form-wide message, e.g. rejected credentials.
    pub message: Option<&'a str>,
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    ))
}

fn field_error(body: &mut String, state: &FormState<'_>, field: &str) {
    if let Some(message) = state.errors.and_then(|e| e.get(field)) {
        let _ = writeln!(
            body,
            "<p class=\"field-error\" data-field=\"{}\">{}</p>",
            field,
            escape(message)
        );
    }
}

fn input(body: &mut String, state: &FormState<'_>, kind: &str, name: &str, value: &str) {
    let _ = writeln!(
        body,
        "<label>{name}<input type=\"{kind}\" name=\"{name}\" value=\"{}\"></label>",
        escape(value)
    );
    field_error(body, state, name);
}

fn form_message(body: &mut String, state: &FormState<'_>) {
    if let Some(message) = state.message {
        let _ = writeln!(body, "<p class=\"form-error\">{}</p>", escape(message));
    }
}

pub fn sign_in_page(routes: &RoutesConfig, state: &FormState<'_>) -> Html<String> {
    let mut body = String::from("<h1>Sign in</h1>\n");
    form_message(&mut body, state);
    let _ = writeln!(body, "<form method=\"post\" action=\"{}\">", escape(&routes.sign_in));
    input(&mut body, state, "email", "email", state.email);
    input(&mut body, state, "password", "password", "");
    if let Some(callback) = state.callback_url {
        let _ = writeln!(
            body,
            "<input type=\"hidden\" name=\"callbackUrl\" value=\"{}\">",
            escape(callback)
        );
    }
    body.push_str("<button type=\"submit\">Sign in</button>\n</form>\n");
    let _ = writeln!(
        body,
        "<a href=\"/auth/oauth/{}\">Continue with Google</a>",
        AuthProvider::Google.as_str()
    );
    let _ = writeln!(
        body,
        "<p>No account? <a href=\"{}\">Sign up</a></p>",
        escape(&routes.sign_up)
    );
    layout("Sign in", &body)
}

pub fn sign_up_page(routes: &RoutesConfig, state: &FormState<'_>) -> Html<String> {
    let mut body = String::from("<h1>Create an account</h1>\n");
    form_message(&mut body, state);
    let _ = writeln!(body, "<form method=\"post\" action=\"{}\">", escape(&routes.sign_up));
    input(&mut body, state, "text", "name", state.name);
    input(&mut body, state, "email", "email", state.email);
    input(&mut body, state, "password", "password", "");
    input(&mut body, state, "password", "confirmPassword", "");
    body.push_str("<button type=\"submit\">Sign up</button>\n</form>\n");
    let _ = writeln!(
        body,
        "<p>Already registered? <a href=\"{}\">Sign in</a></p>",
        escape(&routes.sign_in)
    );
    layout("Sign up", &body)
}

fn logout_form(body: &mut String) {
    body.push_str(
        "<form method=\"post\" action=\"/auth/logout\"><button type=\"submit\">Sign out</button></form>\n",
    );
}

pub fn dashboard_page(routes: &RoutesConfig, user: &User) -> Html<String> {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Welcome, {}</h1>", escape(&user.name));
    let _ = writeln!(body, "<p class=\"email\">{}</p>", escape(&user.email));
    if !user.is_verified {
        body.push_str("<p class=\"notice\">Your email address is not verified yet.</p>\n");
    }
    let _ = writeln!(
        body,
        "<a href=\"{}/profile\">Profile</a>",
        escape(routes.dashboard.trim_end_matches('/'))
    );
    logout_form(&mut body);
    layout("Dashboard", &body)
}

pub fn profile_page(view: &ProfileView) -> Html<String> {
    let mut body = String::from("<h1>Profile</h1>\n");
    match &view.avatar {
        Some(url) => {
            let _ = writeln!(
                body,
                "<img class=\"avatar\" src=\"{}\" alt=\"{}\">",
                escape(url),
                escape(&view.initials)
            );
        }
        None => {
            let _ = writeln!(body, "<span class=\"avatar\">{}</span>", escape(&view.initials));
        }
    }
    body.push_str("<dl>\n");
    for (term, value) in [
        ("Name", view.display_name.as_str()),
        ("Email", view.email.as_str()),
        ("Sign-in method", view.provider_label),
        ("Status", view.verification_label),
        ("Member since", view.member_since.as_str()),
    ] {
        let _ = writeln!(body, "<dt>{}</dt><dd>{}</dd>", term, escape(value));
    }
    body.push_str("</dl>\n");
    logout_form(&mut body);
    layout("Profile", &body)
}

pub fn error_page(title: &str, message: &str) -> Html<String> {
    layout(
        title,
        &format!("<h1>{}</h1>\n<p>{}</p>\n", escape(title), escape(message)),
    )
}
