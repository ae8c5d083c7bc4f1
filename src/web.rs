//! HTML button page served by axum.
//!
//! Lists every template title as a button with its raw body underneath. When
//! the store is empty the configured fallback labels are shown instead.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::store::TemplateStore;

/// One button on the page. Fallback labels have no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub body: Option<String>,
}

/// Everything the page shows, computed once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPage {
    pub buttons: Vec<Button>,
}

impl ButtonPage {
    pub fn from_store(store: &TemplateStore, fallback: &[String]) -> Self {
        let buttons: Vec<Button> = if store.is_empty() {
            fallback
                .iter()
                .map(|label| Button {
                    label: label.clone(),
                    body: None,
                })
                .collect()
        } else {
            store
                .iter_sorted()
                .into_iter()
                .map(|(title, body)| Button {
                    label: title.to_string(),
                    body: Some(body.to_string()),
                })
                .collect()
        };
        Self { buttons }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Templates</title>\n</head>\n<body>\n<h1>Templates</h1>\n",
        );
        for button in &self.buttons {
            html.push_str("<section>\n<button type=\"button\">");
            html.push_str(&escape_html(&button.label));
            html.push_str("</button>\n");
            if let Some(body) = &button.body {
                html.push_str("<pre>");
                html.push_str(&escape_html(body));
                html.push_str("</pre>\n");
            }
            html.push_str("</section>\n");
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

/// Router serving the page at `/`.
pub fn router(page: ButtonPage) -> Router {
    Router::new()
        .route("/", get(home))
        .with_state(Arc::new(page))
}

async fn home(State(page): State<Arc<ButtonPage>>) -> Html<String> {
    Html(page.to_html())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
