//! Discovery documents served under `/.well-known/`.
//!
//! The shipped `ai-plugin.json` and `openapi.yaml` are templates: configured
//! values are written over the default entries by regex, so unset options
//! leave the shipped text byte-for-byte intact.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{PluginConfig, ServerConfig};

const AI_PLUGIN_TEMPLATE: &str = include_str!("../resources/ai-plugin.json");
const OPENAPI_TEMPLATE: &str = include_str!("../resources/openapi.yaml");

/// Served as `/.well-known/logo.png`.
pub const LOGO_PNG: &[u8] = include_bytes!("../resources/logo.png");

/// A JSON string literal, quotes included
const JSON_STRING: &str = r#""(?:[^"\\]|\\.)*""#;

fn string_entry(key: &str) -> Regex {
    Regex::new(&format!(r#"("{key}"\s*:\s*){JSON_STRING}"#)).expect("Invalid regex")
}

static NAME_FOR_MODEL: Lazy<Regex> = Lazy::new(|| string_entry("name_for_model"));
static NAME_FOR_HUMAN: Lazy<Regex> = Lazy::new(|| string_entry("name_for_human"));
static DESCRIPTION_FOR_MODEL: Lazy<Regex> = Lazy::new(|| string_entry("description_for_model"));
static DESCRIPTION_FOR_HUMAN: Lazy<Regex> = Lazy::new(|| string_entry("description_for_human"));
static LOGO_URL: Lazy<Regex> = Lazy::new(|| string_entry("logo_url"));
static API_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"("api"\s*:\s*\{{[^{{}}]*?"url"\s*:\s*){JSON_STRING}"#))
        .expect("Invalid regex")
});
static AUTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"("auth"\s*:\s*)\{[^{}]*\}"#).expect("Invalid regex"));

static SERVER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(servers:\s*\n\s*-\s*url:\s*)\S+").expect("Invalid regex"));
static PATH_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(\s+)/[^/\s]+/(query|upsert):").expect("Invalid regex")
});

/// Rendered discovery documents.
#[derive(Debug, Clone)]
pub struct Manifest {
    ai_plugin: String,
    openapi: String,
}

impl Manifest {
    /// Render both documents once; `auth_json` is the authenticator's
    /// `auth` block.
    pub fn render(config: &ServerConfig, auth_json: &str) -> Self {
        Self {
            ai_plugin: update_ai_plugin(AI_PLUGIN_TEMPLATE, &config.plugin, auth_json),
            openapi: update_openapi(
                OPENAPI_TEMPLATE,
                config.plugin.openapi_server_url.as_deref(),
                config.prefix(),
            ),
        }
    }

    pub fn ai_plugin_json(&self) -> &str {
        &self.ai_plugin
    }

    pub fn openapi_yaml(&self) -> &str {
        &self.openapi
    }
}

fn replace_string(content: String, re: &Regex, value: Option<&str>) -> String {
    let Some(value) = value else {
        return content;
    };
    let literal = serde_json::Value::String(value.to_string()).to_string();
    re.replace(&content, |caps: &Captures| format!("{}{}", &caps[1], literal))
        .into_owned()
}

/// Apply plugin settings and the auth block to an `ai-plugin.json` template.
pub fn update_ai_plugin(template: &str, plugin: &PluginConfig, auth_json: &str) -> String {
    let mut content = template.to_string();
    content = replace_string(content, &NAME_FOR_MODEL, plugin.name_for_model.as_deref());
    content = replace_string(content, &NAME_FOR_HUMAN, plugin.name_for_human.as_deref());
    content = replace_string(
        content,
        &DESCRIPTION_FOR_MODEL,
        plugin.description_for_model.as_deref(),
    );
    content = replace_string(
        content,
        &DESCRIPTION_FOR_HUMAN,
        plugin.description_for_human.as_deref(),
    );
    content = replace_string(content, &API_URL, plugin.openapi_yaml_url.as_deref());
    content = replace_string(content, &LOGO_URL, plugin.logo_url.as_deref());
    AUTH.replace(&content, |caps: &Captures| format!("{}{}", &caps[1], auth_json))
        .into_owned()
}

/// Point the OpenAPI document at the configured server and path prefix.
pub fn update_openapi(template: &str, server_url: Option<&str>, prefix: &str) -> String {
    let content = match server_url {
        Some(url) => SERVER_URL
            .replace(template, |caps: &Captures| format!("{}{}", &caps[1], url))
            .into_owned(),
        None => template.to_string(),
    };
    PATH_KEY
        .replace_all(&content, |caps: &Captures| {
            format!("{}{}/{}:", &caps[1], prefix, &caps[2])
        })
        .into_owned()
}
