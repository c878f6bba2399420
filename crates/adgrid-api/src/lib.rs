// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use adgrid_app::{
    DateRange, Preset, PresetBackend, PresetId, PresetPayload, Row, RowBackend, UserId,
};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use time::Date;
use time::macros::format_description;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Preset record fields that are never column flags.
const PRESET_RESERVED_KEYS: [&str; 3] = ["id", "user_id", "name"];

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url {base_url:?} uses unsupported scheme {:?}; use http or https",
                parsed.scheme()
            );
        }
        if timeout.is_zero() {
            bail!("api.timeout must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: None,
            timeout,
            http,
        })
    }

    /// Sends `Authorization: Bearer <token>` on every request. A blank token
    /// disables the header.
    pub fn with_token(mut self, token: &str) -> Self {
        let token = token.trim();
        self.token = (!token.is_empty()).then(|| token.to_owned());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fetch_rows(&self, range: DateRange) -> Result<Vec<Row>> {
        let mut url = self.endpoint("rows")?;
        url.query_pairs_mut()
            .append_pair("start", &format_date(range.start())?)
            .append_pair("end", &format_date(range.end())?);

        let response = self.send(self.http.get(url))?;
        let envelope: Envelope<Vec<Row>> = decode(response, "row list")?;
        let rows = envelope
            .into_data("fetch rows")?
            .ok_or_else(|| anyhow!("row list response has no data"))?;
        debug!(count = rows.len(), "fetched rows");
        Ok(rows)
    }

    pub fn update_row(&self, row: &Row) -> Result<Option<Row>> {
        let url = self.endpoint(&format!("rows/{}", row.id))?;
        let response = self.send(self.http.post(url).json(row))?;
        let envelope: Envelope<Value> = decode(response, "row update")?;
        let Some(data) = envelope.into_data("update row")? else {
            return Ok(None);
        };
        match serde_json::from_value::<Row>(data) {
            Ok(server_row) => Ok(Some(server_row)),
            Err(error) => {
                debug!(row = %row.id, %error, "update response carried no row; keeping local copy");
                Ok(None)
            }
        }
    }

    pub fn list_presets(&self, owner: UserId) -> Result<Vec<Preset>> {
        let url = self.endpoint(&format!("presets/user/{owner}"))?;
        let response = self.send(self.http.get(url))?;
        let envelope: Envelope<Vec<Value>> = decode(response, "preset list")?;
        envelope
            .into_data("list presets")?
            .unwrap_or_default()
            .iter()
            .map(|record| parse_preset(record, owner))
            .collect()
    }

    pub fn create_preset(&self, payload: &PresetPayload) -> Result<()> {
        let url = self.endpoint("presets")?;
        let response = self.send(self.http.post(url).json(payload))?;
        let envelope: Envelope<Value> = decode(response, "preset create")?;
        envelope.into_data("create preset").map(|_| ())
    }

    pub fn update_preset(&self, id: PresetId, payload: &PresetPayload) -> Result<()> {
        let url = self.endpoint(&format!("presets/{id}"))?;
        let response = self.send(self.http.put(url).json(payload))?;
        let envelope: Envelope<Value> = decode(response, "preset update")?;
        envelope.into_data("update preset").map(|_| ())
    }

    pub fn delete_preset(&self, id: PresetId) -> Result<()> {
        let url = self.endpoint(&format!("presets/{id}"))?;
        let response = self.send(self.http.delete(url))?;
        let envelope: Envelope<Value> = decode(response, "preset delete")?;
        envelope.into_data("delete preset").map(|_| ())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{path}", self.base_url);
        Url::parse(&raw).with_context(|| format!("build request URL {raw}"))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

impl RowBackend for Client {
    fn fetch_rows(&mut self, range: DateRange) -> Result<Vec<Row>> {
        Client::fetch_rows(self, range)
    }

    fn update_row(&mut self, row: &Row) -> Result<Option<Row>> {
        Client::update_row(self, row)
    }
}

impl PresetBackend for Client {
    fn list_presets(&mut self, owner: UserId) -> Result<Vec<Preset>> {
        Client::list_presets(self, owner)
    }

    fn create_preset(&mut self, payload: &PresetPayload) -> Result<()> {
        Client::create_preset(self, payload)
    }

    fn update_preset(&mut self, id: PresetId, payload: &PresetPayload) -> Result<()> {
        Client::update_preset(self, id, payload)
    }

    fn delete_preset(&mut self, id: PresetId) -> Result<()> {
        Client::delete_preset(self, id)
    }
}

/// `{ success, data, message }`; every field is optional on the wire.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn empty() -> Self {
        Self {
            success: None,
            data: None,
            message: None,
        }
    }

    fn into_data(self, action: &str) -> Result<Option<T>> {
        if self.success == Some(false) {
            let message = self
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "no reason given".to_owned());
            bail!("{action} rejected by server: {message}");
        }
        Ok(self.data)
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<Envelope<T>> {
    let body = response
        .text()
        .with_context(|| format!("read {what} response"))?;
    if body.trim().is_empty() {
        return Ok(Envelope::empty());
    }
    serde_json::from_str(&body).with_context(|| format!("decode {what} response"))
}

fn format_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("format date {date}"))
}

/// Reads one preset record. Flags may arrive as 0/1, booleans or "0"/"1";
/// anything else (timestamps, audit columns) is skipped.
fn parse_preset(record: &Value, owner: UserId) -> Result<Preset> {
    let object = record
        .as_object()
        .ok_or_else(|| anyhow!("preset record is not an object: {record}"))?;

    let id = read_id(object, "id")?
        .ok_or_else(|| anyhow!("preset record is missing `id`: {record}"))?;
    let owner_id = read_id(object, "user_id")?.unwrap_or(owner.get());
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("preset {id} is missing `name`"))?
        .to_owned();

    let hidden: BTreeMap<String, bool> = object
        .iter()
        .filter(|(key, _)| !PRESET_RESERVED_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| flag_value(value).map(|flag| (key.clone(), flag)))
        .collect();

    Ok(Preset {
        id: PresetId::new(id),
        owner_id: UserId::new(owner_id),
        name,
        hidden,
    })
}

fn read_id(object: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| anyhow!("preset `{key}` is not an integer: {number}")),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .with_context(|| format!("preset `{key}` is not an integer: {raw:?}")),
        Some(other) => bail!("preset `{key}` has unexpected type: {other}"),
    }
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(raw) => match raw.trim() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach {base_url} -- check api.base_url in your config ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<Envelope<Value>>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, flag_value, parse_preset};
    use adgrid_app::{PresetId, UserId};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn base_url_is_trimmed_and_validated() {
        let client = Client::new("http://localhost:8080/api///", Duration::from_secs(1))
            .expect("valid base url");
        assert_eq!(client.base_url(), "http://localhost:8080/api");

        assert!(Client::new("   ", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://example.com", Duration::from_secs(1)).is_err());
        assert!(Client::new("http://localhost", Duration::ZERO).is_err());
    }

    #[test]
    fn preset_flags_accept_every_wire_form() {
        let record = json!({
            "id": "7",
            "user_id": 3,
            "name": "Finance",
            "notes": 1,
            "total": 0,
            "adv_payout": true,
            "pub_payout": "1",
            "publisher": "0",
            "created_at": "2026-02-01T00:00:00Z",
            "sort_index": 4,
        });
        let preset = parse_preset(&record, UserId::new(9)).expect("record parses");
        assert_eq!(preset.id, PresetId::new(7));
        assert_eq!(preset.owner_id, UserId::new(3));
        assert_eq!(preset.name, "Finance");
        let flags: Vec<(&str, bool)> = preset
            .hidden
            .iter()
            .map(|(key, flag)| (key.as_str(), *flag))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("adv_payout", true),
                ("notes", true),
                ("pub_payout", true),
                ("publisher", false),
                ("total", false),
            ]
        );
    }

    #[test]
    fn preset_without_owner_falls_back_to_requester() {
        let preset = parse_preset(&json!({"id": 1, "name": "Mine"}), UserId::new(4))
            .expect("record parses");
        assert_eq!(preset.owner_id, UserId::new(4));
        assert!(preset.hidden.is_empty());
    }

    #[test]
    fn preset_without_id_is_rejected() {
        let error = parse_preset(&json!({"name": "Mine"}), UserId::new(1))
            .expect_err("id is required");
        assert!(error.to_string().contains("missing `id`"));
    }

    #[test]
    fn flag_value_ignores_non_flags() {
        assert_eq!(flag_value(&json!(2)), None);
        assert_eq!(flag_value(&json!("yes")), None);
        assert_eq!(flag_value(&json!(null)), None);
        assert_eq!(flag_value(&json!(false)), Some(false));
    }

    #[test]
    fn error_response_prefers_json_message() {
        let error = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success":false,"message":"database is locked"}"#,
        );
        assert_eq!(error.to_string(), "server error (500): database is locked");

        let error = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error.to_string(), "server error (502): upstream down");

        let error = clean_error_response(StatusCode::NOT_FOUND, r#"{"detail":"x"}"#);
        assert_eq!(error.to_string(), "server returned 404");
    }
}
