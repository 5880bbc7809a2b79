//! InfluxDB v2 HTTP store
//!
//! Writes go to `/api/v2/write` as line protocol with nanosecond precision.
//! Queries are Flux scripts posted to `/api/v2/query`; the annotated CSV
//! response is pivoted server-side so that each row is one point.

use super::{FieldValue, MetricStore, Point, RangeQuery};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Columns produced by Flux that are not point fields
const META_COLUMNS: &[&str] = &["", "result", "table", "_start", "_stop", "_measurement"];

/// Connection settings for an InfluxDB v2 instance
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

/// Store backed by the InfluxDB v2 HTTP API
pub struct InfluxStore {
    client: Client,
    base_url: Url,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxStore {
    /// Create a new store client
    pub fn new(config: InfluxConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Request(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.url)
            .map_err(|e| StoreError::Request(format!("invalid store URL {}: {}", config.url, e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
            org: config.org,
            bucket: config.bucket,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Request(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Flux script selecting one series over a trailing range, one row per timestamp
    pub fn flux_query(bucket: &str, query: &RangeQuery) -> String {
        let secs = query.lookback.as_secs().max(1);
        format!(
            r#"from(bucket: "{bucket}")
  |> range(start: -{secs}s)
  |> filter(fn: (r) => r["_measurement"] == "{series}")
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> sort(columns: ["_time"])"#,
            bucket = escape_flux_string(bucket),
            secs = secs,
            series = escape_flux_string(&query.series),
        )
    }
}

#[async_trait]
impl MetricStore for InfluxStore {
    async fn write_point(&self, point: &Point) -> Result<(), StoreError> {
        let mut url = self.endpoint("api/v2/write")?;
        url.query_pairs_mut()
            .append_pair("org", &self.org)
            .append_pair("bucket", &self.bucket)
            .append_pair("precision", "ns");

        let body = encode_line(point)?;
        debug!(series = %point.series, line = %body, "Writing point");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(())
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<Point>, StoreError> {
        let mut url = self.endpoint("api/v2/query")?;
        url.query_pairs_mut().append_pair("org", &self.org);

        let body = serde_json::json!({
            "query": Self::flux_query(&self.bucket, query),
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": ["datatype"],
                "delimiter": ","
            }
        });

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, "application/csv")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let text = response.text().await?;
        let mut points = parse_annotated_csv(&text, &query.series)?;
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

fn escape_flux_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Encode a point as one line of InfluxDB line protocol
pub(crate) fn encode_line(point: &Point) -> Result<String, StoreError> {
    if point.fields.is_empty() {
        return Err(StoreError::Request(format!(
            "point in {} has no fields",
            point.series
        )));
    }

    let mut line = point.series.replace(',', "\\,").replace(' ', "\\ ");
    line.push(' ');

    for (i, (name, value)) in point.fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_key(name));
        line.push('=');
        match value {
            FieldValue::Float(v) => {
                if !v.is_finite() {
                    return Err(StoreError::Request(format!(
                        "field {} is not finite: {}",
                        name, v
                    )));
                }
                let _ = write!(line, "{}", v);
            }
            FieldValue::Integer(v) => {
                let _ = write!(line, "{}i", v);
            }
            FieldValue::String(s) => {
                let _ = write!(line, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""));
            }
            FieldValue::Boolean(b) => {
                let _ = write!(line, "{}", b);
            }
        }
    }

    let nanos = point
        .timestamp
        .timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Request("timestamp out of range".to_string()))?;
    let _ = write!(line, " {}", nanos);

    Ok(line)
}

/// Split one CSV record, honouring double-quoted cells
fn split_csv_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}

fn parse_cell(datatype: &str, raw: &str) -> Result<Option<FieldValue>, StoreError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let bad = |e: &dyn std::fmt::Display| {
        StoreError::Decode(format!("cannot parse {:?} as {}: {}", raw, datatype, e))
    };

    let value = match datatype {
        "double" => FieldValue::Float(raw.parse::<f64>().map_err(|e| bad(&e))?),
        "long" => FieldValue::Integer(raw.parse::<i64>().map_err(|e| bad(&e))?),
        "unsignedLong" => {
            let v = raw.parse::<u64>().map_err(|e| bad(&e))?;
            FieldValue::Integer(i64::try_from(v).map_err(|e| bad(&e))?)
        }
        "boolean" => FieldValue::Boolean(raw.parse::<bool>().map_err(|e| bad(&e))?),
        "string" => FieldValue::String(raw.to_string()),
        // dateTime and duration columns other than _time are not fields
        _ => return Ok(None),
    };

    Ok(Some(value))
}

/// Parse an annotated (datatype) CSV response into points
///
/// Each table starts with a `#datatype` row followed by a header row; tables
/// are separated by blank lines.
pub(crate) fn parse_annotated_csv(body: &str, series: &str) -> Result<Vec<Point>, StoreError> {
    let mut points = Vec::new();
    let mut datatypes: Vec<String> = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for raw_line in body.lines() {
        let line = raw_line.trim_end_matches('\r');

        if line.trim().is_empty() {
            datatypes.clear();
            header = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("#datatype,") {
            datatypes = std::iter::once(String::new())
                .chain(split_csv_row(rest))
                .collect();
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let cells = split_csv_row(line);
        let columns = match &header {
            None => {
                if cells.iter().any(|c| c == "error") {
                    return Err(StoreError::Decode(format!(
                        "query returned an error table: {}",
                        body.trim()
                    )));
                }
                header = Some(cells);
                continue;
            }
            Some(columns) => columns,
        };

        let mut timestamp: Option<DateTime<Utc>> = None;
        let mut point_series = series.to_string();
        let mut point = Point::new(series, Utc::now());

        for (idx, column) in columns.iter().enumerate() {
            let raw = cells.get(idx).map(String::as_str).unwrap_or("");
            match column.as_str() {
                "_time" => {
                    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|e| {
                        StoreError::Decode(format!("invalid _time {:?}: {}", raw, e))
                    })?;
                    timestamp = Some(parsed.with_timezone(&Utc));
                }
                "_measurement" if !raw.is_empty() => point_series = raw.to_string(),
                name if META_COLUMNS.contains(&name) => {}
                name => {
                    let datatype = datatypes.get(idx).map(String::as_str).unwrap_or("string");
                    if let Some(value) = parse_cell(datatype, raw)? {
                        point.fields.insert(name.to_string(), value);
                    }
                }
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| StoreError::Decode("row without _time column".to_string()))?;
        point.series = point_series;
        point.timestamp = timestamp;
        points.push(point);
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NETWORK_METRICS;
    use chrono::TimeZone;

    fn sample_point() -> Point {
        Point::new(
            NETWORK_METRICS,
            Utc.timestamp_opt(1_700_000_000, 500).single().unwrap(),
        )
        .field("download_speed", 12.5)
        .field("packets_sent", 1024i64)
        .field("health_status", "good")
        .field("flag", true)
    }

    #[test]
    fn test_encode_line_protocol() {
        let line = encode_line(&sample_point()).unwrap();
        assert_eq!(
            line,
            "network_metrics download_speed=12.5,flag=true,health_status=\"good\",packets_sent=1024i 1700000000000000500"
        );
    }

    #[test]
    fn test_encode_rejects_non_finite_and_empty() {
        let nan = Point::new(NETWORK_METRICS, Utc::now()).field("upload_speed", f64::NAN);
        assert!(encode_line(&nan).is_err());

        let empty = Point::new(NETWORK_METRICS, Utc::now());
        assert!(encode_line(&empty).is_err());
    }

    #[test]
    fn test_flux_query_shape() {
        let flux = InfluxStore::flux_query(
            "net",
            &RangeQuery::new(NETWORK_METRICS, Duration::from_secs(300)),
        );
        assert!(flux.contains(r#"from(bucket: "net")"#));
        assert!(flux.contains("range(start: -300s)"));
        assert!(flux.contains(r#"r["_measurement"] == "network_metrics""#));
        assert!(flux.contains("pivot("));
    }

    #[test]
    fn test_parse_annotated_csv_with_nulls_and_tables() {
        let body = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,string,double,double,long\r\n\
,result,table,_start,_stop,_time,_measurement,download_speed,latency,packets_sent\r\n\
,_result,0,2024-01-01T00:00:00Z,2024-01-01T00:05:00Z,2024-01-01T00:01:00Z,network_metrics,1.5,12.25,100\r\n\
,_result,0,2024-01-01T00:00:00Z,2024-01-01T00:05:00Z,2024-01-01T00:02:00Z,network_metrics,2.5,,110\r\n\
\r\n\
#datatype,string,long,dateTime:RFC3339,string\r\n\
,result,table,_time,health_status\r\n\
,_result,1,2024-01-01T00:03:00Z,\"warn,ing\"\r\n";

        let points = parse_annotated_csv(body, NETWORK_METRICS).unwrap();
        assert_eq!(points.len(), 3);

        assert_eq!(points[0].get("download_speed"), Some(&FieldValue::Float(1.5)));
        assert_eq!(points[0].get("latency"), Some(&FieldValue::Float(12.25)));
        assert_eq!(points[0].get("packets_sent"), Some(&FieldValue::Integer(100)));
        assert!(points[1].get("latency").is_none());
        assert_eq!(
            points[2].get("health_status"),
            Some(&FieldValue::String("warn,ing".to_string()))
        );
        assert!(points[0].get("_start").is_none());
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_annotated_csv("", NETWORK_METRICS).unwrap().is_empty());
        assert!(parse_annotated_csv("\r\n", NETWORK_METRICS).unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_table() {
        let body = "#datatype,string,string\n,error,reference\n,bucket not found,\n";
        assert!(parse_annotated_csv(body, NETWORK_METRICS).is_err());
    }

    fn store_for(server: &mockito::ServerGuard) -> InfluxStore {
        InfluxStore::new(InfluxConfig {
            url: server.url(),
            token: "secret".to_string(),
            org: "home".to_string(),
            bucket: "net".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_point_posts_line_protocol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("org".into(), "home".into()),
                mockito::Matcher::UrlEncoded("bucket".into(), "net".into()),
                mockito::Matcher::UrlEncoded("precision".into(), "ns".into()),
            ]))
            .match_header("authorization", "Token secret")
            .match_body(mockito::Matcher::Regex(
                "^network_metrics download_speed=12.5".to_string(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let store = store_for(&server);
        store.write_point(&sample_point()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_point_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v2/write")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("unauthorized access")
            .create_async()
            .await;

        let store = store_for(&server);
        let err = store.write_point(&sample_point()).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_query_range_parses_and_sorts() {
        let mut server = mockito::Server::new_async().await;
        let body = "#datatype,string,long,dateTime:RFC3339,string,double\n\
,result,table,_time,_measurement,upload_speed\n\
,_result,0,2024-01-01T00:02:00Z,network_metrics,0.9\n\
,_result,0,2024-01-01T00:01:00Z,network_metrics,0.8\n";
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(mockito::Matcher::UrlEncoded("org".into(), "home".into()))
            .match_header("accept", "application/csv")
            .match_body(mockito::Matcher::Regex("network_metrics".to_string()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let store = store_for(&server);
        let points = store
            .query_range(&RangeQuery::new(NETWORK_METRICS, Duration::from_secs(300)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].get("upload_speed"), Some(&FieldValue::Float(0.8)));
        assert_eq!(points[1].get("upload_speed"), Some(&FieldValue::Float(0.9)));
    }
}
