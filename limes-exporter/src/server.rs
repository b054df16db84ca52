use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use limes_db::Store;
use limes_db::metrics::LabeledSample;
use tower_http::trace::TraceLayer;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8; escaping=underscores";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub report_zeroes: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A series declared by the exporter, in the fixed alphabetical order its
/// name is emitted in (§4.9). Each entry fetches and renders its own rows
/// independently; nothing is merged across series into a shared map.
struct Series {
    name: &'static str,
    help: &'static str,
}

async fn serve_metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();

    if let Err(err) = render_series(
        &mut body,
        Series {
            name: "limes_az_resource_raw_capacity",
            help: "Raw capacity reported for a resource in an availability zone.",
        },
        state.store.metrics().az_resource_raw_capacity().await,
    ) {
        return error_response(err);
    }

    if let Err(err) = render_series(
        &mut body,
        Series {
            name: "limes_az_resource_usage",
            help: "Usage reported for a resource in an availability zone.",
        },
        state.store.metrics().az_resource_usage(state.report_zeroes).await,
    ) {
        return error_response(err);
    }

    if let Err(err) = render_series(
        &mut body,
        Series {
            name: "limes_project_az_resource_usage",
            help: "Per-project usage of a resource in an availability zone.",
        },
        state
            .store
            .metrics()
            .project_az_resource_usage(state.report_zeroes)
            .await,
    ) {
        return error_response(err);
    }

    if let Err(err) = render_series(
        &mut body,
        Series {
            name: "limes_project_commitment_amount",
            help: "Amount committed by a project for a resource, by status.",
        },
        state.store.metrics().project_commitment_amount().await,
    ) {
        return error_response(err);
    }

    if let Err(err) = render_series(
        &mut body,
        Series {
            name: "limes_project_resource_quota",
            help: "Quota assigned to a project for a resource.",
        },
        state.store.metrics().project_resource_quota().await,
    ) {
        return error_response(err);
    }

    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response
}

fn render_series(
    body: &mut String,
    series: Series,
    samples: limes_db::Result<Vec<LabeledSample>>,
) -> Result<(), limes_db::Error> {
    let samples = samples?;

    let mut lines: Vec<(String, f64)> = samples
        .into_iter()
        .map(|sample| (format_labels(&sample.labels), sample.value))
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0));

    body.push_str("# HELP ");
    body.push_str(series.name);
    body.push(' ');
    body.push_str(series.help);
    body.push('\n');
    body.push_str("# TYPE ");
    body.push_str(series.name);
    body.push_str(" gauge\n");

    for (labels, value) in lines {
        body.push_str(series.name);
        body.push_str(&labels);
        body.push(' ');
        body.push_str(&format_value(value));
        body.push('\n');
    }

    Ok(())
}

/// Renders a JSON label object as a Prometheus label set, sorted by label
/// name so the line is stable independent of the database's column order.
fn format_labels(labels: &serde_json::Value) -> String {
    let Some(object) = labels.as_object() else {
        return String::from("{}");
    };

    let mut pairs: Vec<(&String, &serde_json::Value)> = object.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut rendered = String::from("{");
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        if i > 0 {
            rendered.push(',');
        }
        rendered.push_str(key);
        rendered.push_str("=\"");
        rendered.push_str(&escape_label_value(value));
        rendered.push('"');
    }
    rendered.push('}');
    rendered
}

fn escape_label_value(value: &serde_json::Value) -> String {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn error_response(err: limes_db::Error) -> Response {
    tracing::error!(error = %err, "failed to query metrics");
    (StatusCode::INTERNAL_SERVER_ERROR, "failed to query metrics").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_labels_sorts_by_key_regardless_of_input_order() {
        let labels = json!({"resource": "cores", "az": "az-one", "service_type": "compute"});
        assert_eq!(format_labels(&labels), r#"{az="az-one",resource="cores",service_type="compute"}"#);
    }

    #[test]
    fn format_labels_escapes_special_characters() {
        let labels = json!({"name": "a\"b\\c\nd"});
        assert_eq!(format_labels(&labels), r#"{name="a\"b\\c\nd"}"#);
    }

    #[test]
    fn format_labels_on_non_object_falls_back_to_empty_set() {
        assert_eq!(format_labels(&json!(null)), "{}");
    }

    #[test]
    fn format_value_renders_whole_numbers_without_a_decimal_point() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.0), "0");
    }

    #[test]
    fn format_value_keeps_fractional_values() {
        assert_eq!(format_value(1.5), "1.5");
    }

    #[test]
    fn render_series_sorts_lines_lexicographically_by_label_string() {
        let samples = vec![
            LabeledSample { labels: json!({"az": "b"}), value: 1.0 },
            LabeledSample { labels: json!({"az": "a"}), value: 2.0 },
        ];
        let mut body = String::new();
        render_series(
            &mut body,
            Series { name: "limes_test_metric", help: "help text" },
            Ok(samples),
        )
        .unwrap();

        let lines: Vec<&str> = body.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(lines, vec![r#"limes_test_metric{az="a"} 2"#, r#"limes_test_metric{az="b"} 1"#]);
    }

    #[test]
    fn render_series_emits_help_and_type_lines() {
        let mut body = String::new();
        render_series(&mut body, Series { name: "limes_test_metric", help: "a gauge" }, Ok(Vec::new())).unwrap();
        assert!(body.contains("# HELP limes_test_metric a gauge\n"));
        assert!(body.contains("# TYPE limes_test_metric gauge\n"));
    }
}
