//! Server-side HTML for the dashboard page.
//!
//! The page has three parts: a sidebar form with the connection fields, a
//! status header, and the result area (metric grid, text block or error
//! banner). Everything user or broker supplied goes through [`escape_html`].

use std::fmt::Write;
use std::time::Duration;

use sensorpeek_core::{metric_rows, FetchResult, PUBLIC_TEST_BROKERS};
use sensorpeek_mqtt::ConnectionConfig;
use serde_json::{Map, Value};

use crate::models::SessionState;

pub struct DashboardView<'a> {
    pub session: &'a SessionState,
    pub timeout: Duration,
    /// Shown above the results, e.g. a rejected form submission.
    pub notice: Option<&'a str>,
}

pub fn dashboard(view: &DashboardView<'_>) -> String {
    let mut body = String::new();
    body.push_str(&sidebar(&view.session.last_config, view.timeout));
    body.push_str("<main>");
    body.push_str(&header(view.session));
    body.push_str(&help_panel());
    if let Some(notice) = view.notice {
        let _ = write!(body, r#"<div class="banner banner-error">{}</div>"#, escape_html(notice));
    }
    body.push_str(&results(view.session.last_result.as_ref()));
    body.push_str("</main>");

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>SensorPeek</title>
<link rel="stylesheet" href="/static/dashboard.css">
</head>
<body>
{}
</body>
</html>
"#,
        body
    )
}

fn sidebar(config: &ConnectionConfig, timeout: Duration) -> String {
    format!(
        r#"<aside class="sidebar">
<h3>Connection</h3>
<p class="caption">Point the dashboard at your broker, then fetch one message.</p>
<form method="post" action="/fetch">
<label for="broker">Broker</label>
<input id="broker" name="broker" type="text" value="{broker}" title="Broker host name or address">
<label for="port">Port</label>
<input id="port" name="port" type="number" min="1" max="65535" value="{port}" title="Usually 1883">
<label for="topic">Topic</label>
<input id="topic" name="topic" type="text" value="{topic}" title="Topic to subscribe to">
<label for="client_id">Client ID</label>
<input id="client_id" name="client_id" type="text" value="{client_id}" title="Identifier for this connection">
<button type="submit">Fetch sensor data</button>
</form>
<p class="caption">Each fetch opens a new connection and waits up to {secs} s for one message.</p>
</aside>"#,
        broker = escape_html(&config.broker),
        port = config.port,
        topic = escape_html(&config.topic),
        client_id = escape_html(&config.client_id),
        secs = timeout.as_secs(),
    )
}

fn header(session: &SessionState) -> String {
    let status = match &session.last_update {
        Some(ts) => format!(
            r#"<div class="banner banner-ok">Last update: {}</div>"#,
            escape_html(ts)
        ),
        None => r#"<div class="banner banner-info">No data received yet</div>"#.to_string(),
    };
    format!(
        r#"<header class="top">
<div class="card">
<h1>SensorPeek</h1>
<p class="caption">Pull one MQTT message on demand and view it as metrics or text.</p>
</div>
<div class="card card-soft">
<h4>Session</h4>
{}
</div>
</header>"#,
        status
    )
}

fn help_panel() -> String {
    let brokers: String = PUBLIC_TEST_BROKERS
        .iter()
        .map(|b| format!("<li><code>{}</code></li>", b))
        .collect();
    format!(
        r#"<details class="card">
<summary>How to use this dashboard</summary>
<ol>
<li><strong>Broker</strong>: address of the MQTT server.</li>
<li><strong>Port</strong>: usually <code>1883</code> for plain connections.</li>
<li><strong>Topic</strong>: the topic to listen on, e.g. <code>Sensor/THP2</code>.</li>
<li><strong>Client ID</strong>: identifier for this connection.</li>
<li>Press <strong>Fetch sensor data</strong> to read the next message.</li>
</ol>
<p>Public brokers for quick tests:</p>
<ul>{}</ul>
</details>"#,
        brokers
    )
}

fn results(result: Option<&FetchResult>) -> String {
    let Some(result) = result else {
        return r#"<section class="results"><div class="banner banner-info">Nothing to show yet. Configure the connection in the sidebar and press <strong>Fetch sensor data</strong>.</div></section>"#.to_string();
    };

    let inner = match result {
        FetchResult::Error(err) => format!(
            r#"<div class="banner banner-error">Fetch failed: {}</div>"#,
            escape_html(&err.to_string())
        ),
        FetchResult::Structured(fields) => format!(
            r#"<div class="banner banner-ok">Message received from the broker</div>
<h5>Message metrics</h5>
{}
<details class="card">
<summary>Full JSON</summary>
<pre class="json">{}</pre>
</details>"#,
            metric_grid(fields),
            escape_html(&pretty_json(fields))
        ),
        FetchResult::Text(text) => format!(
            r#"<div class="banner banner-ok">Message received from the broker</div>
<h5>Message (text)</h5>
<pre class="text">{}</pre>"#,
            escape_html(text)
        ),
    };
    format!(r#"<section class="results"><h2>Received data</h2>{}</section>"#, inner)
}

fn metric_grid(fields: &Map<String, Value>) -> String {
    let rows = metric_rows(fields);
    if rows.is_empty() {
        return r#"<p class="caption">The message is an empty JSON object.</p>"#.to_string();
    }
    let mut html = String::new();
    for row in rows {
        html.push_str(r#"<div class="metric-row">"#);
        for metric in row {
            let _ = write!(
                html,
                r#"<div class="metric"><label>{}</label><div class="metric-value">{}</div></div>"#,
                escape_html(&metric.label),
                escape_html(&metric.value)
            );
        }
        html.push_str("</div>");
    }
    html
}

fn pretty_json(fields: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(fields).unwrap_or_else(|_| format!("{:?}", fields))
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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
