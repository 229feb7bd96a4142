// src/charts.rs
//
// Standalone interactive chart documents. The projection JSON is embedded
// into an HTML page that renders with Plotly from CDN; the charting
// library itself does all the drawing.
use eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{NetworkGraph, Report, TransactionTimeline};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.32.0.min.js";

fn page(title: &str, body_script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
<style>body {{ font-family: sans-serif; margin: 0; }} #chart {{ width: 100vw; height: 100vh; }}</style>
</head>
<body>
<div id="chart"></div>
<script>
{script}
</script>
</body>
</html>
"#,
        title = title,
        cdn = PLOTLY_CDN,
        script = body_script
    )
}

const CLASS_COLORS: &str = r#"const classColors = {
  primary: '#1E3A8A',
  positive: '#22C55E',
  negative: '#EF4444',
  neutral: '#9CA3AF'
};"#;

/// Force-directed-style network view: the seed sits at the center with
/// related addresses on a ring, edge width following aggregated weight.
pub fn network_graph_html(graph: &NetworkGraph) -> Result<String> {
    let data = serde_json::to_string(graph)?;
    let script = format!(
        r#"const graph = {data};
{colors}
const related = graph.nodes.filter(n => n.id !== graph.main_address);
const pos = {{ [graph.main_address]: [0, 0] }};
related.forEach((n, i) => {{
  const angle = 2 * Math.PI * i / Math.max(1, related.length);
  pos[n.id] = [Math.cos(angle), Math.sin(angle)];
}});
const edgeX = [], edgeY = [];
graph.edges.forEach(e => {{
  if (pos[e.source] && pos[e.target]) {{
    edgeX.push(pos[e.source][0], pos[e.target][0], null);
    edgeY.push(pos[e.source][1], pos[e.target][1], null);
  }}
}});
const edgeTrace = {{
  x: edgeX, y: edgeY, mode: 'lines',
  line: {{ width: 1.5, color: 'rgba(128,128,128,0.3)' }},
  hoverinfo: 'none'
}};
const nodeTrace = {{
  x: graph.nodes.map(n => pos[n.id][0]),
  y: graph.nodes.map(n => pos[n.id][1]),
  mode: 'markers+text',
  text: graph.nodes.map(n => n.label),
  textposition: 'top center',
  hovertext: graph.nodes.map(n => n.id + '<br>transactions: ' + n.transaction_count),
  hoverinfo: 'text',
  marker: {{
    size: graph.nodes.map(n => n.size),
    sizemode: 'diameter',
    color: graph.nodes.map(n => classColors[n.class]),
    line: {{ width: 2, color: 'white' }}
  }}
}};
Plotly.newPlot('chart', [edgeTrace, nodeTrace], {{
  title: 'Bitcoin Address Network: ' + graph.main_address,
  showlegend: false,
  xaxis: {{ visible: false }},
  yaxis: {{ visible: false }},
  template: 'plotly_white'
}});"#,
        data = data,
        colors = CLASS_COLORS
    );
    Ok(page("Bitcoin Address Network", &script))
}

/// Timeline view: per-transaction net amounts plus the running cumulative
/// balance of the seed address.
pub fn timeline_html(timeline: &TransactionTimeline) -> Result<String> {
    let data = serde_json::to_string(timeline)?;
    let script = format!(
        r#"const timeline = {data};
const dates = timeline.points.map(p => p.date);
const amounts = {{
  x: dates,
  y: timeline.points.map(p => Number(p.net_amount_btc)),
  mode: 'markers',
  name: 'Net amount (BTC)',
  marker: {{
    size: 8,
    color: timeline.points.map(p => p.direction === 'Received' ? '#22C55E' : '#EF4444')
  }}
}};
const balance = {{
  x: dates,
  y: timeline.points.map(p => Number(p.cumulative_balance_btc)),
  mode: 'lines+markers',
  name: 'Cumulative balance (BTC)',
  line: {{ width: 2, color: '#1E3A8A' }}
}};
Plotly.newPlot('chart', [amounts, balance], {{
  title: 'Transaction Timeline: ' + timeline.address,
  xaxis: {{ title: 'Date' }},
  yaxis: {{ title: 'BTC' }},
  hovermode: 'closest',
  template: 'plotly_white'
}});"#,
        data = data
    );
    Ok(page("Bitcoin Transaction Timeline", &script))
}

/// Write both chart documents next to the JSON report
pub fn write_charts(dir: &str, report: &Report) -> Result<Vec<PathBuf>> {
    let prefix: String = report.metadata.address.chars().take(8).collect();
    let mut written = Vec::new();

    let network_path = Path::new(dir).join(format!("network_graph_{}.html", prefix));
    fs::write(&network_path, network_graph_html(&report.network_graph)?)?;
    written.push(network_path);

    let timeline_path = Path::new(dir).join(format!("timeline_{}.html", prefix));
    fs::write(&timeline_path, timeline_html(&report.transaction_timeline)?)?;
    written.push(timeline_path);

    for path in &written {
        info!("Wrote chart {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::report::{network_data, timeline_data};

    #[test]
    fn network_html_embeds_graph_data() {
        let (flows, edges) = aggregate("seedaddr", &[]);
        let graph = network_data(&flows, &edges, "seedaddr");
        let html = network_graph_html(&graph).unwrap();
        assert!(html.contains("seedaddr"));
        assert!(html.contains(PLOTLY_CDN));
    }

    #[test]
    fn timeline_html_renders_empty_timeline() {
        let timeline = timeline_data("seedaddr", &[]);
        let html = timeline_html(&timeline).unwrap();
        assert!(html.contains("Cumulative balance"));
    }
}
