//! Self-contained HTML rendering of a dataset profile.

use super::profile::{CorrelationMatrix, DatasetProfile, NumericStats, VariableProfile};

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin:0.5em 0 1.5em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:right}\
th{background:#f2f2f2}td.l,th.l{text-align:left}\
h2{border-bottom:2px solid #444;padding-bottom:4px}";

pub struct HtmlReportGenerator;

impl HtmlReportGenerator {
    pub fn generate(&self, profile: &DatasetProfile) -> String {
        let title = escape(&profile.title);
        let mut html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n"
        );

        // Overview
        let o = &profile.overview;
        html.push_str("<h2>Overview</h2>\n<table>\n");
        row(&mut html, "Rows", &o.rows.to_string());
        row(&mut html, "Columns", &o.columns.to_string());
        row(
            &mut html,
            "Missing cells",
            &format!("{} ({:.1}%)", o.missing_cells, o.missing_pct),
        );
        if let Some(d) = o.duplicate_rows {
            row(&mut html, "Duplicate rows", &d.to_string());
        }
        for (dtype, n) in &o.column_types {
            row(&mut html, &format!("{dtype} columns"), &n.to_string());
        }
        html.push_str("</table>\n");

        html.push_str("<h2>Variables</h2>\n");
        for v in &profile.variables {
            variable(&mut html, v);
        }

        if let Some(m) = &profile.correlations {
            correlations(&mut html, m);
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

/// Escape text for element content and attribute values.
pub fn escape(raw: &str) -> String {
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

fn row(html: &mut String, label: &str, value: &str) {
    html.push_str(&format!(
        "<tr><th class=\"l\">{}</th><td>{}</td></tr>\n",
        escape(label),
        escape(value)
    ));
}

fn num(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.4}"),
        None => "n/a".to_string(),
    }
}

fn variable(html: &mut String, v: &VariableProfile) {
    html.push_str(&format!(
        "<h3>{} <small>({})</small></h3>\n<table>\n",
        escape(&v.name),
        v.dtype
    ));
    row(html, "Count", &v.count.to_string());
    row(html, "Missing", &format!("{} ({:.1}%)", v.missing, v.missing_pct));
    row(html, "Distinct", &v.distinct.to_string());
    if let Some(n) = &v.numeric {
        numeric(html, n);
    }
    html.push_str("</table>\n");

    if let Some(n) = &v.numeric {
        if !n.histogram.is_empty() {
            html.push_str("<table>\n<tr><th>From</th><th>To</th><th>Count</th></tr>\n");
            for b in &n.histogram {
                html.push_str(&format!(
                    "<tr><td>{:.4}</td><td>{:.4}</td><td>{}</td></tr>\n",
                    b.lower, b.upper, b.count
                ));
            }
            html.push_str("</table>\n");
        }
    }

    if !v.top_values.is_empty() {
        html.push_str("<table>\n<tr><th class=\"l\">Value</th><th>Count</th></tr>\n");
        for (value, count) in &v.top_values {
            html.push_str(&format!(
                "<tr><td class=\"l\">{}</td><td>{count}</td></tr>\n",
                escape(value)
            ));
        }
        html.push_str("</table>\n");
    }
}

fn numeric(html: &mut String, n: &NumericStats) {
    row(html, "Mean", &num(n.mean));
    row(html, "Min", &num(n.min));
    row(html, "Max", &num(n.max));
    row(html, "Zeros", &n.zeros.to_string());
    row(html, "Negatives", &n.negatives.to_string());
    if n.q1.is_some() {
        row(html, "Std dev", &num(n.std_dev));
        row(html, "Q1", &num(n.q1));
        row(html, "Median", &num(n.median));
        row(html, "Q3", &num(n.q3));
    }
}

fn correlations(html: &mut String, m: &CorrelationMatrix) {
    html.push_str("<h2>Correlations (Pearson)</h2>\n<table>\n<tr><th></th>");
    for c in &m.columns {
        html.push_str(&format!("<th>{}</th>", escape(c)));
    }
    html.push_str("</tr>\n");
    for (name, values) in m.columns.iter().zip(&m.values) {
        html.push_str(&format!("<tr><th class=\"l\">{}</th>", escape(name)));
        for v in values {
            html.push_str(&format!("<td>{}</td>", num(*v)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::ProfileMode;
    use cryptotrend_core::data::{read_csv_bytes, CsvSchema};

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn renders_sections_for_full_profile() {
        let t = read_csv_bytes("sym,price\n<b>,1.5\nx,2.5\n", CsvSchema::Inferred).unwrap();
        let p = DatasetProfile::build("Crypto & Co", &t, ProfileMode::Full).unwrap();
        let html = HtmlReportGenerator.generate(&p);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Crypto &amp; Co</title>"));
        assert!(html.contains("Duplicate rows"));
        assert!(html.contains("Correlations (Pearson)"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn minimal_profile_omits_correlations() {
        let t = read_csv_bytes("a\n1\n2\n", CsvSchema::Inferred).unwrap();
        let p = DatasetProfile::build("Final", &t, ProfileMode::Minimal).unwrap();
        let html = HtmlReportGenerator.generate(&p);
        assert!(!html.contains("Correlations"));
        assert!(!html.contains("Duplicate rows"));
        assert!(html.contains("Mean"));
    }
}
