use std::fmt::Write;

use super::format::{escape_html, format_cell};
use super::template::{RowTemplate, TemplateRow};
use crate::reshape::PivotMatrix;
use crate::types::Month;

const STYLE: &str = "<style>
table { width: 100%; border-collapse: collapse; font-size: 14px; }
th, td { border: 1px solid #ddd; padding: 6px; text-align: right; }
th { background-color: #f0f0f0; position: sticky; top: 0; z-index: 1; }
.section { background-color: #dce6f1; font-weight: bold; text-align: left; }
.label { text-align: left; }
</style>
";

/// The secondary table slotted in at the template's drill-down anchor.
#[derive(Debug, Clone, Copy)]
pub struct Drilldown<'a> {
    /// Caption of the collapsible block
    pub title: &'a str,
    /// Heading of the label column
    pub label_header: &'a str,
    /// Already ranked
    pub matrix: &'a PivotMatrix,
}

fn header_row(out: &mut String, label_header: &str, months: &[Month]) {
    let _ = write!(out, "<tr><th class=\"label\">{}</th>", escape_html(label_header));
    for m in months {
        let _ = write!(out, "<th>{}</th>", m.label());
    }
    out.push_str("</tr>\n");
}

fn data_row(out: &mut String, label: &str, cells: impl Iterator<Item = Option<f64>>) {
    let _ = write!(out, "<tr><td class=\"label\">{}</td>", escape_html(label));
    for cell in cells {
        let _ = write!(out, "<td>{}</td>", format_cell(cell));
    }
    out.push_str("</tr>\n");
}

fn open_table(out: &mut String, months: &[Month]) {
    out.push_str("<table>\n");
    header_row(out, "Category", months);
}

/// Walk `template` over `matrix`. The table is split at the first drill-down
/// anchor so the breakdown can sit between the halves; later anchors and any
/// anchor without a breakdown are skipped.
pub fn render_statement(
    matrix: &PivotMatrix,
    template: &RowTemplate,
    drilldown: Option<&Drilldown<'_>>,
) -> String {
    let months: Vec<Month> = matrix.months().collect();
    let mut out = String::new();
    let mut drilled = false;

    open_table(&mut out, &months);
    for row in template.rows() {
        match row {
            TemplateRow::Section { label } => {
                let _ = writeln!(
                    out,
                    "<tr><td class=\"section\" colspan=\"{}\">{}</td></tr>",
                    months.len() + 1,
                    escape_html(label)
                );
            }
            TemplateRow::Data { label } => {
                let cells = months.iter().map(|&m| matrix.get(label, m));
                data_row(&mut out, label, cells);
            }
            TemplateRow::Drilldown => {
                if drilled {
                    continue;
                }
                let Some(drill) = drilldown else { continue };
                drilled = true;
                out.push_str("</table>\n");
                let _ = writeln!(
                    out,
                    "<details>\n<summary>{}</summary>",
                    escape_html(drill.title)
                );
                out.push_str(&render_breakdown(drill.label_header, drill.matrix));
                out.push_str("</details>\n");
                open_table(&mut out, &months);
            }
        }
    }
    out.push_str("</table>\n");
    out
}

/// Every row of `matrix` in its current order, against its own months.
pub fn render_breakdown(label_header: &str, matrix: &PivotMatrix) -> String {
    let months: Vec<Month> = matrix.months().collect();
    let mut out = String::from("<table>\n");
    header_row(&mut out, label_header, &months);
    for row in matrix.rows() {
        data_row(&mut out, &row.label, months.iter().map(|&m| row.get(m)));
    }
    out.push_str("</table>\n");
    out
}

/// Wrap rendered tables with the stylesheet, a title, caption and footer.
pub fn render_page(title: &str, caption: &str, body: &str, footer: &str) -> String {
    let mut out = String::from(STYLE);
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(title));
    let _ = writeln!(out, "<p><strong>{}</strong></p>", escape_html(caption));
    out.push_str(body);
    let _ = writeln!(out, "<hr>\n<p class=\"caption\">{}</p>", escape_html(footer));
    out
}
