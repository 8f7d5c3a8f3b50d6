//! A thin reader for the subset of XMILE this crate needs to exercise
//! a compiled model end to end: `<sim_specs>`, one or more `<model>`
//! blocks of `<stock|flow|aux|module>` variables, `<gf>` tables, and
//! `<connect>` aliases. Units, arrays, macros, and subscripts are
//! unhandled - a file using them loads with those variables simply
//! missing their finer structure, not a hard failure.

mod tree;

use sdsim_common::{Diagnostic, ErrorCode, Span};
use sdsim_project::{Connect, File, Model, Project, SimSpec, Table, Var, VarKind};

use tree::XmlNode;

fn bad_xml(reason: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorCode::BadXml, reason, Span::empty())
}

fn parse_f64(text: &str, field: &str) -> Result<f64, Diagnostic> {
    text.trim()
        .parse()
        .map_err(|_| bad_xml(format!("`{}` is not a number: `{}`", field, text)))
}

/// Parses `xml` as a single XMILE document and returns the `Project`
/// it describes. A document may hold more than one `<model>`; the
/// first is the root model other operations default to.
pub fn load(xml: &str) -> Result<Project, Diagnostic> {
    let root = tree::parse_tree(xml)?;
    if root.name != "xmile" {
        return Err(bad_xml(format!("expected an `<xmile>` root element, found `<{}>`", root.name)));
    }

    let header = root
        .child("header")
        .and_then(|h| h.text_of("name"))
        .unwrap_or_default()
        .to_string();

    let sim_specs = sim_specs_from_node(root.child("sim_specs").ok_or_else(|| bad_xml("missing <sim_specs>"))?)?;

    let models: Vec<Model> = root
        .children
        .iter()
        .filter(|c| c.name == "model")
        .map(model_from_node)
        .collect::<Result<_, _>>()?;

    if models.is_empty() {
        return Err(bad_xml("document has no <model>"));
    }

    log::debug!("loaded {} model(s) from XMILE document", models.len());

    Ok(Project::new(vec![File { header, sim_specs, models }]))
}

fn sim_specs_from_node(node: &XmlNode) -> Result<SimSpec, Diagnostic> {
    let start = node.text_of("start").map(|s| parse_f64(s, "start")).transpose()?.unwrap_or(0.0);
    let stop = node.text_of("stop").map(|s| parse_f64(s, "stop")).transpose()?.unwrap_or(0.0);

    let mut dt = node.text_of("dt").map(|s| parse_f64(s, "dt")).transpose()?.unwrap_or(1.0);
    if node.child("dt").and_then(|d| d.attr("reciprocal")) == Some("true") {
        dt = 1.0 / dt;
    }

    let savestep = node
        .text_of("savestep")
        .or_else(|| node.text_of("save_step"))
        .map(|s| parse_f64(s, "savestep"))
        .transpose()?
        .unwrap_or(dt);

    let method = node.attr("method").unwrap_or("euler").to_string();
    let time_units = node.attr("time_units").unwrap_or_default().to_string();

    Ok(SimSpec { start, stop, dt, savestep, method, time_units })
}

/// A pure, total, idempotent mapping from a display name - possibly
/// mixed-case, possibly containing spaces, as XMILE tools write them
/// into `name` attributes - to the canonical identifier equations and
/// cross-references compare by. The lexer already lower-cases whole
/// equation sources, so this only needs to match that and fold
/// whitespace the way a display name's words become one identifier.
fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

fn model_from_node(node: &XmlNode) -> Result<Model, Diagnostic> {
    let name = canonicalize(node.attr("name").unwrap_or_default());
    let vars = match node.child("variables") {
        Some(variables) => variables
            .children
            .iter()
            .filter_map(|child| var_from_node(child).transpose())
            .collect::<Result<_, _>>()?,
        None => vec![],
    };
    Ok(Model { name, vars })
}

/// Returns `Ok(None)` for an element that isn't a recognized variable
/// kind rather than failing the whole document, matching the original
/// loader's "skip what it doesn't understand" behavior.
fn var_from_node(node: &XmlNode) -> Result<Option<Var>, Diagnostic> {
    let kind = match node.name.as_str() {
        "stock" => VarKind::Stock,
        "flow" => VarKind::Flow,
        "aux" => VarKind::Aux,
        "module" => VarKind::Module,
        _ => return Ok(None),
    };

    let name = canonicalize(node.attr("name").unwrap_or_default());
    let mut var = Var::new(kind, name);
    var.eqn = node.text_of("eqn").map(str::to_string);
    var.is_nonneg = node.child("non_negative").is_some();

    for child in &node.children {
        match child.name.as_str() {
            "inflow" if !child.text.is_empty() => var.inflows.push(canonicalize(&child.text)),
            "outflow" if !child.text.is_empty() => var.outflows.push(canonicalize(&child.text)),
            "gf" => var.gf = Some(table_from_node(child)?),
            "connect" => {
                let from = child.attr("from").ok_or_else(|| bad_xml("<connect> missing `from`"))?;
                let to = child.attr("to").ok_or_else(|| bad_xml("<connect> missing `to`"))?;
                var.connects.push(Connect { name: canonicalize(to), src: canonicalize(from) });
            }
            _ => {}
        }
    }

    Ok(Some(var))
}

fn table_from_node(node: &XmlNode) -> Result<Table, Diagnostic> {
    let ypts = node.text_of("ypts").ok_or_else(|| bad_xml("<gf> missing <ypts>"))?;
    let y: Vec<f64> = ypts
        .split(',')
        .map(|s| parse_f64(s, "ypts"))
        .collect::<Result<_, _>>()?;

    if let Some(xpts) = node.text_of("xpts") {
        let x: Vec<f64> = xpts
            .split(',')
            .map(|s| parse_f64(s, "xpts"))
            .collect::<Result<_, _>>()?;
        return Ok(Table::new(x, y));
    }

    let xscale = node.child("xscale").ok_or_else(|| bad_xml("<gf> has neither <xpts> nor <xscale>"))?;
    let xmin = xscale.attr("min").map(|s| parse_f64(s, "xscale.min")).transpose()?.unwrap_or(0.0);
    let xmax = xscale.attr("max").map(|s| parse_f64(s, "xscale.max")).transpose()?.unwrap_or(0.0);
    Ok(Table::from_evenly_spaced(xmin, xmax, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <xmile>
          <header><name>Net Births</name></header>
          <sim_specs method="euler" time_units="months">
            <start>0</start>
            <stop>10</stop>
            <dt>1</dt>
          </sim_specs>
          <model>
            <variables>
              <stock name="population">
                <eqn>100</eqn>
                <inflow>births</inflow>
              </stock>
              <flow name="births">
                <eqn>population * 0.1</eqn>
              </flow>
            </variables>
          </model>
        </xmile>
    "#;

    #[test]
    fn loads_sim_specs_and_vars() {
        let project = load(DOC).expect("well-formed document should load");
        let file = &project.files[0];
        assert_eq!(file.header, "Net Births");
        assert_eq!(file.sim_specs.start, 0.0);
        assert_eq!(file.sim_specs.stop, 10.0);
        assert_eq!(file.sim_specs.dt, 1.0);
        assert_eq!(file.sim_specs.savestep, 1.0);

        let model = &file.models[0];
        assert_eq!(model.vars.len(), 2);
        let stock = model.vars.iter().find(|v| v.name == "population").unwrap();
        assert_eq!(stock.kind, VarKind::Stock);
        assert_eq!(stock.eqn.as_deref(), Some("100"));
        assert_eq!(stock.inflows, vec!["births".to_string()]);
    }

    #[test]
    fn reciprocal_dt_is_inverted() {
        let doc = r#"<xmile><sim_specs><start>0</start><stop>1</stop>
            <dt reciprocal="true">4</dt></sim_specs><model><variables/></model></xmile>"#;
        let project = load(doc).unwrap();
        assert_eq!(project.files[0].sim_specs.dt, 0.25);
    }

    #[test]
    fn missing_sim_specs_is_bad_xml() {
        let err = load("<xmile><model><variables/></model></xmile>").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadXml);
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = load("<xmile><sim_specs></xmile>").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadXml);
    }

    #[test]
    fn gf_with_xscale_spreads_evenly() {
        let doc = r#"<xmile><sim_specs><start>0</start><stop>1</stop><dt>1</dt></sim_specs>
            <model><variables>
              <aux name="f">
                <eqn>0</eqn>
                <gf><ypts>0,1,4</ypts><xscale min="0" max="2"/></gf>
              </aux>
            </variables></model></xmile>"#;
        let project = load(doc).unwrap();
        let var = &project.files[0].models[0].vars[0];
        let table = var.gf.as_ref().unwrap();
        assert_eq!(table.lookup(1.0), 1.0);
    }
}
