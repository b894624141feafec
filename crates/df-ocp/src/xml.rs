//! Model description XML loading.
//!
//! Reads an FMI 1.0 style `fmiModelDescription` carrying JModelica-style
//! equation sections:
//!
//! ```xml
//! <fmiModelDescription modelName="Decay">
//!   <ModelVariables>
//!     <ScalarVariable name="x"><Real start="1.0"/></ScalarVariable>
//!   </ModelVariables>
//!   <equ:DynamicEquations>
//!     <equ:Equation>
//!       <exp:Sub>
//!         <exp:Der><exp:Identifier><exp:QualifiedNamePart name="x"/></exp:Identifier></exp:Der>
//!         <exp:Neg><exp:Identifier><exp:QualifiedNamePart name="x"/></exp:Identifier></exp:Neg>
//!       </exp:Sub>
//!     </equ:Equation>
//!   </equ:DynamicEquations>
//! </fmiModelDescription>
//! ```
//!
//! Namespace prefixes are ignored. Variables marked `alias="alias"` or
//! `alias="negatedAlias"` are not declared; every reference to one is
//! rewritten to the `noAlias` variable with the same `valueReference`
//! (negated for `negatedAlias`).

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{OcpError, OcpResult};
use crate::expr::{Expr, UnaryFn};
use crate::ocp::{DeclaredVariable, SymbolicOcp, VariableKind};

/// Load a model description from disk.
pub fn load(path: &Path) -> OcpResult<SymbolicOcp> {
    let content = std::fs::read_to_string(path).map_err(|source| OcpError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ocp = parse_str(&content)?;
    debug!(
        path = %path.display(),
        model = ocp.name(),
        states = ocp.xd().len(),
        algebraic = ocp.z().len(),
        parameters = ocp.p().len(),
        "loaded model description"
    );
    Ok(ocp)
}

/// Parse a model description held in memory.
pub fn parse_str(xml: &str) -> OcpResult<SymbolicOcp> {
    let root = read_tree(xml)?;
    if root.name != "fmiModelDescription" {
        return Err(OcpError::schema(format!(
            "expected root element fmiModelDescription, found {}",
            root.name
        )));
    }
    let model_name = root
        .attr("modelName")
        .ok_or_else(|| OcpError::schema("fmiModelDescription has no modelName"))?
        .to_string();

    let model_variables = root.child("ModelVariables");
    let aliases = Aliases::collect(model_variables)?;
    let mut variables = Vec::new();
    if let Some(section) = model_variables {
        for sv in section.children_named("ScalarVariable") {
            if let Some(var) = parse_scalar_variable(sv)? {
                variables.push(var);
            }
        }
    }

    let mut bindings = Vec::new();
    if let Some(section) = root.child("BindingEquations") {
        for be in section.children_named("BindingEquation") {
            let target = be
                .child("Parameter")
                .ok_or_else(|| OcpError::schema("BindingEquation without Parameter"))?;
            let name = aliases.binding_target(qualified_name(target)?)?;
            let exp = be
                .child("BindingExp")
                .ok_or_else(|| OcpError::schema(format!("binding of '{}' without BindingExp", name)))?;
            bindings.push((name, parse_expr(single_child(exp)?, &aliases)?));
        }
    }

    let mut dae = Vec::new();
    if let Some(section) = root.child("DynamicEquations") {
        for eq in section.children_named("Equation") {
            dae.push(parse_expr(single_child(eq)?, &aliases)?);
        }
    }

    SymbolicOcp::new(model_name, variables, bindings, dae)
}

/// Minimal element tree; the documents are small.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn local_name(raw: &[u8]) -> String {
    let full = String::from_utf8_lossy(raw);
    match full.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => full.into_owned(),
    }
}

fn xml_error(position: u64, err: impl Display) -> OcpError {
    OcpError::Xml {
        position,
        message: err.to_string(),
    }
}

fn open_element(start: &BytesStart<'_>, position: u64) -> OcpResult<Element> {
    let mut element = Element {
        name: local_name(start.name().as_ref()),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(position, e))?;
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(position, e))?
            .into_owned();
        element.attrs.push((local_name(attr.key.as_ref()), value));
    }
    Ok(element)
}

fn read_tree(xml: &str) -> OcpResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(xml_error(position, e)),
        };
        match event {
            Event::Start(start) => stack.push(open_element(&start, position)?),
            Event::Empty(start) => {
                let element = open_element(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error(position, "unbalanced closing tag"))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| xml_error(position, e))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_error(
            reader.buffer_position() as u64,
            "document ended inside an element",
        ));
    }
    root.ok_or_else(|| OcpError::schema("empty document"))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> OcpResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error(position, "multiple root elements")),
    }
    Ok(())
}

/// `Some(negated)` for alias variables, `None` for ordinary ones.
fn alias_kind(sv: &Element, name: &str) -> OcpResult<Option<bool>> {
    match sv.attr("alias") {
        None | Some("noAlias") => Ok(None),
        Some("alias") => Ok(Some(false)),
        Some("negatedAlias") => Ok(Some(true)),
        Some(other) => Err(OcpError::schema(format!(
            "variable '{}' has unknown alias kind '{}'",
            name, other
        ))),
    }
}

/// Alias name -> (variable it stands for, negated).
#[derive(Debug, Default)]
struct Aliases(HashMap<String, (String, bool)>);

impl Aliases {
    fn collect(section: Option<&Element>) -> OcpResult<Self> {
        let Some(section) = section else {
            return Ok(Self::default());
        };
        let mut by_reference: HashMap<&str, &str> = HashMap::new();
        let mut pending = Vec::new();
        for sv in section.children_named("ScalarVariable") {
            let name = sv
                .attr("name")
                .ok_or_else(|| OcpError::schema("ScalarVariable without name"))?;
            let reference = sv.attr("valueReference");
            match alias_kind(sv, name)? {
                None => {
                    if let Some(vr) = reference {
                        by_reference.insert(vr, name);
                    }
                }
                Some(negated) => {
                    let vr = reference.ok_or_else(|| {
                        OcpError::schema(format!("alias variable '{}' has no valueReference", name))
                    })?;
                    pending.push((name, vr, negated));
                }
            }
        }

        let mut map = HashMap::new();
        for (name, vr, negated) in pending {
            let base = by_reference.get(vr).ok_or_else(|| {
                OcpError::schema(format!(
                    "alias variable '{}' refers to valueReference {} with no aliased variable",
                    name, vr
                ))
            })?;
            map.insert(name.to_string(), (base.to_string(), negated));
        }
        Ok(Self(map))
    }

    /// `name` itself, or the variable it aliases with the sign applied.
    fn reference(&self, name: String, derivative: bool) -> Expr {
        let Some((base, negated)) = self.0.get(&name) else {
            return if derivative {
                Expr::der(name)
            } else {
                Expr::var(name)
            };
        };
        let inner = base.strip_prefix("der(").and_then(|b| b.strip_suffix(')'));
        let expr = match (derivative, inner) {
            (false, Some(state)) => Expr::der(state),
            (false, None) => Expr::var(base.clone()),
            (true, _) => Expr::der(base.clone()),
        };
        if *negated {
            Expr::Neg(Box::new(expr))
        } else {
            expr
        }
    }

    fn binding_target(&self, name: String) -> OcpResult<String> {
        match self.0.get(&name) {
            None => Ok(name),
            Some((base, false)) => Ok(base.clone()),
            Some((_, true)) => Err(OcpError::schema(format!(
                "binding equation targets negated alias '{}'",
                name
            ))),
        }
    }
}

fn parse_scalar_variable(sv: &Element) -> OcpResult<Option<DeclaredVariable>> {
    let name = sv
        .attr("name")
        .ok_or_else(|| OcpError::schema("ScalarVariable without name"))?
        .to_string();
    if alias_kind(sv, &name)?.is_some() {
        return Ok(None);
    }

    let category = sv.child("VariableCategory").map(|c| c.text.trim());
    let kind = match category {
        Some("derivative") => return Ok(None),
        Some("state") => Some(VariableKind::State),
        Some("algebraic") => Some(VariableKind::Algebraic),
        Some("independentParameter") => Some(VariableKind::Parameter),
        Some("dependentParameter") => Some(VariableKind::DependentParameter),
        Some("independentConstant") | Some("dependentConstant") => Some(VariableKind::Constant),
        Some(other) => {
            return Err(OcpError::schema(format!(
                "variable '{}' has unknown category '{}'",
                name, other
            )));
        }
        None => match (sv.attr("variability"), sv.attr("causality")) {
            (Some("parameter"), _) => Some(VariableKind::Parameter),
            (Some("constant"), _) => Some(VariableKind::Constant),
            (_, Some("input")) => Some(VariableKind::Input),
            _ => None,
        },
    };

    let typed = sv
        .children
        .iter()
        .find(|c| matches!(c.name.as_str(), "Real" | "Integer" | "Boolean"));
    let (start, unit) = match typed {
        Some(t) => {
            let start = match t.attr("start") {
                Some(raw) if t.name == "Boolean" => Some(parse_bool(raw)?),
                Some(raw) => Some(parse_number(raw, &name)?),
                None => None,
            };
            (start, t.attr("unit").map(str::to_string))
        }
        None => (None, None),
    };

    Ok(Some(DeclaredVariable {
        name,
        kind,
        start,
        unit,
        description: sv.attr("description").map(str::to_string),
    }))
}

fn parse_number(raw: &str, what: &str) -> OcpResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| OcpError::schema(format!("invalid number '{}' for {}", raw, what)))
}

fn parse_bool(raw: &str) -> OcpResult<f64> {
    match raw.trim() {
        "true" => Ok(1.0),
        "false" => Ok(0.0),
        other => Err(OcpError::schema(format!("invalid boolean '{}'", other))),
    }
}

fn single_child(element: &Element) -> OcpResult<&Element> {
    match element.children.as_slice() {
        [only] => Ok(only),
        children => Err(OcpError::schema(format!(
            "{} must contain exactly one expression, found {}",
            element.name,
            children.len()
        ))),
    }
}

fn two_children(element: &Element) -> OcpResult<(&Element, &Element)> {
    match element.children.as_slice() {
        [a, b] => Ok((a, b)),
        children => Err(OcpError::schema(format!(
            "{} expects two operands, found {}",
            element.name,
            children.len()
        ))),
    }
}

/// Dotted name from `QualifiedNamePart` children, directly or inside an `Identifier`.
fn qualified_name(element: &Element) -> OcpResult<String> {
    let holder = element.child("Identifier").unwrap_or(element);
    let mut parts = Vec::new();
    for part in &holder.children {
        if part.name != "QualifiedNamePart" {
            return Err(OcpError::schema(format!(
                "unexpected {} inside identifier",
                part.name
            )));
        }
        if !part.children.is_empty() {
            return Err(OcpError::schema("array subscripts are not supported"));
        }
        let name = part
            .attr("name")
            .ok_or_else(|| OcpError::schema("QualifiedNamePart without name"))?;
        parts.push(name);
    }
    if parts.is_empty() {
        return Err(OcpError::schema(format!("{} without a name", element.name)));
    }
    Ok(parts.join("."))
}

fn parse_expr(element: &Element, aliases: &Aliases) -> OcpResult<Expr> {
    let binary = |make: fn(Box<Expr>, Box<Expr>) -> Expr| -> OcpResult<Expr> {
        let (a, b) = two_children(element)?;
        Ok(make(
            Box::new(parse_expr(a, aliases)?),
            Box::new(parse_expr(b, aliases)?),
        ))
    };

    match element.name.as_str() {
        "RealLiteral" | "IntegerLiteral" => {
            Ok(Expr::Const(parse_number(&element.text, "literal")?))
        }
        "BooleanLiteral" => Ok(Expr::Const(parse_bool(&element.text)?)),
        "Time" => Ok(Expr::time()),
        "Identifier" => Ok(aliases.reference(qualified_name(element)?, false)),
        "Der" => Ok(aliases.reference(qualified_name(single_child(element)?)?, true)),
        "Add" => binary(Expr::Add),
        "Sub" => binary(Expr::Sub),
        "Mul" => binary(Expr::Mul),
        "Div" => binary(Expr::Div),
        "Pow" => binary(Expr::Pow),
        "Neg" => Ok(Expr::Neg(Box::new(parse_expr(
            single_child(element)?,
            aliases,
        )?))),
        other => match UnaryFn::from_element(other) {
            Some(func) => Ok(Expr::Call(
                func,
                Box::new(parse_expr(single_child(element)?, aliases)?),
            )),
            None => Err(OcpError::schema(format!(
                "unsupported expression element '{}'",
                other
            ))),
        },
    }
}
