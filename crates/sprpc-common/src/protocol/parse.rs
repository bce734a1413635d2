//! XML-RPC response parsing.
//!
//! The document is first read into a small element tree with `quick_xml`,
//! then walked according to the `<methodResponse>` grammar.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::NaiveDateTime;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::protocol::error::{Result, SprpcError};
use crate::protocol::fault::Fault;
use crate::protocol::format::DATE_TIME_FORMAT;
use crate::protocol::schema::{self, Schema};
use crate::protocol::value::{Members, MethodResponse, Value};

#[derive(Debug, Default)]
struct Element {
    name: String,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Zero or one child with this name; more than one is malformed.
    fn child(&self, name: &str) -> Result<Option<&Element>> {
        let mut matches = self.children.iter().filter(|child| child.name == name);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(SprpcError::InvalidResponse(format!(
                "<{}> has more than one <{}>",
                self.name, name
            )));
        }
        Ok(first)
    }

    fn required_child(&self, name: &str) -> Result<&Element> {
        self.child(name)?.ok_or_else(|| {
            SprpcError::InvalidResponse(format!("<{}> is missing <{}>", self.name, name))
        })
    }
}

/// Parses a `<methodResponse>` document into a value or a fault.
pub fn parse_method_response(input: &str) -> Result<MethodResponse> {
    let document = read_document(input)?;
    let response = document.required_child("methodResponse")?;

    match (response.child("fault")?, response.child("params")?) {
        (Some(fault), None) => Ok(MethodResponse::Fault(parse_fault(fault)?)),
        (None, Some(params)) => Ok(MethodResponse::Success(parse_params(params)?)),
        (Some(_), Some(_)) => Err(SprpcError::InvalidResponse(
            "<methodResponse> has both <fault> and <params>".into(),
        )),
        (None, None) => Err(SprpcError::InvalidResponse(
            "<methodResponse> has neither <fault> nor <params>".into(),
        )),
    }
}

fn parse_fault(node: &Element) -> Result<Fault> {
    let value = parse_value(node.required_child("value")?)?;
    fault_schema().decode(&value)
}

fn fault_schema() -> Schema<Fault> {
    schema::record(|members| {
        Ok(Fault::new(
            i64::from(members.field("faultCode", &schema::i4())?),
            members.field("faultString", &schema::string())?,
        ))
    })
}

fn parse_params(node: &Element) -> Result<Value> {
    let param = node.required_child("param")?;
    parse_value(param.required_child("value")?)
}

fn parse_value(node: &Element) -> Result<Value> {
    let Some(inner) = node.children.first() else {
        // A bare <value>text</value> is a string.
        return Ok(Value::Str(node.text.clone()));
    };

    match inner.name.as_str() {
        "i4" | "int" => {
            let text = inner.text.trim();
            let parsed = text
                .parse::<i64>()
                .map_err(|_| SprpcError::InvalidResponse(format!("invalid integer: \"{}\"", text)))?;
            Value::int(parsed)
        }
        "boolean" => match inner.text.trim() {
            "1" => Ok(Value::Boolean(true)),
            "0" => Ok(Value::Boolean(false)),
            other => Err(SprpcError::InvalidResponse(format!(
                "invalid boolean: \"{}\"",
                other
            ))),
        },
        "string" => Ok(Value::Str(inner.text.clone())),
        "double" => {
            let text = inner.text.trim();
            text.parse::<f64>()
                .map(Value::Double)
                .map_err(|_| SprpcError::InvalidResponse(format!("invalid double: \"{}\"", text)))
        }
        "dateTime.iso8601" => parse_date_time(inner.text.trim()).map(Value::DateTime),
        "base64" => {
            let compact: String = inner.text.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(Value::Bytes(Bytes::from(STANDARD.decode(compact)?)))
        }
        "struct" => parse_struct(inner),
        "array" => parse_array(inner),
        other => Err(SprpcError::UnknownNodeType(other.to_owned())),
    }
}

/// Parses the compact `YYYYMMDDTHH:MM:SS` layout; anything else is rejected.
pub fn parse_date_time(input: &str) -> Result<NaiveDateTime> {
    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 => *b == b'T',
            11 | 14 => *b == b':',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(SprpcError::InvalidDateTime(input.to_owned()));
    }
    Ok(NaiveDateTime::parse_from_str(input, DATE_TIME_FORMAT)?)
}

fn parse_struct(node: &Element) -> Result<Value> {
    let mut members = Members::new();
    for member in node.children_named("member") {
        let name = member.required_child("name")?.text.clone();
        let value = parse_value(member.required_child("value")?)?;
        if members.insert(name.clone(), value).is_some() {
            return Err(SprpcError::InvalidResponse(format!(
                "duplicate struct member \"{}\"",
                name
            )));
        }
    }
    Ok(Value::Struct(members))
}

fn parse_array(node: &Element) -> Result<Value> {
    let data = node.required_child("data")?;
    data.children_named("value")
        .map(parse_value)
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn read_document(input: &str) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8(start.name().as_ref().to_vec())?;
                stack.push(Element::new(name));
            }
            Event::Empty(empty) => {
                let name = String::from_utf8(empty.name().as_ref().to_vec())?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Element::new(name));
                }
            }
            Event::End(_) => {
                // The root placeholder is never popped.
                if stack.len() < 2 {
                    return Err(SprpcError::InvalidResponse("unbalanced end tag".into()));
                }
                if let (Some(element), Some(parent)) = (stack.pop(), stack.last_mut()) {
                    parent.children.push(element);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8(cdata.into_inner().into_owned())?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(SprpcError::InvalidResponse("unclosed element".into())),
    }
}
