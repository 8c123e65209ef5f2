use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::FactLookup;
use crate::error::LookupError;
use crate::sanitize::escape_literal;

pub const SPARQL_ENDPOINT: &str = "https://dbpedia.org/sparql";
const RESOURCE_PREFIX: &str = "http://dbpedia.org/resource/";
const XML_RESULTS: &str = "application/sparql-results+xml";

/// Asks a SPARQL endpoint for every `?predicate ?object` of the subject's
/// resource and renders each binding as one statement line.
pub struct DbpediaLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl DbpediaLookup {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| LookupError::Request { subject: endpoint.clone(), source })?;
        Ok(DbpediaLookup { client, endpoint })
    }
}

#[async_trait]
impl FactLookup for DbpediaLookup {
    async fn lookup(&self, subject: &str) -> Result<Vec<String>, LookupError> {
        let iri = resource_iri(subject);
        let query = format!("SELECT ?predicate ?object WHERE {{ <{}> ?predicate ?object }}", iri);
        let request_error = |source| LookupError::Request { subject: subject.to_string(), source };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("format", XML_RESULTS)])
            .header(reqwest::header::ACCEPT, XML_RESULTS)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                subject: subject.to_string(),
                status: status.as_u16(),
            });
        }

        let xml = response.text().await.map_err(request_error)?;
        let lines = parse_results(&iri, &xml).map_err(|reason| LookupError::Malformed {
            subject: subject.to_string(),
            reason,
        })?;
        debug!("{} statements for {}", lines.len(), iri);
        Ok(lines)
    }
}

/// Resource IRI for a page label: spaces become underscores, characters an
/// IRI cannot carry are percent-encoded.
pub fn resource_iri(label: &str) -> String {
    let mut iri = String::from(RESOURCE_PREFIX);
    for c in label.trim().chars() {
        match c {
            ' ' => iri.push('_'),
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' => {
                iri.push_str(&format!("%{:02X}", c as u32))
            }
            c if c.is_control() => {
                let mut bytes = [0u8; 4];
                for b in c.encode_utf8(&mut bytes).bytes() {
                    iri.push_str(&format!("%{:02X}", b));
                }
            }
            c => iri.push(c),
        }
    }
    iri
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Uri(String),
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
    Blank,
}

impl Term {
    fn render(&self) -> Option<String> {
        match self {
            Term::Uri(u) => Some(format!("<{}>", u)),
            Term::Literal { value, lang, datatype } => {
                let mut out = format!("\"{}\"", escape_literal(value));
                if let Some(lang) = lang.as_deref().filter(|l| !l.is_empty()) {
                    out.push('@');
                    out.push_str(lang);
                } else if let Some(dt) = datatype {
                    out.push_str("^^<");
                    out.push_str(dt);
                    out.push('>');
                }
                Some(out)
            }
            Term::Blank => None,
        }
    }
}

/// Value element currently being read inside a `<binding>`.
enum Pending {
    Uri,
    Literal { lang: Option<String>, datatype: Option<String> },
    Blank,
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, String> {
    match e.try_get_attribute(name).map_err(|err| err.to_string())? {
        Some(a) => Ok(Some(a.unescape_value().map_err(|err| err.to_string())?.into_owned())),
        None => Ok(None),
    }
}

fn pending_for(e: &BytesStart<'_>) -> Result<Option<Pending>, String> {
    Ok(match e.name().as_ref() {
        b"uri" => Some(Pending::Uri),
        b"literal" => Some(Pending::Literal {
            lang: attr(e, "xml:lang")?,
            datatype: attr(e, "datatype")?,
        }),
        b"bnode" => Some(Pending::Blank),
        _ => None,
    })
}

fn assign(binding: Option<&str>, term: Term, predicate: &mut Option<Term>, object: &mut Option<Term>) {
    match binding {
        Some("predicate") => *predicate = Some(term),
        Some("object") => *object = Some(term),
        _ => {}
    }
}

fn finish(pending: Pending, text: String) -> Term {
    match pending {
        Pending::Uri => Term::Uri(text),
        Pending::Literal { lang, datatype } => Term::Literal { value: text, lang, datatype },
        Pending::Blank => Term::Blank,
    }
}

/// Parse a SPARQL XML result set of `?predicate ?object` rows into
/// statement lines about `subject`. Rows with a blank-node term are skipped.
fn parse_results(subject: &str, xml: &str) -> Result<Vec<String>, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    let mut saw_results = false;
    let mut binding: Option<String> = None;
    let mut pending: Option<Pending> = None;
    let mut text = String::new();
    let mut predicate: Option<Term> = None;
    let mut object: Option<Term> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"results" => saw_results = true,
                b"result" => {
                    predicate = None;
                    object = None;
                }
                b"binding" => binding = attr(&e, "name")?,
                _ if binding.is_some() => {
                    pending = pending_for(&e)?;
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if binding.is_some() => {
                if let Some(p) = pending_for(&e)? {
                    assign(binding.as_deref(), finish(p, String::new()), &mut predicate, &mut object);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"results" => saw_results = true,
            Ok(Event::Text(e)) if pending.is_some() => {
                text.push_str(&e.unescape().map_err(|err| err.to_string())?);
            }
            Ok(Event::CData(e)) if pending.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"uri" | b"literal" | b"bnode" => {
                    if let Some(p) = pending.take() {
                        let value = std::mem::take(&mut text);
                        assign(binding.as_deref(), finish(p, value), &mut predicate, &mut object);
                    }
                }
                b"binding" => binding = None,
                b"result" => {
                    if let (Some(Term::Uri(p)), Some(o)) = (&predicate, &object) {
                        if let Some(rendered) = o.render() {
                            lines.push(format!("<{}> <{}> {} .", subject, p, rendered));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if !saw_results {
        return Err("no <results> element in response".to_string());
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADA: &str = "http://dbpedia.org/resource/Ada_Lovelace";

    #[test]
    fn iri_for_label() {
        assert_eq!(resource_iri("Ada Lovelace"), ADA);
        assert_eq!(
            resource_iri("A <b> \"c\""),
            "http://dbpedia.org/resource/A_%3Cb%3E_%22c%22"
        );
    }

    #[test]
    fn renders_every_term_kind() {
        let xml = std::fs::read_to_string("tests/fixtures/sparql_ada.xml").unwrap();
        let lines = parse_results(ADA, &xml).unwrap();
        assert_eq!(
            lines,
            vec![
                format!("<{ADA}> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://dbpedia.org/ontology/Person> ."),
                format!("<{ADA}> <http://www.w3.org/2000/01/rdf-schema#label> \"Ada Lovelace\"@en ."),
                format!("<{ADA}> <http://dbpedia.org/ontology/birthDate> \"1815-12-10\"^^<http://www.w3.org/2001/XMLSchema#date> ."),
                format!("<{ADA}> <http://dbpedia.org/property/quote> \"\\\"Poetical science\\\" & more\\nlines\" ."),
                format!("<{ADA}> <http://dbpedia.org/property/note> \"\" ."),
            ]
        );
    }

    #[test]
    fn empty_result_set_is_not_an_error() {
        let xml = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
 <head><variable name="predicate"/><variable name="object"/></head>
 <results distinct="false" ordered="true">
 </results>
</sparql>"#;
        assert!(parse_results(ADA, xml).unwrap().is_empty());
    }

    #[test]
    fn non_sparql_body_is_malformed() {
        assert!(parse_results(ADA, "<html><body>Service unavailable</body></html>").is_err());
    }
}
