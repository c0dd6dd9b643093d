//! WebDAV property definitions and XML serialization (RFC 4918).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

use crate::fs::Metadata;
use crate::lock::LockInfo;
use crate::path;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";

/// Live properties served for every resource, in response order.
pub const LIVE_PROPERTIES: &[&str] = &[
    "resourcetype",
    "displayname",
    "getcontentlength",
    "getcontenttype",
    "getlastmodified",
    "creationdate",
    "getetag",
    "supportedlock",
    "lockdiscovery",
];

/// Live properties that only exist on files.
const FILE_ONLY: &[&str] = &["getcontentlength", "getcontenttype", "getetag"];

/// A namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    /// Namespace URI; empty when unqualified.
    pub namespace: String,
    /// Local name
    pub local: String,
}

impl QName {
    /// Create a name.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// A name in the `DAV:` namespace.
    pub fn dav(local: impl Into<String>) -> Self {
        Self::new(DAV_NS, local)
    }

    /// Whether this is `DAV:{local}`.
    pub fn is_dav(&self, local: &str) -> bool {
        self.namespace == DAV_NS && self.local == local
    }
}

/// A WebDAV resource (file or collection)
#[derive(Debug, Clone)]
pub struct DavResource {
    /// Full href path for this resource
    pub href: String,
    /// Display name
    pub display_name: String,
    /// Filesystem metadata
    pub meta: Metadata,
    /// Content type (MIME); ignored for collections
    pub content_type: String,
    /// Locks covering the resource
    pub locks: Vec<LockInfo>,
}

impl DavResource {
    /// Value of a live property as inner XML, or `None` when the property
    /// does not exist on this resource.
    pub fn live_property(&self, name: &QName, prefix: &str) -> Option<String> {
        if name.namespace != DAV_NS {
            return None;
        }
        let is_dir = self.meta.is_dir;
        if is_dir && FILE_ONLY.contains(&name.local.as_str()) {
            return None;
        }

        let value = match name.local.as_str() {
            "resourcetype" if is_dir => "<D:collection/>".to_string(),
            "resourcetype" => String::new(),
            "displayname" => xml_escape(&self.display_name),
            "getcontentlength" => self.meta.len.to_string(),
            "getcontenttype" => xml_escape(&self.content_type),
            "getlastmodified" => format_http_date(&self.meta.modified),
            "creationdate" => {
                format_creation_date(self.meta.created.as_ref().unwrap_or(&self.meta.modified))
            }
            "getetag" => xml_escape(&self.meta.etag()),
            "supportedlock" => SUPPORTED_LOCK.to_string(),
            "lockdiscovery" => self
                .locks
                .iter()
                .map(|lock| activelock_xml(lock, prefix))
                .collect(),
            _ => return None,
        };
        Some(value)
    }

    /// Live properties present on this resource.
    pub fn live_property_names(&self) -> Vec<QName> {
        LIVE_PROPERTIES
            .iter()
            .filter(|name| !(self.meta.is_dir && FILE_ONLY.contains(*name)))
            .map(|name| QName::dav(*name))
            .collect()
    }
}

const SUPPORTED_LOCK: &str = "<D:lockentry><D:lockscope><D:exclusive/></D:lockscope>\
<D:locktype><D:write/></D:locktype></D:lockentry>\
<D:lockentry><D:lockscope><D:shared/></D:lockscope>\
<D:locktype><D:write/></D:locktype></D:lockentry>";

/// Format a DateTime as HTTP date (RFC 7231)
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format a DateTime as ISO 8601 for WebDAV creationdate
pub fn format_creation_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Depth header values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Only the resource itself
    Zero,
    /// Resource and its immediate children
    One,
    /// Resource and all descendants
    Infinity,
}

impl Depth {
    /// Parse from a header value string; an absent header means infinity.
    pub fn from_header(value: Option<&str>) -> AppResult<Self> {
        match value.map(str::trim) {
            Some("0") => Ok(Self::Zero),
            Some("1") => Ok(Self::One),
            None => Ok(Self::Infinity),
            Some(v) if v.eq_ignore_ascii_case("infinity") => Ok(Self::Infinity),
            Some(v) => Err(AppError::validation(format!("invalid Depth header {v:?}"))),
        }
    }
}

/// One element of a parsed request body.
#[derive(Debug, Clone)]
pub struct Element {
    /// Nesting depth; the document element is 0.
    pub depth: usize,
    pub name: QName,
    /// Unescaped text directly inside the element.
    pub text: String,
}

/// Flatten an XML request body into its elements in document order.
pub fn parse_elements(body: &[u8]) -> AppResult<Vec<Element>> {
    let body = std::str::from_utf8(body)
        .map_err(|_| AppError::validation("XML body is not valid UTF-8"))?;
    let mut reader = NsReader::from_str(body);
    let mut elements: Vec<Element> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| AppError::validation(format!("malformed XML body: {e}")))?;

        match event {
            Event::Start(e) => {
                let name = qualified(ns, e.local_name().as_ref())?;
                open.push(elements.len());
                elements.push(Element {
                    depth: open.len() - 1,
                    name,
                    text: String::new(),
                });
            }
            Event::Empty(e) => {
                let name = qualified(ns, e.local_name().as_ref())?;
                elements.push(Element {
                    depth: open.len(),
                    name,
                    text: String::new(),
                });
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(t) => {
                if let Some(&index) = open.last() {
                    let text = t
                        .unescape()
                        .map_err(|e| AppError::validation(format!("malformed XML body: {e}")))?;
                    elements[index].text.push_str(text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(AppError::validation("malformed XML body: unclosed element"));
    }
    Ok(elements)
}

fn qualified(ns: ResolveResult<'_>, local: &[u8]) -> AppResult<QName> {
    let namespace = match ns {
        ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.as_ref()).into_owned(),
        ResolveResult::Unbound => String::new(),
        ResolveResult::Unknown(prefix) => {
            return Err(AppError::validation(format!(
                "unknown namespace prefix {:?}",
                String::from_utf8_lossy(&prefix)
            )));
        }
    };
    Ok(QName::new(namespace, String::from_utf8_lossy(local)))
}

/// Walk `elements`, handing each one to `visit` together with the names of
/// its ancestors (document element first).
pub fn walk<F>(elements: &[Element], mut visit: F)
where
    F: FnMut(&[QName], &Element),
{
    let mut ancestors: Vec<QName> = Vec::new();
    for element in elements {
        ancestors.truncate(element.depth);
        visit(&ancestors, element);
        ancestors.push(element.name.clone());
    }
}

/// Parsed PROPFIND request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropfindRequest {
    /// Request all properties
    AllProp,
    /// Request specific properties by name
    Prop(Vec<QName>),
    /// Request property names only
    PropName,
}

impl PropfindRequest {
    /// Parse from the XML body; an empty body means `allprop`.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::AllProp);
        }

        let elements = parse_elements(body)?;
        match elements.first() {
            Some(root) if root.name.is_dav("propfind") => {}
            _ => return Err(AppError::validation("expected a DAV:propfind element")),
        }

        let mut request = None;
        let mut props = Vec::new();
        walk(&elements, |ancestors, element| match ancestors.len() {
            1 if element.name.is_dav("allprop") => request = Some(Self::AllProp),
            1 if element.name.is_dav("propname") => request = Some(Self::PropName),
            1 if element.name.is_dav("prop") => request = Some(Self::Prop(Vec::new())),
            2 if ancestors[1].is_dav("prop") => props.push(element.name.clone()),
            _ => {}
        });

        match request {
            Some(Self::Prop(_)) => Ok(Self::Prop(props)),
            Some(request) => Ok(request),
            None => Err(AppError::validation(
                "propfind must contain allprop, propname or prop",
            )),
        }
    }
}

/// Names of the properties a PROPPATCH body sets or removes.
pub fn parse_proppatch(body: &[u8]) -> AppResult<Vec<QName>> {
    let elements = parse_elements(body)?;
    match elements.first() {
        Some(root) if root.name.is_dav("propertyupdate") => {}
        _ => {
            return Err(AppError::validation(
                "expected a DAV:propertyupdate element",
            ));
        }
    }

    let mut names = Vec::new();
    walk(&elements, |ancestors, element| {
        if ancestors.len() == 3
            && (ancestors[1].is_dav("set") || ancestors[1].is_dav("remove"))
            && ancestors[2].is_dav("prop")
        {
            names.push(element.name.clone());
        }
    });
    Ok(names)
}

fn multistatus_open() -> String {
    String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<D:multistatus xmlns:D=\"DAV:\">\n")
}

/// Render one property element.
fn prop_element(xml: &mut String, name: &QName, value: Option<&str>) {
    let (tag, decl) = if name.namespace == DAV_NS {
        (format!("D:{}", name.local), String::new())
    } else if name.namespace.is_empty() {
        (name.local.clone(), " xmlns=\"\"".to_string())
    } else {
        (
            format!("R:{}", name.local),
            format!(" xmlns:R=\"{}\"", xml_escape(&name.namespace)),
        )
    };

    match value {
        Some(v) if !v.is_empty() => {
            let _ = writeln!(xml, "        <{tag}{decl}>{v}</{tag}>");
        }
        _ => {
            let _ = writeln!(xml, "        <{tag}{decl}/>");
        }
    }
}

fn propstat(xml: &mut String, props: &[(QName, Option<String>)], status: &str) {
    if props.is_empty() {
        return;
    }
    xml.push_str("    <D:propstat>\n      <D:prop>\n");
    for (name, value) in props {
        prop_element(xml, name, value.as_deref());
    }
    xml.push_str("      </D:prop>\n");
    let _ = writeln!(xml, "      <D:status>HTTP/1.1 {status}</D:status>");
    xml.push_str("    </D:propstat>\n");
}

/// Generate a multistatus XML response
pub fn build_multistatus_xml(
    resources: &[DavResource],
    request: &PropfindRequest,
    prefix: &str,
) -> String {
    let mut xml = multistatus_open();

    for resource in resources {
        xml.push_str("  <D:response>\n");
        let _ = writeln!(xml, "    <D:href>{}</D:href>", xml_escape(&resource.href));

        match request {
            PropfindRequest::AllProp => {
                let found: Vec<_> = resource
                    .live_property_names()
                    .into_iter()
                    .map(|name| {
                        let value = resource.live_property(&name, prefix);
                        (name, value)
                    })
                    .collect();
                propstat(&mut xml, &found, "200 OK");
            }
            PropfindRequest::PropName => {
                let names: Vec<_> = resource
                    .live_property_names()
                    .into_iter()
                    .map(|name| (name, None))
                    .collect();
                propstat(&mut xml, &names, "200 OK");
            }
            PropfindRequest::Prop(names) => {
                let mut found = Vec::new();
                let mut missing = Vec::new();
                for name in names {
                    match resource.live_property(name, prefix) {
                        Some(value) => found.push((name.clone(), Some(value))),
                        None => missing.push((name.clone(), None)),
                    }
                }
                propstat(&mut xml, &found, "200 OK");
                propstat(&mut xml, &missing, "404 Not Found");
            }
        }

        xml.push_str("  </D:response>\n");
    }

    xml.push_str("</D:multistatus>\n");
    xml
}

/// Build the PROPPATCH answer: every property is refused, since no dead
/// properties are stored.
pub fn build_proppatch_xml(href: &str, names: &[QName]) -> String {
    let mut xml = multistatus_open();
    xml.push_str("  <D:response>\n");
    let _ = writeln!(xml, "    <D:href>{}</D:href>", xml_escape(href));
    let refused: Vec<_> = names.iter().map(|n| (n.clone(), None)).collect();
    propstat(&mut xml, &refused, "403 Forbidden");
    xml.push_str("  </D:response>\n");
    xml.push_str("</D:multistatus>\n");
    xml
}

/// `DAV:activelock` element describing a lock.
pub fn activelock_xml(lock: &LockInfo, prefix: &str) -> String {
    let timeout = match lock.remaining() {
        // Rounded up so a fresh lock reports the granted timeout.
        Some(left) => format!(
            "Second-{}",
            left.as_secs() + u64::from(left.subsec_nanos() > 0)
        ),
        None => "Infinite".to_string(),
    };
    let owner = lock
        .owner
        .as_deref()
        .map(|o| format!("<D:owner>{}</D:owner>", xml_escape(o)))
        .unwrap_or_default();

    format!(
        "<D:activelock>\
<D:locktype><D:write/></D:locktype>\
<D:lockscope><D:{scope}/></D:lockscope>\
<D:depth>{depth}</D:depth>\
{owner}\
<D:timeout>{timeout}</D:timeout>\
<D:locktoken><D:href>{token}</D:href></D:locktoken>\
<D:lockroot><D:href>{root}</D:href></D:lockroot>\
</D:activelock>",
        scope = lock.scope.as_str(),
        depth = if lock.depth_infinity { "infinity" } else { "0" },
        token = xml_escape(&lock.token),
        root = xml_escape(&path::href(prefix, &lock.root, false)),
    )
}

/// LOCK response body.
pub fn build_lockdiscovery_xml(lock: &LockInfo, prefix: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<D:prop xmlns:D=\"DAV:\"><D:lockdiscovery>{}</D:lockdiscovery></D:prop>\n",
        activelock_xml(lock, prefix)
    )
}

/// Escape XML special characters
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
