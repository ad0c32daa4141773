//! Minimal XML element tree for reading SOAP responses.
//!
//! Elements are keyed by local name only. RIS and AXL responses use
//! different prefixes depending on the UCM release, so prefixes are dropped.

use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, String> {
        // Text is kept verbatim, `text()` trims it.
        let mut reader = Reader::from_str(xml);

        // The bottom of the stack is a synthetic document node.
        let mut stack = vec![Element::default()];
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Element {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                }),
                Ok(Event::Empty(e)) => {
                    let el = Element {
                        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    };
                    push_child(&mut stack, el);
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err("unbalanced end tag".into());
                    }
                    if let Some(done) = stack.pop() {
                        push_child(&mut stack, done);
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(c)) => {
                    let raw = c.into_inner();
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
            }
        }

        if stack.len() != 1 {
            return Err(format!("{} unclosed element(s)", stack.len() - 1));
        }
        stack
            .pop()
            .and_then(|doc| doc.children.into_iter().next())
            .ok_or_else(|| "document has no root element".to_string())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for the first descendant named `name`, self included.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Untrimmed text of a direct child.
    pub fn child_raw_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Trimmed text of a direct child, `None` when the child is absent or empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text).filter(|t| !t.is_empty())
    }
}

fn push_child(stack: &mut [Element], el: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
    }
}
