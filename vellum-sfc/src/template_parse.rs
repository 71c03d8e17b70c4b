use crate::template_ast::{AttrKind, Attribute, Element, Node, Script, Text};

/// Hand-rolled parser for the component markup dialect:
/// - nested elements and self-closing tags (`<input/>`)
/// - static, bind (`:value=`), event (`@click=`) and `v-` directive
///   attributes; flag attributes without a value
/// - one raw `<script>` element
/// - text with `{{ interpolation }}` splits
/// - `<!-- comments -->`, which are dropped
pub fn parse(input: &str) -> Vec<Node> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    fn push_child(stack: &mut Vec<Element>, roots: &mut Vec<Node>, node: Node) {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        } else {
            roots.push(node);
        }
    }

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if input[i..].starts_with("<!--") {
                i = match input[i..].find("-->") {
                    Some(end) => i + end + 3,
                    None => bytes.len(),
                };
                continue;
            }

            // Closing tag.
            if i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                i += 2;
                let tag = read_ident(bytes, &mut i);
                skip_ws(bytes, &mut i);
                if i < bytes.len() && bytes[i] == b'>' {
                    i += 1;
                }
                // Pop until the matching tag, closing anything left open
                // on the way out.
                let mut popped: Option<Element> = None;
                while let Some(element) = stack.pop() {
                    if element.tag == tag {
                        popped = Some(element);
                        break;
                    }
                    log::warn!("unclosed <{}> implicitly closed by </{}>", element.tag, tag);
                    push_child(&mut stack, &mut roots, Node::Element(element));
                }
                if let Some(element) = popped {
                    push_child(&mut stack, &mut roots, Node::Element(element));
                }
                continue;
            }

            // Opening or self-closing tag.
            i += 1;
            let tag = read_ident(bytes, &mut i);
            let mut attrs: Vec<Attribute> = Vec::new();
            let mut self_closing = false;

            loop {
                skip_ws(bytes, &mut i);
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'/' => {
                        self_closing = true;
                        i += 1;
                        skip_ws(bytes, &mut i);
                        if i < bytes.len() && bytes[i] == b'>' {
                            i += 1;
                        }
                        break;
                    }
                    b'>' => {
                        i += 1;
                        break;
                    }
                    _ => {
                        if let Some(attr) = read_attribute(bytes, &mut i) {
                            attrs.push(attr);
                        } else {
                            i += 1;
                        }
                    }
                }
            }

            if tag == "script" {
                // Raw capture until the closing tag; the content is Rust,
                // not markup.
                let content = match input[i..].find("</script") {
                    Some(end) => {
                        let content = input[i..i + end].to_string();
                        i += end;
                        i = match input[i..].find('>') {
                            Some(close) => i + close + 1,
                            None => bytes.len(),
                        };
                        content
                    }
                    None => {
                        let content = input[i..].to_string();
                        i = bytes.len();
                        content
                    }
                };
                push_child(&mut stack, &mut roots, Node::Script(Script { content }));
                continue;
            }

            let element = Element {
                tag,
                attrs,
                children: Vec::new(),
            };
            if self_closing {
                push_child(&mut stack, &mut roots, Node::Element(element));
            } else {
                stack.push(element);
            }
        } else if input[i..].starts_with("{{") {
            i += 2;
            let start = i;
            while i < bytes.len() && !input[i..].starts_with("}}") {
                i += 1;
            }
            let expression = input[start..i].trim().to_string();
            if i < bytes.len() {
                i += 2;
            }
            push_child(
                &mut stack,
                &mut roots,
                Node::Text(Text {
                    content: expression,
                    interpolated: true,
                }),
            );
        } else {
            let start = i;
            while i < bytes.len() && bytes[i] != b'<' && !input[i..].starts_with("{{") {
                i += 1;
            }
            let text = input[start..i].trim();
            if !text.is_empty() {
                push_child(
                    &mut stack,
                    &mut roots,
                    Node::Text(Text {
                        content: text.to_string(),
                        interpolated: false,
                    }),
                );
            }
        }
    }

    // Unclosed tags at the end of input: close them best-effort.
    while let Some(element) = stack.pop() {
        log::warn!("unclosed <{}> at end of template", element.tag);
        push_child(&mut stack, &mut roots, Node::Element(element));
    }

    roots
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn read_ident(bytes: &[u8], i: &mut usize) -> String {
    let start = *i;
    while *i < bytes.len() {
        let c = bytes[*i] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            *i += 1;
        } else {
            break;
        }
    }
    String::from_utf8_lossy(&bytes[start..*i]).into_owned()
}

fn read_attribute(bytes: &[u8], i: &mut usize) -> Option<Attribute> {
    let name_start = *i;
    while *i < bytes.len() {
        let c = bytes[*i] as char;
        if c.is_ascii_alphanumeric()
            || c == '_'
            || c == '-'
            || c == ':'
            || c == '@'
            || c == '#'
            || c == '.'
        {
            *i += 1;
        } else {
            break;
        }
    }
    if *i == name_start {
        return None;
    }
    let raw_name = String::from_utf8_lossy(&bytes[name_start..*i]).into_owned();

    skip_ws(bytes, i);
    let mut value: Option<String> = None;
    if *i < bytes.len() && bytes[*i] == b'=' {
        *i += 1;
        skip_ws(bytes, i);
        value = read_quoted(bytes, i);
    }

    let (kind, name) = classify(&raw_name);
    Some(Attribute { kind, name, value })
}

fn classify(raw_name: &str) -> (AttrKind, String) {
    if let Some(name) = raw_name.strip_prefix(':') {
        return (AttrKind::Bind { name: name.to_string() }, name.to_string());
    }
    if let Some(name) = raw_name.strip_prefix('@') {
        return (AttrKind::Event { name: name.to_string() }, name.to_string());
    }
    if let Some(name) = raw_name.strip_prefix("v-bind:") {
        return (AttrKind::Bind { name: name.to_string() }, name.to_string());
    }
    if let Some(name) = raw_name.strip_prefix("v-on:") {
        return (AttrKind::Event { name: name.to_string() }, name.to_string());
    }
    if let Some(name) = raw_name.strip_prefix('#') {
        return (AttrKind::Slot, name.to_string());
    }
    if let Some(name) = raw_name.strip_prefix("v-slot:") {
        return (AttrKind::Slot, name.to_string());
    }
    match raw_name {
        "v-bind" => (AttrKind::BindDict, raw_name.to_string()),
        "v-slot" => (AttrKind::Slot, "default".to_string()),
        "v-if" => (AttrKind::If, raw_name.to_string()),
        "v-else-if" => (AttrKind::ElseIf, raw_name.to_string()),
        "v-else" => (AttrKind::Else, raw_name.to_string()),
        "v-for" => (AttrKind::For, raw_name.to_string()),
        _ => (AttrKind::Static, raw_name.to_string()),
    }
}

fn read_quoted(bytes: &[u8], i: &mut usize) -> Option<String> {
    if *i >= bytes.len() {
        return None;
    }
    let quote = bytes[*i];
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    *i += 1;
    let start = *i;
    while *i < bytes.len() && bytes[*i] != quote {
        *i += 1;
    }
    let value = String::from_utf8_lossy(&bytes[start..*i]).into_owned();
    if *i < bytes.len() {
        *i += 1;
    }
    Some(value)
}
