#[derive(Debug, Clone, PartialEq)]
pub enum AttrKind {
    /// `padding="10"` or a bare flag like `wrap`.
    Static,
    /// `:value="expr"` or `v-bind:value="expr"`.
    Bind { name: String },
    /// `v-bind="expr"`: the whole map becomes attributes.
    BindDict,
    /// `@click="expr"` or `v-on:click="expr"`.
    Event { name: String },
    If,
    ElseIf,
    Else,
    /// `v-for="pattern in iterable"`.
    For,
    /// `#header`, `v-slot:header` or bare `v-slot`; the attribute name
    /// carries the slot target.
    Slot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttrKind,
    /// The attribute name as written, minus any directive prefix.
    pub name: String,
    /// `None` for flag attributes, which read as `true`.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs
            .iter()
            .find(|a| a.kind == AttrKind::Static && a.name == name)
    }

    pub fn directive(&self, kind: &AttrKind) -> Option<&Attribute> {
        self.attrs.iter().find(|a| &a.kind == kind)
    }

    /// Component tags are capitalized, host tags are not.
    pub fn is_component(&self) -> bool {
        self.tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub content: String,
    /// True when `content` is a `{{ }}` expression rather than literal
    /// text.
    pub interpolated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Script(Script),
}
