//! Abstract Syntax Tree for SmartScript.
//!
//! Document-level nodes (text, echo tags, for-loops) own elements, the lexical
//! units found inside tag bodies. Every type renders back to template source
//! through `Display`, so `parse(doc.to_string())` yields an equal tree.

use std::fmt;

// ---------------------------------------------------------------------------
// Document-level AST
// ---------------------------------------------------------------------------

/// A complete SmartScript document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentNode {
    pub children: Vec<Node>,
}

impl DocumentNode {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, escapes already resolved.
    Text(TextNode),

    /// A `{$= ... $}` tag.
    Echo(EchoNode),

    /// A `{$ FOR ... $} ... {$ END $}` block.
    ForLoop(ForLoopNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Elements of an echo tag, evaluated left to right on an operand stack.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoNode {
    pub elements: Vec<Element>,
}

impl EchoNode {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }
}

/// A counted loop over `variable` from `start` to `end` (inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoopNode {
    pub variable: String,
    pub start: Element,
    pub end: Element,
    /// Increment per iteration; `None` steps by one.
    pub step: Option<Element>,
    pub children: Vec<Node>,
}

impl ForLoopNode {
    pub fn new(
        variable: impl Into<String>,
        start: Element,
        end: Element,
        step: Option<Element>,
    ) -> Self {
        Self {
            variable: variable.into(),
            start,
            end,
            step,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// A lexical unit inside a tag body.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Variable(String),
    String(String),
    Integer(i32),
    Double(f64),
    /// Function name without the leading `@`.
    Function(String),
    Operator(Operator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Operator {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '^' => Some(Operator::Pow),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Pow => '^',
        }
    }
}

// ---------------------------------------------------------------------------
// Source rendering
// ---------------------------------------------------------------------------

impl fmt::Display for DocumentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for child in &self.children {
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => write!(f, "{text}"),
            Node::Echo(echo) => write!(f, "{echo}"),
            Node::ForLoop(for_loop) => write!(f, "{for_loop}"),
        }
    }
}

impl fmt::Display for TextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text.replace('\\', "\\\\").replace('{', "\\{"))
    }
}

impl fmt::Display for EchoNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{$= ")?;
        for element in &self.elements {
            write!(f, "{element} ")?;
        }
        f.write_str("$}")
    }
}

impl fmt::Display for ForLoopNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{$ FOR {} {} {}", self.variable, self.start, self.end)?;
        if let Some(step) = &self.step {
            write!(f, " {step}")?;
        }
        f.write_str(" $}")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        f.write_str("{$ END $}")
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Variable(name) => f.write_str(name),
            Element::String(value) => {
                f.write_str("\"")?;
                for c in value.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Element::Integer(value) => write!(f, "{value}"),
            // Always show a fraction so the literal lexes back as a double.
            Element::Double(value) => {
                let text = value.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{text}.0")
                }
            }
            Element::Function(name) => write!(f, "@{name}"),
            Element::Operator(op) => write!(f, "{}", op.symbol()),
        }
    }
}
