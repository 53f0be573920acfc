//! Tree-walking executor.

use std::cmp::Ordering;

use smscr_parser::ast::{DocumentNode, EchoNode, Element, ForLoopNode, Node, Operator};

use crate::context::RequestContext;
use crate::functions;
use crate::multistack::Multistack;
use crate::value::{Value, ValueWrapper};
use crate::ExecError;

/// Executes a parsed document against a request context.
///
/// Loop variables live in a [`Multistack`] owned by the engine; echo tags are
/// evaluated on a fresh operand stack each.
pub struct Engine<'c, 'a> {
    context: &'c mut RequestContext<'a>,
    variables: Multistack,
}

impl<'c, 'a> Engine<'c, 'a> {
    pub fn new(context: &'c mut RequestContext<'a>) -> Self {
        Self {
            context,
            variables: Multistack::new(),
        }
    }

    pub fn execute(&mut self, document: &DocumentNode) -> Result<(), ExecError> {
        self.visit_nodes(&document.children)
    }

    fn visit_nodes(&mut self, nodes: &[Node]) -> Result<(), ExecError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.context.write_str(&text.text)?,
                Node::Echo(echo) => self.visit_echo(echo)?,
                Node::ForLoop(for_loop) => self.visit_for_loop(for_loop)?,
            }
        }
        Ok(())
    }

    fn visit_for_loop(&mut self, node: &ForLoopNode) -> Result<(), ExecError> {
        let start = self.resolve(&node.start)?;
        let end = self.resolve(&node.end)?.into_value();
        let step = match &node.step {
            Some(step) => self.resolve(step)?.into_value(),
            None => Value::Integer(1),
        };

        self.variables.push(&node.variable, start);
        loop {
            let current = self.variable(&node.variable)?;
            if current.num_compare(&end)? == Ordering::Greater {
                break;
            }
            self.visit_nodes(&node.children)?;
            self.variables
                .peek_mut(&node.variable)
                .ok_or_else(|| ExecError::UnboundVariable(node.variable.clone()))?
                .add(&step)?;
        }
        self.variables.pop(&node.variable);
        Ok(())
    }

    fn visit_echo(&mut self, node: &EchoNode) -> Result<(), ExecError> {
        let mut stack: Vec<ValueWrapper> = Vec::new();
        for element in &node.elements {
            match element {
                Element::Operator(op) => {
                    let underflow = || ExecError::StackUnderflow(op.symbol().to_string());
                    let second = stack.pop().ok_or_else(underflow)?;
                    let mut first = stack.pop().ok_or_else(underflow)?;
                    apply(&mut first, *op, second.value())?;
                    stack.push(first);
                }
                Element::Function(name) => functions::call(name, &mut stack, self.context)?,
                constant => stack.push(self.resolve(constant)?),
            }
        }

        // Bottom of the stack first.
        for value in &stack {
            self.context.write_str(&value.to_string())?;
        }
        Ok(())
    }

    /// Value of a variable or constant element.
    fn resolve(&self, element: &Element) -> Result<ValueWrapper, ExecError> {
        Ok(match element {
            Element::Variable(name) => self.variable(name)?.clone(),
            Element::String(value) => ValueWrapper::new(value.as_str()),
            Element::Integer(value) => ValueWrapper::new(*value),
            Element::Double(value) => ValueWrapper::new(*value),
            Element::Function(_) | Element::Operator(_) => {
                return Err(ExecError::NotAValue(element.to_string()))
            }
        })
    }

    fn variable(&self, name: &str) -> Result<&ValueWrapper, ExecError> {
        self.variables
            .peek(name)
            .ok_or_else(|| ExecError::UnboundVariable(name.to_string()))
    }
}

fn apply(first: &mut ValueWrapper, op: Operator, second: &Value) -> Result<(), ExecError> {
    match op {
        Operator::Add => first.add(second)?,
        Operator::Sub => first.subtract(second)?,
        Operator::Mul => first.multiply(second)?,
        Operator::Div => first.divide(second)?,
        Operator::Pow => first.power(second)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SharedParameters;
    use pretty_assertions::assert_eq;
    use smscr_parser::Parser;
    use std::collections::HashMap;
    use std::io::{self, Write};

    /// Render `source` and return the body without the header.
    fn run(source: &str) -> Result<String, ExecError> {
        run_with(source, HashMap::new(), SharedParameters::default())
    }

    fn run_with(
        source: &str,
        params: HashMap<String, String>,
        persistent: SharedParameters,
    ) -> Result<String, ExecError> {
        let document = Parser::parse(source).unwrap();
        let mut out = Vec::new();
        {
            let mut ctx = RequestContext::new(&mut out, params, persistent, Vec::new());
            Engine::new(&mut ctx).execute(&document)?;
            // Force a header even for empty documents so the split below is uniform.
            ctx.write_str("")?;
        }
        let text = String::from_utf8(out).unwrap();
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        Ok(body.to_string())
    }

    #[test]
    fn test_text_only() {
        assert_eq!(run("Hello \\{$ world").unwrap(), "Hello {$ world");
    }

    #[test]
    fn test_for_loop_default_step() {
        assert_eq!(run("{$FOR i 1 5 $}{$=i$}{$END$}").unwrap(), "12345");
    }

    #[test]
    fn test_for_loop_with_step_and_doubles() {
        assert_eq!(run("{$ FOR i 0 10 5 $}{$= i $},{$ END $}").unwrap(), "0,5,10,");
        assert_eq!(run("{$ FOR x 0 1 0.5 $}{$= x \" \" $}{$ END $}").unwrap(), "0 0.5 1.0 ");
    }

    #[test]
    fn test_for_loop_not_entered() {
        assert_eq!(run("a{$ FOR i 5 1 $}x{$ END $}b").unwrap(), "ab");
    }

    #[test]
    fn test_nested_loops_shadow() {
        let source = "{$ FOR i 1 2 $}[{$ FOR i i 3 $}{$= i $}{$ END $}:{$= i $}]{$ END $}";
        assert_eq!(run(source).unwrap(), "[123:1][23:2]");
    }

    #[test]
    fn test_echo_arithmetic() {
        assert_eq!(run("{$= 4 2 + $}").unwrap(), "6");
        assert_eq!(run("{$= \"4\" \"2.0e0\" + $}").unwrap(), "6.0");
        assert_eq!(run("{$= 10 4 - 3 * $}").unwrap(), "18");
        assert_eq!(run("{$= 2 10 ^ $}").unwrap(), "1024");
        assert_eq!(run("{$= 1 0 / $}").unwrap(), "Infinity");
    }

    #[test]
    fn test_echo_writes_bottom_to_top() {
        assert_eq!(run("{$= \"a\" \"b\" 1 $}").unwrap(), "ab1");
    }

    #[test]
    fn test_dup_and_swap() {
        assert_eq!(run("{$= 3 @dup * $}").unwrap(), "9");
        assert_eq!(run("{$= \"a\" \"b\" @swap $}").unwrap(), "ba");
    }

    #[test]
    fn test_sin_and_decfmt() {
        assert_eq!(run("{$= 30 @sin \"0.000\" @decfmt $}").unwrap(), "0.500");
        assert_eq!(run("{$= \"2.5\" \"0.00\" @decfmt $}").unwrap(), "2.50");
    }

    #[test]
    fn test_set_mime_type() {
        let document = Parser::parse("{$= \"text/plain\" @setMimeType $}ok").unwrap();
        let mut out = Vec::new();
        {
            let mut ctx = RequestContext::standalone(&mut out);
            Engine::new(&mut ctx).execute(&document).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(text.ends_with("\r\n\r\nok"));
    }

    #[test]
    fn test_param_get() {
        let params = HashMap::from([("a".to_string(), "7".to_string())]);
        let source = "{$= \"a\" 0 @paramGet \"b\" \"none\" @paramGet $}";
        assert_eq!(run_with(source, params, SharedParameters::default()).unwrap(), "7none");
    }

    #[test]
    fn test_persistent_parameters() {
        let persistent = SharedParameters::default();
        let source = "{$= \"brojPoziva\" \"brojPoziva\" \"0\" @pparamGet 1 + @pparamSet $}";
        run_with(source, HashMap::new(), persistent.clone()).unwrap();
        run_with(source, HashMap::new(), persistent.clone()).unwrap();
        assert_eq!(persistent.lock().get("brojPoziva").map(String::as_str), Some("2"));

        run_with("{$= \"brojPoziva\" @pparamDel $}", HashMap::new(), persistent.clone()).unwrap();
        assert!(persistent.lock().is_empty());
    }

    #[test]
    fn test_temporary_parameters() {
        let source = "{$= \"t\" \"v\" @tparamSet \"t\" \"-\" @tparamGet \"t\" @tparamDel \"t\" \"-\" @tparamGet $}";
        assert_eq!(run(source).unwrap(), "v-");
    }

    #[test]
    fn test_loop_bound_must_be_a_value() {
        let mut document = DocumentNode::new();
        document.children.push(Node::ForLoop(ForLoopNode::new(
            "i",
            Element::Function("sin".into()),
            Element::Integer(3),
            None,
        )));
        let mut out = Vec::new();
        let mut ctx = RequestContext::standalone(&mut out);
        let err = Engine::new(&mut ctx).execute(&document).unwrap_err();
        assert!(matches!(err, ExecError::NotAValue(text) if text == "@sin"));
    }

    /// Accepts `capacity` bytes, then fails every write.
    struct FailingSink {
        written: Vec<u8>,
        capacity: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity - self.written.len();
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_stops_execution() {
        let mut header = Vec::new();
        RequestContext::standalone(&mut header).write_str("").unwrap();

        let document =
            Parser::parse("abc{$= \"t\" \"before\" @tparamSet $}def{$= \"t\" \"after\" @tparamSet $}").unwrap();
        let mut sink = FailingSink {
            written: Vec::new(),
            capacity: header.len() + 3,
        };
        let mut ctx = RequestContext::standalone(&mut sink);
        let err = Engine::new(&mut ctx).execute(&document).unwrap_err();

        assert!(matches!(&err, ExecError::Io(source) if source.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(ctx.temporary_parameter("t"), Some("before"));
        drop(ctx);
        assert!(sink.written.ends_with(b"\r\n\r\nabc"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(run("{$= \"x\" 1 + $}"), Err(ExecError::Coercion(_))));
        assert!(matches!(run("{$= 1 + $}"), Err(ExecError::StackUnderflow(_))));
        assert!(matches!(run("{$= @dup $}"), Err(ExecError::StackUnderflow(_))));
        assert!(matches!(run("{$= @nope $}"), Err(ExecError::UnknownFunction(name)) if name == "nope"));
        assert!(matches!(run("{$= y $}"), Err(ExecError::UnboundVariable(name)) if name == "y"));
        assert!(matches!(run("{$= 1 \"0.0.0\" @decfmt $}"), Err(ExecError::Format(_))));
    }
}
