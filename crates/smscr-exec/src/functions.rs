//! Built-in `@functions` callable from echo tags.
//!
//! Functions take their arguments from the operand stack (last pushed = top) and
//! push zero or more results back.

use crate::context::RequestContext;
use crate::decimal_format::DecimalFormat;
use crate::value::ValueWrapper;
use crate::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Decfmt,
    Dup,
    Swap,
    SetMimeType,
    ParamGet,
    PparamGet,
    PparamSet,
    PparamDel,
    TparamGet,
    TparamSet,
    TparamDel,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "sin" => Builtin::Sin,
            "decfmt" => Builtin::Decfmt,
            "dup" => Builtin::Dup,
            "swap" => Builtin::Swap,
            "setMimeType" => Builtin::SetMimeType,
            "paramGet" => Builtin::ParamGet,
            "pparamGet" => Builtin::PparamGet,
            "pparamSet" => Builtin::PparamSet,
            "pparamDel" => Builtin::PparamDel,
            "tparamGet" => Builtin::TparamGet,
            "tparamSet" => Builtin::TparamSet,
            "tparamDel" => Builtin::TparamDel,
            _ => return None,
        };
        Some(builtin)
    }

    /// Number of operands consumed.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Sin | Builtin::Dup | Builtin::SetMimeType => 1,
            Builtin::PparamDel | Builtin::TparamDel => 1,
            Builtin::Decfmt | Builtin::Swap => 2,
            Builtin::ParamGet | Builtin::PparamGet | Builtin::TparamGet => 2,
            Builtin::PparamSet | Builtin::TparamSet => 2,
        }
    }
}

/// Run the function `name` against `stack`.
pub fn call(
    name: &str,
    stack: &mut Vec<ValueWrapper>,
    context: &mut RequestContext<'_>,
) -> Result<(), ExecError> {
    let builtin = Builtin::from_name(name).ok_or_else(|| ExecError::UnknownFunction(name.to_string()))?;
    if stack.len() < builtin.arity() {
        return Err(ExecError::StackUnderflow(format!("@{name}")));
    }
    let underflow = || ExecError::StackUnderflow(format!("@{name}"));
    let pop = |stack: &mut Vec<ValueWrapper>| stack.pop().ok_or_else(underflow);

    match builtin {
        Builtin::Sin => {
            let degrees = pop(stack)?.to_f64()?;
            stack.push(ValueWrapper::new(degrees.to_radians().sin()));
        }
        Builtin::Decfmt => {
            let pattern = pop(stack)?.to_string();
            let value = pop(stack)?.to_f64()?;
            let formatted = DecimalFormat::parse(&pattern)?.format(value);
            stack.push(ValueWrapper::new(formatted));
        }
        Builtin::Dup => {
            let top = pop(stack)?;
            stack.push(top.clone());
            stack.push(top);
        }
        Builtin::Swap => {
            let a = pop(stack)?;
            let b = pop(stack)?;
            stack.push(a);
            stack.push(b);
        }
        Builtin::SetMimeType => {
            let mime = pop(stack)?.to_string();
            context.set_mime_type(mime);
        }
        Builtin::ParamGet | Builtin::PparamGet | Builtin::TparamGet => {
            let default = pop(stack)?;
            let name = pop(stack)?.to_string();
            let found = match builtin {
                Builtin::ParamGet => context.parameter(&name).map(str::to_string),
                Builtin::PparamGet => context.persistent_parameter(&name),
                _ => context.temporary_parameter(&name).map(str::to_string),
            };
            stack.push(found.map_or(default, ValueWrapper::new));
        }
        Builtin::PparamSet | Builtin::TparamSet => {
            let value = pop(stack)?.to_string();
            let name = pop(stack)?.to_string();
            if builtin == Builtin::PparamSet {
                context.set_persistent_parameter(name, value);
            } else {
                context.set_temporary_parameter(name, value);
            }
        }
        Builtin::PparamDel => {
            let name = pop(stack)?.to_string();
            context.remove_persistent_parameter(&name);
        }
        Builtin::TparamDel => {
            let name = pop(stack)?.to_string();
            context.remove_temporary_parameter(&name);
        }
    }
    Ok(())
}
