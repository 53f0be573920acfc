use smscr_exec::RequestContext;

use super::{Worker, WorkerError};
use crate::dispatch::Dispatcher;

/// Adds parameters `a` and `b` and renders the result page.
pub struct SumWorker;

const DEFAULT_A: i32 = 1;
const DEFAULT_B: i32 = 2;

impl Worker for SumWorker {
    fn process_request(&self, context: &mut RequestContext<'_>, dispatcher: &dyn Dispatcher) -> Result<(), WorkerError> {
        let int_param = |name: &str, default: i32| {
            context
                .parameter(name)
                .and_then(|value| value.parse::<i32>().ok())
                .unwrap_or(default)
        };
        let a = int_param("a", DEFAULT_A);
        let b = int_param("b", DEFAULT_B);
        let sum = a.wrapping_add(b);

        context.set_temporary_parameter("zbroj", sum.to_string());
        context.set_temporary_parameter("varA", a.to_string());
        context.set_temporary_parameter("varB", b.to_string());
        let image = if sum % 2 != 0 { "images/ein.jpg" } else { "images/jake.gif" };
        context.set_temporary_parameter("imgName", image);

        dispatcher.dispatch_request("/private/pages/calc.smscr", context)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::test_support::run;
    use pretty_assertions::assert_eq;

    fn temporary(outcome: &crate::workers::test_support::Outcome, name: &str) -> String {
        outcome.dispatcher.temporary.borrow().get(name).cloned().unwrap_or_default()
    }

    #[test]
    fn test_sums_parameters() {
        let outcome = run(&SumWorker, &[("a", "4"), ("b", "5")], &[]);
        assert_eq!(temporary(&outcome, "zbroj"), "9");
        assert_eq!(temporary(&outcome, "varA"), "4");
        assert_eq!(temporary(&outcome, "varB"), "5");
        assert_eq!(temporary(&outcome, "imgName"), "images/ein.jpg");
        assert_eq!(*outcome.dispatcher.paths.borrow(), vec!["/private/pages/calc.smscr".to_string()]);
    }

    #[test]
    fn test_defaults_for_missing_or_invalid() {
        let outcome = run(&SumWorker, &[("a", "x")], &[]);
        assert_eq!(temporary(&outcome, "zbroj"), "3");
        assert_eq!(temporary(&outcome, "varA"), "1");
        assert_eq!(temporary(&outcome, "varB"), "2");
    }

    #[test]
    fn test_even_sum_image() {
        let outcome = run(&SumWorker, &[("a", "-3"), ("b", "1")], &[]);
        assert_eq!(temporary(&outcome, "zbroj"), "-2");
        assert_eq!(temporary(&outcome, "imgName"), "images/jake.gif");
    }
}
