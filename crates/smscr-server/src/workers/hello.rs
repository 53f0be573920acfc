use chrono::Local;

use smscr_exec::RequestContext;

use super::{escape_html, Worker, WorkerError};
use crate::dispatch::Dispatcher;

/// Greets the caller and reports the length of the `name` parameter.
pub struct HelloWorker;

impl Worker for HelloWorker {
    fn process_request(&self, context: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), WorkerError> {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let name = context.parameter("name").map(str::trim).unwrap_or("");

        let mut page = String::from("<html><body><h1>Hello!!!</h1>");
        page.push_str(&format!("<p>Now is: {now}</p>"));
        if name.is_empty() {
            page.push_str("<p>You did not send me your name!</p>");
        } else {
            page.push_str(&format!(
                "<p>Your name ({}) has {} letters.</p>",
                escape_html(name),
                name.chars().count()
            ));
        }
        page.push_str("</body></html>");

        context.set_mime_type("text/html");
        context.write_str(&page)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::test_support::run;

    #[test]
    fn test_counts_name_letters() {
        let outcome = run(&HelloWorker, &[("name", " Ivić ")], &[]);
        assert!(outcome.response.contains("<h1>Hello!!!</h1>"));
        assert!(outcome.response.contains("has 4 letters"));
        assert!(outcome.response.contains("<p>Now is: "));
    }

    #[test]
    fn test_missing_name() {
        let outcome = run(&HelloWorker, &[], &[]);
        assert!(outcome.response.contains("You did not send me your name!"));
    }
}
