use smscr_exec::RequestContext;

use super::{escape_html, Worker, WorkerError};
use crate::dispatch::Dispatcher;

/// Lists all request parameters in an HTML table.
pub struct EchoParams;

impl Worker for EchoParams {
    fn process_request(&self, context: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), WorkerError> {
        let mut page = String::from(
            "<html lang=\"en\"><head><title>Echo parameters</title><meta charset=\"UTF-8\" /></head>\
             <body><h1>Parameters:</h1><table border=\"1\" cellpadding=\"5\">\
             <thead><tr><th>Name</th><th>Value</th></tr></thead><tbody>",
        );
        for name in context.parameter_names() {
            let value = context.parameter(name).unwrap_or("");
            page.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(name),
                escape_html(value)
            ));
        }
        page.push_str("</tbody></table></body></html>\n");

        context.set_status_code(200);
        context.set_status_text("OK");
        context.set_mime_type("text/html");
        context.set_content_length(Some(context.encoding().encode(&page).len() as u64));
        context.write_str(&page)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::test_support::run;

    #[test]
    fn test_rows_sorted_by_name() {
        let outcome = run(&EchoParams, &[("b", "2"), ("a", "<1>")], &[]);
        let body = outcome.response;
        let a = body.find("<tr><td>a</td><td>&lt;1&gt;</td></tr>").unwrap();
        let b = body.find("<tr><td>b</td><td>2</td></tr>").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_content_length_matches_body() {
        let outcome = run(&EchoParams, &[("x", "č")], &[]);
        let (header, body) = outcome.response.split_once("\r\n\r\n").unwrap();
        assert!(header.contains(&format!("Content-Length: {}", body.len())));
    }
}
