use smscr_exec::RequestContext;

use super::{escape_html, Worker, WorkerError};
use crate::dispatch::Dispatcher;

/// Stores a valid `bgcolor` parameter in the session.
pub struct BgColorWorker;

fn is_hex_color(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl Worker for BgColorWorker {
    fn process_request(&self, context: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), WorkerError> {
        let requested = context.parameter("bgcolor").map(str::to_string);
        let (message, info) = match requested {
            Some(color) if is_hex_color(&color) => {
                context.set_persistent_parameter("bgcolor", color.as_str());
                ("Background color updated.", format!("The new background color is: #{color}"))
            }
            _ => (
                "Background color not updated.",
                "Check if the given color is a 6-digit hexadecimal number \
                 (without the leading \"#\", e.g. \"FF0000\" for red)."
                    .to_string(),
            ),
        };
        let current = context.persistent_parameter("bgcolor").unwrap_or_default();

        let page = format!(
            "<html lang=\"en\"><head><title>Background color setter</title><meta charset=\"UTF-8\" />\
             <style>body {{ background-color: #{}; }} a {{ color:#0000FF; }} a:hover {{ color:#FFFF00; }}</style>\
             </head><body><h1>{message}</h1><p>{}</p><a href=\"/index2.html\">Back to index</a></body></html>\r\n",
            escape_html(&current),
            escape_html(&info),
        );

        context.set_status_code(200);
        context.set_status_text("OK");
        context.set_mime_type("text/html");
        context.set_content_length(Some(context.encoding().encode(&page).len() as u64));
        context.write_str(&page)?;
        Ok(())
    }
}
