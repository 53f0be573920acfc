use smscr_exec::RequestContext;

use super::{Worker, WorkerError};
use crate::dispatch::Dispatcher;

const WIDTH: u32 = 300;
const HEIGHT: u32 = 200;
const RADIUS: u32 = 60;

/// Draws a red circle on a white background.
pub struct CircleWorker;

impl CircleWorker {
    fn render() -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
             viewBox=\"0 0 {WIDTH} {HEIGHT}\">\
             <rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"white\"/>\
             <circle cx=\"{cx}\" cy=\"{cy}\" r=\"{RADIUS}\" fill=\"red\"/></svg>\n",
            cx = WIDTH / 2,
            cy = HEIGHT / 2,
        )
    }
}

impl Worker for CircleWorker {
    fn process_request(&self, context: &mut RequestContext<'_>, _: &dyn Dispatcher) -> Result<(), WorkerError> {
        let image = Self::render();
        context.set_status_code(200);
        context.set_status_text("OK");
        context.set_mime_type("image/svg+xml");
        context.set_content_length(Some(image.len() as u64));
        context.write(image.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::test_support::run;

    #[test]
    fn test_svg_response() {
        let outcome = run(&CircleWorker, &[], &[]);
        let (header, body) = outcome.response.split_once("\r\n\r\n").unwrap();
        assert!(header.contains("Content-Type: image/svg+xml\r\n"));
        assert!(header.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(body.contains("<circle cx=\"150\" cy=\"100\" r=\"60\" fill=\"red\"/>"));
    }
}
