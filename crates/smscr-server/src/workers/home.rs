use smscr_exec::RequestContext;

use super::{Worker, WorkerError};
use crate::dispatch::Dispatcher;

const DEFAULT_BACKGROUND: &str = "7F7F7F";

/// Renders the home page in the session's background color.
pub struct Home;

impl Worker for Home {
    fn process_request(&self, context: &mut RequestContext<'_>, dispatcher: &dyn Dispatcher) -> Result<(), WorkerError> {
        let background = context
            .persistent_parameter("bgcolor")
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());
        context.set_temporary_parameter("background", background);
        dispatcher.dispatch_request("/private/pages/home.smscr", context)?;
        Ok(())
    }
}
