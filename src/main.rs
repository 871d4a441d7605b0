use std::env;
use std::process::ExitCode;

use ddns_renew::config::{CliArgs, Settings};
use ddns_renew::logging;
use ddns_renew::renew::RenewalOrchestrator;
use ddns_renew::renew::reporter::{
    EXIT_RUN_FAILED, EXIT_USAGE, ScheduleSink, ScriptScheduler, WILDCARD,
};
use ddns_renew::session::ChromeSession;

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();
    let args = match CliArgs::parse(&argv) {
        Ok(args) => args,
        Err(usage) => {
            println!("{usage}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let _logging_guard = logging::init_logging("logs", "ddns-renew", args.debug.filter_directive());

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e:#}");
            return ExitCode::from(EXIT_RUN_FAILED);
        }
    };

    let reporter = ScriptScheduler::new(settings.scheduler_script.clone());
    let session = match ChromeSession::launch(&settings) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to start browser session: {e:#}");
            reporter.notify(WILDCARD, WILDCARD, false);
            return ExitCode::from(EXIT_RUN_FAILED);
        }
    };

    let orchestrator =
        RenewalOrchestrator::new(session, reporter, args.credentials, args.debug, settings);
    ExitCode::from(orchestrator.run().await)
}
