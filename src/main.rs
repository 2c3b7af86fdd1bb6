use std::rc::Rc;
use tokio::time::MissedTickBehavior;
use voxshell_lib::app::{Application, TICK_INTERVAL};
use voxshell_lib::config::{ConfigLocations, ConfigStore};
use voxshell_lib::environment::Environment;
use voxshell_lib::host::python::{resolve_interpreter, PythonHost};
use voxshell_lib::logging::init_logging;
use voxshell_lib::paths::AppPaths;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize paths
    let paths = AppPaths::new().expect("Failed to initialize application paths");
    paths
        .ensure_directories()
        .expect("Failed to create application directories");

    // Configuration comes before logging: it carries the log settings
    let mut store = ConfigStore::new(ConfigLocations::from_paths(&paths));
    let config_result = store.load_or_create();

    let console = match init_logging(&store.config().logging) {
        Ok(console) => Some(console),
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            None
        }
    };

    log::info!("Voxshell starting...");
    match config_result {
        Ok(()) => log::info!("Configuration loaded"),
        Err(e) => log::error!("{}; using default configuration", e),
    }

    // The interpreter is fixed for the lifetime of the process
    let interpreter = resolve_interpreter(&store.config().python.interpreter);
    log::info!("Command module interpreter: {}", interpreter.display());

    let env = Rc::new(Environment::new(Box::new(PythonHost::new(interpreter))));
    let mut app = Application::with_defaults(store, env);
    if let Some(console) = console {
        app.attach_console(console);
    }
    app.startup();

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.tick();
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    app.shutdown();
    log::info!("✓ Voxshell stopped");
}
